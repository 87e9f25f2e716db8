use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{ScanRecord, ScanSource};
use crate::payload::NormalizedRecord;
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn source_from_str(value: &str) -> Result<ScanSource> {
    match value {
        "Live" => Ok(ScanSource::Live),
        "Upload" => Ok(ScanSource::Upload),
        _ => Err(anyhow!("unknown scan source '{value}'")),
    }
}

fn record_from_json(value: &str) -> Result<NormalizedRecord> {
    serde_json::from_str(value).with_context(|| format!("invalid record json '{value}'"))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("value {value} is negative"))
}

/// Scan history store. All SQLite access happens on a dedicated worker
/// thread; callers submit closures over a command channel and await the
/// reply, so the async runtime never blocks on the connection.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("tagscan-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Scan history database at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_scan(&self, scan: &ScanRecord) -> Result<()> {
        let record = scan.clone();
        self.execute(move |conn| {
            let record_json = serde_json::to_string(&record.record)
                .context("failed to serialize normalized record")?;
            conn.execute(
                "INSERT INTO scans (id, scanned_at, source, raw_payload, record_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.scanned_at.to_rfc3339(),
                    record.source.as_str(),
                    record.raw_payload,
                    record_json,
                ],
            )
            .with_context(|| "failed to insert scan")?;
            Ok(())
        })
        .await
    }

    pub async fn list_recent_scans(&self, limit: usize) -> Result<Vec<ScanRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, scanned_at, source, raw_payload, record_json
                 FROM scans
                 ORDER BY scanned_at DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut scans = Vec::new();
            while let Some(row) = rows.next()? {
                scans.push(ScanRecord {
                    id: row.get(0)?,
                    scanned_at: parse_datetime(&row.get::<_, String>(1)?)?,
                    source: source_from_str(&row.get::<_, String>(2)?)?,
                    raw_payload: row.get(3)?,
                    record: record_from_json(&row.get::<_, String>(4)?)?,
                });
            }

            Ok(scans)
        })
        .await
    }

    pub async fn latest_scan(&self) -> Result<Option<ScanRecord>> {
        let mut scans = self.list_recent_scans(1).await?;
        Ok(scans.pop())
    }

    pub async fn count_scans(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))?;
            to_u64(count)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScanRecord, ScanSource};
    use crate::payload::parse_payload;

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("history.sqlite3")).expect("open db");
        (dir, db)
    }

    #[tokio::test]
    async fn insert_and_list_round_trip() {
        let (_dir, db) = temp_db();

        let record = parse_payload("Model: X100\nSerial: 99182");
        let scan = ScanRecord::new(
            ScanSource::Upload,
            "Model: X100\nSerial: 99182".to_string(),
            record.clone(),
        );
        db.insert_scan(&scan).await.expect("insert");

        let scans = db.list_recent_scans(10).await.expect("list");
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].id, scan.id);
        assert_eq!(scans[0].source, ScanSource::Upload);
        assert_eq!(scans[0].record, record);
        assert_eq!(db.count_scans().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn latest_scan_orders_by_time() {
        let (_dir, db) = temp_db();

        let mut first = ScanRecord::new(
            ScanSource::Live,
            "EMP001".to_string(),
            parse_payload("EMP001"),
        );
        first.scanned_at = Utc::now() - chrono::Duration::minutes(5);
        let second = ScanRecord::new(
            ScanSource::Upload,
            "EMP002".to_string(),
            parse_payload("EMP002"),
        );

        db.insert_scan(&first).await.expect("insert first");
        db.insert_scan(&second).await.expect("insert second");

        let latest = db.latest_scan().await.expect("latest").expect("some scan");
        assert_eq!(latest.id, second.id);
    }
}
