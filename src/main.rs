use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use tagscan::decoder::decode_image;
use tagscan::models::{ScanRecord, ScanSource};
use tagscan::payload::parse_payload;
use tagscan::scan::{ScanEvent, ScanSession};
use tagscan::settings::SettingsStore;
use tagscan::view;
use tagscan::{Database, Frame, FrameFeedDecoder};

#[derive(Parser)]
#[command(
    name = "tagscan",
    version,
    about = "QR tag scan ingestion for machine service tracking"
)]
struct Cli {
    /// Directory holding settings and scan history
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a code from a single image file (the upload path)
    Decode {
        image: PathBuf,

        /// Reject images carrying more than one code
        #[arg(long)]
        strict: bool,

        /// Skip writing the result to scan history
        #[arg(long)]
        no_store: bool,
    },
    /// Run a live scan session fed image files as successive camera frames
    Live {
        #[arg(required = true)]
        frames: Vec<PathBuf>,

        /// Skip writing the result to scan history
        #[arg(long)]
        no_store: bool,
    },
    /// List recent scans from history
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let data_dir = resolve_data_dir(cli.data_dir.clone());
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let db_path = settings
        .scan()
        .history_db
        .unwrap_or_else(|| data_dir.join("tagscan.sqlite3"));
    let db = Database::new(db_path)?;

    let succeeded = match cli.command {
        Command::Decode {
            image,
            strict,
            no_store,
        } => run_decode(&db, &settings, image, strict, no_store).await?,
        Command::Live { frames, no_store } => run_live(&db, frames, no_store).await?,
        Command::History { limit } => run_history(&db, limit).await?,
    };

    drop(db);
    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    dirs::data_dir()
        .map(|dir| dir.join("tagscan"))
        .unwrap_or_else(|| PathBuf::from(".tagscan"))
}

async fn run_decode(
    db: &Database,
    settings: &SettingsStore,
    image: PathBuf,
    strict: bool,
    no_store: bool,
) -> Result<bool> {
    let bytes = std::fs::read(&image)
        .with_context(|| format!("failed to read image {}", image.display()))?;
    let strict = strict || settings.scan().strict_decode;

    match decode_image(&bytes, strict).await {
        Ok(raw) => {
            let record = parse_payload(&raw);
            if !no_store {
                db.insert_scan(&ScanRecord::new(
                    ScanSource::Upload,
                    raw,
                    record.clone(),
                ))
                .await?;
            }
            print!("{}", view::render(Some(&record), None));
            Ok(true)
        }
        Err(err) => {
            // A failed upload decode never clears the last good result.
            let previous = match db.latest_scan().await {
                Ok(previous) => previous,
                Err(db_err) => {
                    warn!("could not load previous scan: {db_err}");
                    None
                }
            };
            print!(
                "{}",
                view::render(
                    previous.as_ref().map(|scan| &scan.record),
                    Some(&err.to_string()),
                )
            );
            Ok(false)
        }
    }
}

async fn run_live(db: &Database, frames: Vec<PathBuf>, no_store: bool) -> Result<bool> {
    let (decoder, frame_tx) = FrameFeedDecoder::new(8);
    let (session, mut events) = ScanSession::new(decoder);
    session.start().await?;

    let feeder = tokio::spawn(async move {
        for path in frames {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("skipping {}: {err}", path.display());
                    continue;
                }
            };
            let frame = match Frame::from_image_bytes(&bytes) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("skipping {}: {err}", path.display());
                    continue;
                }
            };
            // Send fails once the session completes and releases the decoder.
            if frame_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let succeeded = loop {
        match events.recv().await {
            Some(ScanEvent::Started { session_id }) => {
                info!("live scan session {session_id} started");
            }
            Some(ScanEvent::Completed { raw, record }) => {
                if !no_store {
                    db.insert_scan(&ScanRecord::new(ScanSource::Live, raw, record.clone()))
                        .await?;
                }
                print!("{}", view::render(Some(&record), None));
                break true;
            }
            Some(ScanEvent::Cancelled) | None => {
                print!(
                    "{}",
                    view::render(None, Some("no decodable code found in the provided frames"))
                );
                break false;
            }
        }
    };

    let _ = feeder.await;
    session.cancel().await;
    Ok(succeeded)
}

async fn run_history(db: &Database, limit: usize) -> Result<bool> {
    let scans = db.list_recent_scans(limit).await?;
    if scans.is_empty() {
        println!("no scans recorded yet");
        return Ok(true);
    }
    for scan in &scans {
        println!("{}", view::render_history_line(scan));
    }
    Ok(true)
}
