use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSettings {
    /// Overrides the default scan-history database location when set.
    pub history_db: Option<PathBuf>,
    /// Reject upload images carrying more than one code.
    pub strict_decode: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            history_db: None,
            strict_decode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    scan: ScanSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn scan(&self) -> ScanSettings {
        self.data.read().unwrap().scan.clone()
    }

    pub fn update_scan(&self, settings: ScanSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.scan = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("store");
        let scan = store.scan();
        assert!(scan.history_db.is_none());
        assert!(!scan.strict_decode);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).expect("store");
        store
            .update_scan(ScanSettings {
                history_db: Some(PathBuf::from("/tmp/scans.sqlite3")),
                strict_decode: true,
            })
            .expect("update");

        let reopened = SettingsStore::new(path).expect("reopen");
        let scan = reopened.scan();
        assert_eq!(scan.history_db, Some(PathBuf::from("/tmp/scans.sqlite3")));
        assert!(scan.strict_decode);
    }
}
