//! Store location and retention settings.
//!
//! The core reads nothing from the environment except the secret; hosts
//! build a [`StoreConfig`] and pass it in.

use crate::storage::{DEFAULT_BACKUP_DIR, DEFAULT_RETENTION, DEFAULT_STORE_NAME};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Where the store lives and how many backups to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the store file.
    pub data_dir: PathBuf,
    /// Store file name inside `data_dir`.
    pub file_name: String,
    /// Backup directory; `<data_dir>/backup` when unset.
    pub backup_dir: Option<PathBuf>,
    /// Backups kept after each new one.
    pub backup_retention: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            file_name: DEFAULT_STORE_NAME.to_string(),
            backup_dir: None,
            backup_retention: DEFAULT_RETENTION,
        }
    }
}

impl StoreConfig {
    /// Default settings rooted at `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Full path of the encrypted store.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }

    /// Full path of the backup directory.
    pub fn backup_path(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_BACKUP_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.store_path(), PathBuf::from("data/tpv.db"));
        assert_eq!(config.backup_path(), PathBuf::from("data/backup"));
        assert_eq!(config.backup_retention, 30);
    }

    #[test]
    fn test_explicit_backup_dir() {
        let config = StoreConfig {
            backup_dir: Some(PathBuf::from("/mnt/usb")),
            ..StoreConfig::in_dir("/srv/tpv")
        };
        assert_eq!(config.store_path(), PathBuf::from("/srv/tpv/tpv.db"));
        assert_eq!(config.backup_path(), PathBuf::from("/mnt/usb"));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"data_dir": "/srv/tpv"}"#).expect("parse");
        assert_eq!(config.file_name, "tpv.db");
        assert_eq!(config.backup_retention, 30);
    }
}
