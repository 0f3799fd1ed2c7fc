//! Rotating backups of the encrypted store.
//!
//! Backups are verbatim copies of the ciphertext; nothing is decrypted. Each
//! copy is written under a hidden `.partial` name and renamed into place, so
//! the backup directory only ever holds complete files.

use super::session::ScratchFile;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Backups kept by default.
pub const DEFAULT_RETENTION: usize = 30;

/// Timestamp embedded in backup names. Sorts chronologically as text.
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Length of a formatted stamp: `YYYYmmdd_HHMMSS_ffffff`.
const STAMP_LEN: usize = 22;

/// Copies the store into a backup directory and prunes old copies.
#[derive(Debug, Clone)]
pub struct BackupManager {
    store_path: PathBuf,
    backup_dir: PathBuf,
    retention: usize,
}

impl BackupManager {
    /// Back up `store_path` into `backup_dir`, keeping [`DEFAULT_RETENTION`] copies.
    pub fn new(store_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            backup_dir: backup_dir.into(),
            retention: DEFAULT_RETENTION,
        }
    }

    /// Keep `retention` copies (at least one).
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    /// Number of copies kept.
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Directory holding the backups.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn name_parts(&self) -> (String, String) {
        let stem = self
            .store_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        let ext = self
            .store_path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bak".to_string());
        (stem, ext)
    }

    fn backup_name(&self, at: &DateTime<Utc>) -> String {
        let (stem, ext) = self.name_parts();
        format!("{}_{}.{}", stem, at.format(STAMP_FORMAT), ext)
    }

    fn is_backup_name(&self, name: &str) -> bool {
        let (stem, ext) = self.name_parts();
        let Some(stamp) = name
            .strip_prefix(stem.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix(ext.as_str()))
            .and_then(|rest| rest.strip_suffix('.'))
        else {
            return false;
        };

        stamp.len() == STAMP_LEN
            && stamp.bytes().enumerate().all(|(i, b)| match i {
                8 | 15 => b == b'_',
                _ => b.is_ascii_digit(),
            })
    }

    /// Copy the store into a new timestamped backup, then prune.
    ///
    /// Returns the path of the new backup.
    pub fn create_backup(&self) -> Result<PathBuf> {
        if !self.store_path.exists() {
            return Err(Error::NotFound(format!(
                "store {}",
                self.store_path.display()
            )));
        }
        fs::create_dir_all(&self.backup_dir)?;

        let mut at = Utc::now();
        let mut target = self.backup_dir.join(self.backup_name(&at));
        while target.exists() {
            at += Duration::microseconds(1);
            target = self.backup_dir.join(self.backup_name(&at));
        }

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Filesystem("backup name has no file name".into()))?;
        let partial = ScratchFile::claim(
            self.backup_dir.join(format!(".{}.partial", file_name)),
            &[],
        )?;

        let bytes = match fs::copy(&self.store_path, partial.path()) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("store {}", self.store_path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        File::open(partial.path())?.sync_all()?;
        fs::rename(partial.path(), &target)?;
        partial.disarm();

        tracing::info!(path = %target.display(), bytes, "backup created");

        let removed = self.prune()?;
        if !removed.is_empty() {
            tracing::debug!(removed = removed.len(), "old backups pruned");
        }
        Ok(target)
    }

    /// Backups in the directory, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if self.is_backup_name(name) && entry.file_type()?.is_file() {
                    backups.push(entry.path());
                }
            }
        }

        // Names embed a fixed-width stamp, so name order is age order.
        backups.sort();
        Ok(backups)
    }

    /// Delete the oldest backups beyond the retention count.
    ///
    /// Returns the deleted paths.
    pub fn prune(&self) -> Result<Vec<PathBuf>> {
        let backups = self.list_backups()?;
        let excess = backups.len().saturating_sub(self.retention);

        let mut removed = Vec::with_capacity(excess);
        for path in backups.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed.push(path);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> BackupManager {
        let store = dir.path().join("tpv.db");
        fs::write(&store, b"ciphertext").expect("write store");
        BackupManager::new(store, dir.path().join("backup"))
    }

    #[test]
    fn test_backup_is_verbatim_copy() {
        let dir = TempDir::new().expect("tempdir");
        let manager = setup(&dir);

        let path = manager.create_backup().expect("backup");
        assert_eq!(fs::read(&path).expect("read"), b"ciphertext");

        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("tpv_"));
        assert!(name.ends_with(".db"));
        assert_eq!(manager.list_backups().expect("list"), vec![path]);
    }

    #[test]
    fn test_names_are_unique_and_ordered() {
        let dir = TempDir::new().expect("tempdir");
        let manager = setup(&dir);

        let created: Vec<_> = (0..5)
            .map(|_| manager.create_backup().expect("backup"))
            .collect();
        assert_eq!(manager.list_backups().expect("list"), created);
    }

    #[test]
    fn test_retention() {
        let dir = TempDir::new().expect("tempdir");
        let manager = setup(&dir).with_retention(3);

        let created: Vec<_> = (0..5)
            .map(|_| manager.create_backup().expect("backup"))
            .collect();
        let kept = manager.list_backups().expect("list");
        assert_eq!(kept, created[2..].to_vec());
    }

    #[test]
    fn test_retention_minimum_is_one() {
        let dir = TempDir::new().expect("tempdir");
        let manager = setup(&dir).with_retention(0);
        assert_eq!(manager.retention(), 1);

        manager.create_backup().expect("backup");
        let last = manager.create_backup().expect("backup");
        assert_eq!(manager.list_backups().expect("list"), vec![last]);
    }

    #[test]
    fn test_unrelated_files_are_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let manager = setup(&dir).with_retention(1);
        fs::create_dir_all(manager.backup_dir()).expect("mkdir");
        let notes = manager.backup_dir().join("notes.txt");
        let other = manager.backup_dir().join("tpv_manual.db");
        fs::write(&notes, b"x").expect("write");
        fs::write(&other, b"x").expect("write");

        manager.create_backup().expect("backup");
        manager.create_backup().expect("backup");
        assert!(notes.exists());
        assert!(other.exists());
        assert_eq!(manager.list_backups().expect("list").len(), 1);
    }

    #[test]
    fn test_missing_store() {
        let dir = TempDir::new().expect("tempdir");
        let manager = BackupManager::new(dir.path().join("absent.db"), dir.path().join("backup"));
        assert!(matches!(manager.create_backup(), Err(Error::NotFound(_))));
        assert!(manager.list_backups().expect("list").is_empty());
    }

    #[test]
    fn test_no_partial_files_left() {
        let dir = TempDir::new().expect("tempdir");
        let manager = setup(&dir);
        manager.create_backup().expect("backup");

        let partials = fs::read_dir(manager.backup_dir())
            .expect("read")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .count();
        assert_eq!(partials, 0);
    }
}
