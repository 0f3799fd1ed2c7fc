//! The store handle hosts construct once and pass around.

use crate::config::StoreConfig;
use crate::crypto::StoreKey;
use crate::error::Result;
use crate::legacy::{self, ImportReport};
use crate::repo::StoreStats;
use crate::storage::{BackupManager, SchemaStatus, Session, SessionManager};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owns the session manager and backup manager for one store file.
pub struct Store {
    sessions: Arc<SessionManager>,
    backups: BackupManager,
}

fn create_private_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

impl Store {
    /// Open the store described by `config`, creating it on first run.
    ///
    /// Runs one session immediately so a wrong key, a corrupted file or a
    /// schema failure surfaces here rather than on first use.
    pub fn open(config: &StoreConfig, key: StoreKey) -> Result<Self> {
        create_private_dir(&config.data_dir)?;

        let sessions = Arc::new(SessionManager::new(config.store_path(), key));
        let status = sessions.with_session(|session| Ok(session.schema_status()))?;
        match status {
            SchemaStatus::Created { version } => {
                tracing::info!(path = %config.store_path().display(), version, "store created");
            }
            SchemaStatus::Migrated { from, to } => {
                tracing::info!(from, to, "store schema upgraded");
            }
            SchemaStatus::Current => {
                tracing::debug!(path = %config.store_path().display(), "store opened");
            }
        }

        let backups = BackupManager::new(config.store_path(), config.backup_path())
            .with_retention(config.backup_retention);
        Ok(Self { sessions, backups })
    }

    /// Path of the encrypted store file.
    pub fn path(&self) -> &Path {
        self.sessions.store_path()
    }

    /// The session manager, for hosts that share it across tasks.
    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sessions)
    }

    /// The backup manager.
    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Run `body` in one session. See [`SessionManager::with_session`].
    pub fn with_session<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Session<'_>) -> Result<T>,
    {
        self.sessions.with_session(body)
    }

    /// Run `body` in one session on the blocking thread pool.
    pub async fn run<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Session<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.sessions().spawn_session(body).await
    }

    /// Copy the store into a new backup and prune old ones.
    pub fn create_backup(&self) -> Result<PathBuf> {
        self.backups.create_backup()
    }

    /// Existing backups, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        self.backups.list_backups()
    }

    /// Check that the store decrypts and passes SQLite's integrity check.
    pub fn verify(&self) -> Result<()> {
        self.sessions.verify()?;
        tracing::info!(path = %self.path().display(), "store verified");
        Ok(())
    }

    /// Counts and totals over the store, plus its size on disk.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = self.with_session(|session| session.stats())?;
        stats.store_bytes = Some(fs::metadata(self.path())?.len());
        Ok(stats)
    }

    /// Import legacy JSON files in one session.
    pub fn import_legacy(&self, general: Option<&Path>, years: &[PathBuf]) -> Result<ImportReport> {
        let general = general.map(legacy::read_general).transpose()?;
        let years = years
            .iter()
            .map(|path| legacy::read_year(path))
            .collect::<Result<Vec<_>>>()?;

        self.with_session(|session| legacy::import(session, general.as_ref(), &years))
    }
}
