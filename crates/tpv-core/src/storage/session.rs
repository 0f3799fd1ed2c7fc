//! Transactional sessions over the encrypted store.
//!
//! A session decrypts the store into a private working copy, opens SQLite on
//! it, runs the caller's body inside one transaction, then reseals the
//! working copy and atomically renames the ciphertext over the store. The
//! working copy is removed on every exit path, including panics.
//!
//! ```text
//!   tpv.db ──open──▶ tpv.db.work ──SQLite──▶ commit
//!     ▲                                        │
//!     └──rename── tpv.db.seal ◀──seal──────────┘
//! ```

use super::schema::{self, SchemaStatus};
use crate::crypto::{Cipher, StoreKey};
use crate::error::{Error, Result};
use crate::logging::RedactedBytes;
use crate::repo::{AuditLog, Configuration, Customers, Products, Receipts, StoreStats, Waiters};
use rusqlite::{Connection, OpenFlags, Transaction};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use zeroize::Zeroizing;

/// Suffix of the plaintext working copy.
pub const WORKING_SUFFIX: &str = ".work";

/// Suffix of the freshly sealed file awaiting rename.
pub const SEALING_SUFFIX: &str = ".seal";

/// Files SQLite may create next to the working copy.
const SQLITE_SIDECARS: &[&str] = &["-journal", "-wal", "-shm"];

pub(super) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// A temporary file removed when dropped unless disarmed.
pub(super) struct ScratchFile {
    path: PathBuf,
    sidecars: &'static [&'static str],
    armed: bool,
}

impl ScratchFile {
    /// Claim `path` as scratch, clearing leftovers from an interrupted run.
    pub(super) fn claim(path: PathBuf, sidecars: &'static [&'static str]) -> Result<Self> {
        let scratch = Self {
            path,
            sidecars,
            armed: true,
        };
        for path in scratch.paths() {
            if remove_if_exists(&path)? {
                tracing::warn!(path = %path.display(), "removed stale scratch file");
            }
        }
        Ok(scratch)
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        std::iter::once(self.path.clone())
            .chain(self.sidecars.iter().map(|s| with_suffix(&self.path, s)))
    }

    /// Keep the file: it has been renamed into place.
    pub(super) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for path in self.paths() {
            if let Err(e) = remove_if_exists(&path) {
                tracing::error!(path = %path.display(), error = %e, "failed to remove scratch file");
            }
        }
    }
}

/// Write `contents` to a new file readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| Error::Storage(format!("failed to open working copy: {}", e)))?;

    // Everything must land in the single working file before it is sealed,
    // so no WAL, and temporary tables stay in memory.
    conn.pragma_update_and_check(None, "journal_mode", "DELETE", |row| row.get::<_, String>(0))?;
    conn.pragma_update_and_check(None, "secure_delete", "ON", |row| row.get::<_, i64>(0))?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(conn)
}

/// An open transaction on the working copy.
///
/// Handed to session bodies; repositories borrow it and never outlive it.
pub struct Session<'conn> {
    tx: Transaction<'conn>,
    schema: SchemaStatus,
}

impl<'conn> Session<'conn> {
    /// The underlying connection, for queries no repository covers.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// What schema initialization did when this session opened.
    pub fn schema_status(&self) -> SchemaStatus {
        self.schema
    }

    /// Product repository.
    pub fn products(&self) -> Products<'_> {
        Products::new(&self.tx)
    }

    /// Customer repository.
    pub fn customers(&self) -> Customers<'_> {
        Customers::new(&self.tx)
    }

    /// Waiter repository.
    pub fn waiters(&self) -> Waiters<'_> {
        Waiters::new(&self.tx)
    }

    /// Receipt repository.
    pub fn receipts(&self) -> Receipts<'_> {
        Receipts::new(&self.tx)
    }

    /// Configuration entries.
    pub fn configuration(&self) -> Configuration<'_> {
        Configuration::new(&self.tx)
    }

    /// Audit trail (append and read only).
    pub fn audit(&self) -> AuditLog<'_> {
        AuditLog::new(&self.tx)
    }

    /// Aggregate counts over the store contents.
    pub fn stats(&self) -> Result<StoreStats> {
        StoreStats::collect(&self.tx)
    }

    /// Run SQLite's integrity check on the working copy.
    pub fn integrity_check(&self) -> Result<()> {
        let mut stmt = self.tx.prepare("PRAGMA integrity_check")?;
        let problems = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match problems.as_slice() {
            [ok] if ok == "ok" => Ok(()),
            _ => Err(Error::Storage(format!(
                "integrity check failed: {}",
                problems.join("; ")
            ))),
        }
    }
}

impl<'conn> Deref for Session<'conn> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

/// Owns the store file and serializes every session against it.
pub struct SessionManager {
    store_path: PathBuf,
    cipher: Cipher,
    lock: Mutex<()>,
}

impl SessionManager {
    /// Create a manager for the store at `store_path`.
    ///
    /// Nothing is read until the first session.
    pub fn new(store_path: impl Into<PathBuf>, key: StoreKey) -> Self {
        Self {
            store_path: store_path.into(),
            cipher: Cipher::new(key),
            lock: Mutex::new(()),
        }
    }

    /// Path of the encrypted store.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Path of the plaintext working copy (exists only during a session).
    pub fn working_path(&self) -> PathBuf {
        with_suffix(&self.store_path, WORKING_SUFFIX)
    }

    fn sealing_path(&self) -> PathBuf {
        with_suffix(&self.store_path, SEALING_SUFFIX)
    }

    /// Run `body` in one complete decrypt, operate, reseal, swap cycle.
    ///
    /// If `body` fails, the transaction is rolled back and the store file is
    /// left byte-for-byte untouched. Sessions are serialized by an internal
    /// lock; a second caller waits for the first to finish.
    pub fn with_session<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Session<'_>) -> Result<T>,
    {
        // A panic inside a previous body cannot have touched the store file,
        // so a poisoned lock is still safe to take.
        let _serialized = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let plaintext = self.load()?;
        let working = ScratchFile::claim(self.working_path(), SQLITE_SIDECARS)?;
        match &plaintext {
            Some(bytes) => write_private(working.path(), bytes)?,
            None => {
                tracing::info!(path = %self.store_path.display(), "no store yet, starting empty");
                write_private(working.path(), &[])?;
            }
        }
        drop(plaintext);

        let mut conn = open_connection(working.path())?;
        let schema = schema::initialize(&conn)?;
        let value = {
            let session = Session {
                tx: conn.transaction()?,
                schema,
            };
            match body(&session) {
                Ok(value) => {
                    session.tx.commit()?;
                    value
                }
                Err(e) => {
                    if let Err(rollback) = session.tx.rollback() {
                        tracing::warn!(error = %rollback, "rollback failed");
                    }
                    tracing::debug!(error = %e, "session body failed, store untouched");
                    return Err(e);
                }
            }
        };
        conn.close().map_err(|(_, e)| Error::from(e))?;

        let plaintext = Zeroizing::new(fs::read(working.path())?);
        let sealed = self.cipher.seal(&plaintext)?;
        self.replace_store(&sealed)?;

        tracing::debug!(
            plaintext = %RedactedBytes(&plaintext),
            sealed = sealed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "session committed"
        );
        Ok(value)
    }

    /// Run a session on the blocking thread pool.
    ///
    /// Same semantics as [`SessionManager::with_session`]; for async hosts
    /// that must not block their event loop on disk I/O.
    pub async fn spawn_session<T, F>(self: Arc<Self>, body: F) -> Result<T>
    where
        F: FnOnce(&Session<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.with_session(body))
            .await
            .map_err(|e| Error::Storage(format!("session task failed: {}", e)))?
    }

    /// Open a session only to check the store decrypts and is consistent.
    pub fn verify(&self) -> Result<()> {
        self.with_session(|session| session.integrity_check())
    }

    /// Decrypt the store, or `None` on first run.
    fn load(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let sealed = match fs::read(&self.store_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if sealed.is_empty() {
            return Ok(None);
        }

        self.cipher.open(&sealed).map(Some).map_err(|_| {
            tracing::error!(path = %self.store_path.display(), "store could not be opened");
            Error::StoreUnreadable
        })
    }

    /// Atomically replace the store with `sealed`.
    fn replace_store(&self, sealed: &[u8]) -> Result<()> {
        let pending = ScratchFile::claim(self.sealing_path(), &[])?;
        {
            let mut file = File::create(pending.path())?;
            file.write_all(sealed)?;
            file.sync_all()?;
        }
        fs::rename(pending.path(), &self.store_path)?;
        pending.disarm();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> SessionManager {
        let key = StoreKey::derive("session test").expect("derive");
        SessionManager::new(dir.path().join("tpv.db"), key)
    }

    fn leftovers(dir: &TempDir) -> Vec<String> {
        fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "tpv.db")
            .collect()
    }

    #[test]
    fn test_first_session_creates_sealed_store() {
        let dir = TempDir::new().expect("tempdir");
        let sm = manager(&dir);

        let status = sm.with_session(|s| Ok(s.schema_status())).expect("session");
        assert!(matches!(status, SchemaStatus::Created { .. }));

        let bytes = fs::read(sm.store_path()).expect("store exists");
        assert!(!bytes.starts_with(b"SQLite format 3"));
        assert!(leftovers(&dir).is_empty());

        let status = sm.with_session(|s| Ok(s.schema_status())).expect("session");
        assert_eq!(status, SchemaStatus::Current);
    }

    #[test]
    fn test_committed_rows_survive_reseal() {
        let dir = TempDir::new().expect("tempdir");
        let sm = manager(&dir);

        let inserted = sm
            .with_session(|s| {
                s.execute("INSERT INTO configuration VALUES ('k', '1', 'x')", [])?;
                Ok(s.last_insert_rowid())
            })
            .expect("commit");
        assert!(inserted > 0);
        assert!(leftovers(&dir).is_empty());

        let value: String = sm
            .with_session(|s| {
                Ok(s.query_row("SELECT value FROM configuration WHERE key = 'k'", [], |r| r.get(0))?)
            })
            .expect("read back");
        assert_eq!(value, "1");
    }

    #[test]
    fn test_failed_body_leaves_store_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let sm = manager(&dir);
        sm.with_session(|s| {
            s.execute("INSERT INTO configuration VALUES ('k', '1', 'x')", [])?;
            Ok(())
        })
        .expect("seed");
        let before = fs::read(sm.store_path()).expect("read");

        let result: Result<()> = sm.with_session(|s| {
            s.execute("INSERT INTO configuration VALUES ('k2', '2', 'x')", [])?;
            Err(Error::Validation("abort".into()))
        });
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(fs::read(sm.store_path()).expect("read"), before);
        assert!(leftovers(&dir).is_empty());

        let count: i64 = sm
            .with_session(|s| Ok(s.query_row("SELECT COUNT(*) FROM configuration", [], |r| r.get(0))?))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_working_copy_exists_only_during_session() {
        let dir = TempDir::new().expect("tempdir");
        let sm = manager(&dir);
        let working = sm.working_path();

        sm.with_session(|_| {
            assert!(working.exists());
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = fs::metadata(&working).expect("meta").permissions().mode();
                assert_eq!(mode & 0o077, 0);
            }
            Ok(())
        })
        .expect("session");
        assert!(!working.exists());
    }

    #[test]
    fn test_wrong_key_is_store_unreadable() {
        let dir = TempDir::new().expect("tempdir");
        manager(&dir).with_session(|_| Ok(())).expect("create");

        let other = SessionManager::new(
            dir.path().join("tpv.db"),
            StoreKey::derive("wrong").expect("derive"),
        );
        let result = other.with_session(|_| Ok(()));
        assert!(matches!(result, Err(Error::StoreUnreadable)));
        assert!(!other.working_path().exists());
    }

    #[test]
    fn test_stale_working_copy_is_replaced() {
        let dir = TempDir::new().expect("tempdir");
        let sm = manager(&dir);
        fs::write(sm.working_path(), b"left over by a crash").expect("write");
        fs::write(with_suffix(&sm.working_path(), "-journal"), b"x").expect("write");

        sm.with_session(|_| Ok(())).expect("session");
        assert!(leftovers(&dir).is_empty());
    }

    #[test]
    fn test_panicking_body_cleans_up() {
        let dir = TempDir::new().expect("tempdir");
        let sm = manager(&dir);
        sm.with_session(|_| Ok(())).expect("create");
        let before = fs::read(sm.store_path()).expect("read");

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = sm.with_session::<(), _>(|_| panic!("boom"));
        }));
        assert!(outcome.is_err());
        assert!(!sm.working_path().exists());
        assert_eq!(fs::read(sm.store_path()).expect("read"), before);

        sm.with_session(|_| Ok(())).expect("lock still usable");
    }

    #[test]
    fn test_verify() {
        let dir = TempDir::new().expect("tempdir");
        let sm = manager(&dir);
        sm.verify().expect("fresh store verifies");
    }

    #[tokio::test]
    async fn test_spawn_session() {
        let dir = TempDir::new().expect("tempdir");
        let sm = Arc::new(manager(&dir));
        let n: i64 = sm
            .clone()
            .spawn_session(|s| Ok(s.query_row("SELECT 41 + 1", [], |r| r.get(0))?))
            .await
            .expect("spawned session");
        assert_eq!(n, 42);
        assert!(sm.store_path().exists());
    }
}
