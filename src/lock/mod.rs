//! Exclusive per-list lock files with a lifetime ceiling.
//!
//! A lock is a file created with `O_EXCL` semantics holding a JSON
//! [`LockInfo`]. Waiters poll until the file disappears, until it is past its
//! expiry (then they break it), or until their timeout elapses. A held lock is
//! represented by a [`LockGuard`]; dropping the guard removes the file, but
//! only while the file still carries the guard's token.

mod teardown;

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LockConfig;
use crate::error::{ListError, Result};

pub use self::teardown::{held_count, install_termination_handler, release_all};

/// Lock file extension.
const LOCK_EXT: &str = "lck";
/// Suffix of the archiver's lock name.
const ARCHIVER_SUFFIX: &str = "archiver";
/// Lifetimes beyond this are clamped (about ten years).
const MAX_LIFETIME_MS: u128 = 10 * 365 * 24 * 60 * 60 * 1000;

/// Contents of a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub token: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    fn new(lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: new_token(),
            pid: std::process::id(),
            acquired_at: now,
            expires_at: now + chrono_lifetime(lifetime),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Hands out list locks stored under one directory.
#[derive(Debug, Clone)]
pub struct LockManager {
    dir: PathBuf,
    lifetime: Duration,
    archiver_lifetime: Duration,
    timeout: Duration,
    poll_interval: Duration,
}

impl LockManager {
    pub fn new(dir: impl Into<PathBuf>, config: &LockConfig) -> Self {
        Self {
            dir: dir.into(),
            lifetime: config.lifetime(),
            archiver_lifetime: config.archiver_lifetime(),
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Override the acquisition timeout. Still bounded by the lifetime.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(self.lifetime);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Block until the lock for `list` is ours, or fail with
    /// [`ListError::LockTimeout`].
    pub fn acquire(&self, list: &str) -> Result<LockGuard> {
        self.acquire_named(list, list, self.lifetime)
    }

    /// The archiver's lock for `list`: same primitive, long lifetime.
    pub fn acquire_archiver(&self, list: &str) -> Result<LockGuard> {
        let name = format!("{list}.{ARCHIVER_SUFFIX}");
        self.acquire_named(list, &name, self.archiver_lifetime)
    }

    /// Whether a live (unexpired) lock exists for `list`.
    pub fn is_locked(&self, list: &str) -> bool {
        read_info(&self.lock_path(list)).is_some_and(|i| !i.is_expired())
    }

    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{LOCK_EXT}"))
    }

    fn acquire_named(&self, list: &str, name: &str, lifetime: Duration) -> Result<LockGuard> {
        fs::create_dir_all(&self.dir).map_err(|e| ListError::io(&self.dir, e))?;
        let path = self.lock_path(name);
        let started = Instant::now();
        let deadline = started + self.timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let info = LockInfo::new(lifetime);
                    let json = serde_json::to_vec(&info).map_err(|e| ListError::Corrupt {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                    if let Err(e) = file.write_all(&json).and_then(|()| file.flush()) {
                        let _ = fs::remove_file(&path);
                        return Err(ListError::io(&path, e));
                    }
                    debug!(list, waited_ms = started.elapsed().as_millis() as u64, "Lock acquired");
                    teardown::register(&info.token, &path);
                    return Ok(LockGuard {
                        list: list.to_string(),
                        path,
                        info,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.break_if_stale(&path, lifetime) {
                        continue;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ListError::LockTimeout {
                            list: list.to_string(),
                            waited: started.elapsed(),
                        });
                    }
                    debug!(list, "Lock busy, waiting");
                    std::thread::sleep(self.poll_interval.min(deadline - now));
                }
                Err(e) => return Err(ListError::io(&path, e)),
            }
        }
    }

    /// Remove the lock at `path` if its holder's lifetime ran out. An
    /// unreadable file is judged by its modification time instead.
    fn break_if_stale(&self, path: &Path, lifetime: Duration) -> bool {
        match read_info(path) {
            Some(info) if info.is_expired() => {
                warn!(
                    path = %path.display(),
                    pid = info.pid,
                    expired_at = %info.expires_at,
                    "Breaking stale lock"
                );
                bury(path, |buried| buried.is_some_and(|b| b.token == info.token));
                true
            }
            Some(_) => false,
            None => {
                let age = fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| t.elapsed().ok());
                match age {
                    Some(age) if age > lifetime => {
                        warn!(path = %path.display(), "Breaking unreadable stale lock");
                        bury(path, |buried| buried.is_none());
                        true
                    }
                    // Vanished meanwhile: retry at once.
                    None if !path.exists() => true,
                    _ => false,
                }
            }
        }
    }
}

/// Move the lock at `path` aside under a unique name, then delete it if
/// `is_stale` still holds for what was moved. A live lock that was taken in
/// the meantime is linked back into place. Returns whether a file was deleted.
fn bury(path: &Path, is_stale: impl FnOnce(Option<LockInfo>) -> bool) -> bool {
    let tombstone = path.with_extension(format!("{LOCK_EXT}.broken-{}", &new_token()[..8]));
    if fs::rename(path, &tombstone).is_err() {
        return false;
    }
    if is_stale(read_info(&tombstone)) {
        let _ = fs::remove_file(&tombstone);
        return true;
    }
    if let Err(e) = fs::hard_link(&tombstone, path) {
        warn!(path = %path.display(), error = %e, "Could not restore live lock");
    }
    let _ = fs::remove_file(&tombstone);
    false
}

/// Proof that the current request holds a list's lock.
#[derive(Debug)]
pub struct LockGuard {
    list: String,
    path: PathBuf,
    info: LockInfo,
}

impl LockGuard {
    /// Internal name of the locked list.
    pub fn list(&self) -> &str {
        &self.list
    }

    pub fn token(&self) -> &str {
        &self.info.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.info.expires_at
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock file on disk is still ours.
    pub fn is_held(&self) -> bool {
        read_info(&self.path).is_some_and(|i| i.token == self.info.token)
    }

    /// Push the expiry out to `now + lifetime`.
    pub fn refresh(&mut self, lifetime: Duration) -> Result<()> {
        if !self.is_held() {
            return Err(ListError::LockNotHeld(self.list.clone()));
        }
        let mut info = self.info.clone();
        info.expires_at = Utc::now() + chrono_lifetime(lifetime);
        let json = serde_json::to_vec(&info).map_err(|e| ListError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let tmp = self.path.with_extension(format!("{LOCK_EXT}.{}", &info.token[..8]));
        fs::write(&tmp, json).map_err(|e| ListError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| ListError::io(&self.path, e))?;
        debug!(list = %self.list, expires_at = %info.expires_at, "Lock refreshed");
        self.info = info;
        Ok(())
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        teardown::unregister(&self.info.token);
        match remove_if_owned(&self.path, &self.info.token) {
            Ok(true) => debug!(list = %self.list, "Lock released"),
            Ok(false) => info!(list = %self.list, "Lock was no longer ours at release"),
            Err(e) => warn!(list = %self.list, error = %e, "Could not remove lock file"),
        }
    }
}

/// Remove the lock file at `path` if it carries `token`.
pub(crate) fn remove_if_owned(path: &Path, token: &str) -> std::io::Result<bool> {
    match read_info(path) {
        Some(info) if info.token == token => match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        },
        _ => Ok(false),
    }
}

fn read_info(path: &Path) -> Option<LockInfo> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn new_token() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

fn chrono_lifetime(lifetime: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(lifetime.as_millis().min(MAX_LIFETIME_MS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> LockManager {
        let config = LockConfig {
            lifetime_secs: 30,
            timeout_secs: Some(1),
            poll_interval_ms: 10,
            archiver_lifetime_secs: 600,
        };
        LockManager::new(dir.path(), &config)
    }

    #[test]
    fn test_acquire_and_release_on_drop() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        {
            let guard = locks.acquire("dev").unwrap();
            assert!(guard.is_held());
            assert!(locks.is_locked("dev"));
        }
        assert!(!locks.is_locked("dev"));
        assert!(!locks.lock_path("dev").exists());
    }

    #[test]
    fn test_second_acquire_times_out() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir).with_timeout(Duration::from_millis(50));
        let _held = locks.acquire("dev").unwrap();
        let err = locks.acquire("dev").unwrap_err();
        assert!(matches!(err, ListError::LockTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_different_lists_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir).with_timeout(Duration::from_millis(50));
        let _a = locks.acquire("a").unwrap();
        let _b = locks.acquire("b").unwrap();
        let _arch = locks.acquire_archiver("a").unwrap();
    }

    #[test]
    fn test_bury_restores_live_lock() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        let guard = locks.acquire("dev").unwrap();

        assert!(!bury(guard.path(), |info| info.is_some_and(|i| i.token == "someone-else")));
        assert!(guard.is_held());
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);

        let token = guard.token().to_string();
        assert!(bury(guard.path(), |info| info.is_some_and(|i| i.token == token)));
        assert!(!guard.path().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir).with_timeout(Duration::from_millis(50));
        let stale = LockInfo {
            token: "deadbeef".repeat(4),
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        fs::write(locks.lock_path("dev"), serde_json::to_vec(&stale).unwrap()).unwrap();
        let guard = locks.acquire("dev").unwrap();
        assert_ne!(guard.token(), stale.token);
    }

    #[test]
    fn test_refresh_extends_expiry() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        let mut guard = locks.acquire("dev").unwrap();
        let before = guard.expires_at();
        guard.refresh(Duration::from_secs(3600)).unwrap();
        assert!(guard.expires_at() > before);
        assert!(guard.is_held());
        assert_eq!(read_info(guard.path()).unwrap().expires_at, guard.expires_at());
    }

    #[test]
    fn test_drop_leaves_foreign_lock_alone() {
        let dir = TempDir::new().unwrap();
        let locks = manager(&dir);
        let guard = locks.acquire("dev").unwrap();
        // Someone broke our lock and took it.
        let other = LockInfo::new(Duration::from_secs(30));
        fs::write(guard.path(), serde_json::to_vec(&other).unwrap()).unwrap();
        assert!(!guard.is_held());
        drop(guard);
        assert_eq!(read_info(&locks.lock_path("dev")).unwrap().token, other.token);
    }
}
