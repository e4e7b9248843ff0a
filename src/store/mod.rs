//! On-disk list store: one JSON document per list plus its lock directory.
//!
//! ```text
//! <root>/lists/<name>.json
//! <root>/locks/<name>.lck
//! ```
//!
//! Loads are unlocked snapshots. Writes go through [`ListStore::save`], which
//! demands the list's [`LockGuard`], or through [`ListStore::with_list`],
//! which holds the lock for the whole load-mutate-save cycle.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{self, Config, LockConfig};
use crate::error::{ListError, Result};
use crate::lock::{LockGuard, LockManager};
use crate::model::list::MailingList;

const LISTS_DIR: &str = "lists";
const LOCKS_DIR: &str = "locks";
const LIST_EXT: &str = "json";

/// Persistent state of all lists under one data directory.
#[derive(Debug, Clone)]
pub struct ListStore {
    lists_dir: PathBuf,
    locks: LockManager,
}

impl ListStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: impl AsRef<Path>, lock_config: &LockConfig) -> Result<Self> {
        let root = root.as_ref();
        let lists_dir = root.join(LISTS_DIR);
        fs::create_dir_all(&lists_dir).map_err(|e| ListError::io(&lists_dir, e))?;
        let locks = LockManager::new(root.join(LOCKS_DIR), lock_config);
        Ok(Self { lists_dir, locks })
    }

    /// Open the store at the configured data directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config::data_dir(config), &config.locks)
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Replace the lock manager, e.g. to shorten the acquisition timeout.
    pub fn with_locks(mut self, locks: LockManager) -> Self {
        self.locks = locks;
        self
    }

    /// Internal names of all lists, sorted.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.lists_dir).map_err(|e| ListError::io(&self.lists_dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ListError::io(&self.lists_dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LIST_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.list_path(name).is_file()
    }

    /// Snapshots of all lists whose host name equals `host` (case-insensitive).
    /// Lists that cannot be read are skipped with a warning.
    pub fn lists_on_host(&self, host: &str) -> Result<Vec<MailingList>> {
        let mut lists = Vec::new();
        for name in self.list_names()? {
            match self.load(&name) {
                Ok(list) if list.host_name().eq_ignore_ascii_case(host) => lists.push(list),
                Ok(_) => {}
                Err(e) => warn!(list = %name, error = %e, "Skipping unreadable list"),
            }
        }
        Ok(lists)
    }

    /// Persist a brand-new list.
    pub fn create(&self, list: &MailingList) -> Result<()> {
        let name = list.internal_name();
        check_name(name)?;
        let guard = self.locks.acquire(name)?;
        if self.exists(name) {
            return Err(ListError::ListExists(name.to_string()));
        }
        self.save(list, &guard)?;
        info!(list = %name, host = %list.host_name(), "List created");
        Ok(())
    }

    /// Read an unlocked snapshot of a list.
    pub fn load(&self, name: &str) -> Result<MailingList> {
        check_name(name)?;
        let path = self.list_path(name);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ListError::ListNotFound(name.to_string()))
            }
            Err(e) => return Err(ListError::io(&path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| ListError::Corrupt {
            path,
            reason: e.to_string(),
        })
    }

    /// Write `list` atomically. `guard` must be the live lock for this list.
    pub fn save(&self, list: &MailingList, guard: &LockGuard) -> Result<()> {
        let name = list.internal_name();
        if guard.list() != name || !guard.is_held() {
            return Err(ListError::LockNotHeld(name.to_string()));
        }
        let path = self.list_path(name);
        let json = serde_json::to_vec_pretty(list).map_err(|e| ListError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let tmp = path.with_extension(format!("{LIST_EXT}.tmp-{}", &guard.token()[..8]));
        fs::write(&tmp, json).map_err(|e| ListError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| ListError::io(&path, e))?;
        debug!(list = %name, members = list.member_count(), "List saved");
        Ok(())
    }

    /// Acquire the lock for `name`.
    pub fn lock(&self, name: &str) -> Result<LockGuard> {
        check_name(name)?;
        self.locks.acquire(name)
    }

    /// Lock, load, mutate and save one list.
    ///
    /// The list is saved only when `f` returns `Ok`; the lock is released on
    /// every path out of this function.
    pub fn with_list<T>(&self, name: &str, f: impl FnOnce(&mut MailingList) -> Result<T>) -> Result<T> {
        let guard = self.lock(name)?;
        let mut list = self.load(name)?;
        let out = f(&mut list)?;
        self.save(&list, &guard)?;
        Ok(out)
    }

    fn list_path(&self, name: &str) -> PathBuf {
        self.lists_dir.join(format!("{name}.{LIST_EXT}"))
    }
}

/// List names double as file names: lower-case ASCII letters, digits, `-`,
/// `_` and `.`, not starting with `.`.
fn check_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ListError::InvalidRequest(format!("invalid list name: {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::password::PasswordHash;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ListStore {
        let config = LockConfig {
            timeout_secs: Some(1),
            poll_interval_ms: 5,
            ..LockConfig::default()
        };
        ListStore::open(dir.path(), &config).unwrap()
    }

    fn list(name: &str) -> MailingList {
        MailingList::new(name, "example.com", PasswordHash::new("admin"))
    }

    #[test]
    fn test_create_load_and_list() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let alpha = list("alpha");
        s.create(&list("beta")).unwrap();
        s.create(&alpha).unwrap();
        assert_eq!(s.list_names().unwrap(), vec!["alpha", "beta"]);
        assert_eq!(s.load("alpha").unwrap(), alpha);
        assert!(matches!(s.create(&list("alpha")), Err(ListError::ListExists(_))));
    }

    #[test]
    fn test_missing_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(matches!(s.load("ghost"), Err(ListError::ListNotFound(_))));
        fs::write(s.list_path("bad"), b"{not json").unwrap();
        assert!(matches!(s.load("bad"), Err(ListError::Corrupt { .. })));
        assert!(matches!(s.load("../etc"), Err(ListError::InvalidRequest(_))));
    }

    #[test]
    fn test_save_requires_the_right_guard() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create(&list("a")).unwrap();
        s.create(&list("b")).unwrap();
        let guard_b = s.lock("b").unwrap();
        let a = s.load("a").unwrap();
        assert!(matches!(s.save(&a, &guard_b), Err(ListError::LockNotHeld(_))));
    }

    #[test]
    fn test_with_list_saves_only_on_ok() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create(&list("dev")).unwrap();

        s.with_list("dev", |l| {
            l.config.description = "kept".into();
            Ok(())
        })
        .unwrap();
        let err = s.with_list("dev", |l| -> Result<()> {
            l.config.description = "dropped".into();
            Err(ListError::PermissionDenied("test"))
        });
        assert!(err.is_err());
        assert_eq!(s.load("dev").unwrap().config.description, "kept");
        // The failed closure still released the lock.
        let locks = s.locks().clone().with_timeout(Duration::from_millis(20));
        drop(locks.acquire("dev").unwrap());
    }

    #[test]
    fn test_lists_on_host() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.create(&list("one")).unwrap();
        s.create(&MailingList::new("two", "other.org", PasswordHash::new("x"))).unwrap();
        s.create(&list("three")).unwrap();
        fs::write(s.list_path("broken"), b"{").unwrap();
        let names: Vec<String> = s
            .lists_on_host("EXAMPLE.com")
            .unwrap()
            .iter()
            .map(|l| l.internal_name().to_string())
            .collect();
        assert_eq!(names, vec!["one", "three"]);
    }
}
