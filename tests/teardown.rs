//! Process-level lock release. Kept in its own test binary because
//! `release_all` drains every lock the process holds.

use std::time::Duration;

use tempfile::TempDir;

use listmgr::config::LockConfig;
use listmgr::lock::{self, LockManager};

// ─── Test 1: release_all frees held locks for the next request ──────

#[test]
fn test_release_all_then_reacquire() {
    let dir = TempDir::new().unwrap();
    let config = LockConfig {
        timeout_secs: Some(1),
        poll_interval_ms: 5,
        ..LockConfig::default()
    };
    let locks = LockManager::new(dir.path(), &config);

    let stale = locks.acquire("dev").unwrap();
    let archiver = locks.acquire_archiver("dev").unwrap();
    assert_eq!(lock::held_count(), 2);

    assert_eq!(lock::release_all(), 2);
    assert_eq!(lock::held_count(), 0);
    assert!(!locks.is_locked("dev"));
    assert!(!stale.is_held());

    let fresh = locks
        .with_timeout(Duration::from_millis(200))
        .acquire("dev")
        .unwrap();
    assert!(fresh.is_held());

    // Dropping the old guard must not remove the new owner's lock.
    drop(stale);
    drop(archiver);
    assert!(fresh.is_held());
    assert!(fresh.path().exists());

    fresh.release();
    assert_eq!(lock::held_count(), 0);
}
