//! Process-wide registry of held locks, released on termination signals.
//!
//! Every [`LockGuard`](super::LockGuard) registers itself for as long as it
//! lives. The termination handler releases whatever is still registered and
//! then exits, so an interrupted request never leaves a lock behind until its
//! lifetime runs out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};

use parking_lot::Mutex;
use tracing::{error, warn};

/// Exit status after a termination signal (128 + SIGINT).
const SIGNAL_EXIT_CODE: i32 = 130;

static HELD: LazyLock<Mutex<HashMap<String, PathBuf>>> = LazyLock::new(|| Mutex::new(HashMap::new()));
static HANDLER: OnceLock<Result<(), String>> = OnceLock::new();

pub(super) fn register(token: &str, path: &Path) {
    HELD.lock().insert(token.to_string(), path.to_path_buf());
}

pub(super) fn unregister(token: &str) {
    HELD.lock().remove(token);
}

/// Number of locks this process currently holds.
pub fn held_count() -> usize {
    HELD.lock().len()
}

/// Release every lock this process holds. Returns how many files were removed.
pub fn release_all() -> usize {
    let held: Vec<(String, PathBuf)> = HELD.lock().drain().collect();
    let mut released = 0;
    for (token, path) in held {
        match super::remove_if_owned(&path, &token) {
            Ok(true) => released += 1,
            Ok(false) => {}
            Err(e) => error!(path = %path.display(), error = %e, "Could not release lock"),
        }
    }
    released
}

/// Install the SIGINT/SIGTERM/SIGHUP handler. Safe to call more than once.
pub fn install_termination_handler() -> anyhow::Result<()> {
    let outcome = HANDLER.get_or_init(|| {
        ctrlc::set_handler(|| {
            let released = release_all();
            warn!(released, "Terminated; released held locks");
            std::process::exit(SIGNAL_EXIT_CODE);
        })
        .map_err(|e| e.to_string())
    });
    outcome
        .clone()
        .map_err(|e| anyhow::anyhow!("cannot install termination handler: {e}"))
}
