//! Registry of live CLI processes keyed by session identifier.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::{Mutex, RwLock};

pub type SharedChild = Arc<Mutex<Child>>;

/// Mapping from session key to the process handle serving it.
///
/// A key is provisional (derived from submission time) until the provider
/// reports the real session id, at which point the entry is re-keyed. The
/// registry is the only state shared between invocations; it is an owned,
/// injectable instance rather than a process-wide global.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    processes: RwLock<HashMap<String, SharedChild>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: &str, child: SharedChild) {
        self.processes
            .write()
            .await
            .insert(key.to_string(), child);
    }

    pub async fn remove(&self, key: &str) -> Option<SharedChild> {
        self.processes.write().await.remove(key)
    }

    /// Move an entry from its provisional key to the discovered session id.
    ///
    /// Performed under a single write lock so a concurrent abort on either
    /// key observes a consistent map. A missing old key means the entry was
    /// already cleaned up (abort won the race); nothing is inserted then.
    pub async fn rekey(&self, old_key: &str, new_key: &str) {
        if old_key == new_key {
            return;
        }
        let mut processes = self.processes.write().await;
        if let Some(child) = processes.remove(old_key) {
            processes.insert(new_key.to_string(), child);
        }
    }

    /// Terminate the process registered under `key`.
    ///
    /// Returns false when no entry exists, which also covers the race where
    /// the natural-exit handler removed it first. Termination is best-effort
    /// and asynchronous; final event emission and resource cleanup stay with
    /// the natural-close handler once the OS delivers the exit.
    pub async fn abort(&self, key: &str) -> bool {
        let child = match self.remove(key).await {
            Some(child) => child,
            None => return false,
        };
        let mut guard = child.lock().await;
        tracing::info!(session_key = %key, pid = guard.id(), "aborting CLI session");
        terminate(&mut guard);
        true
    }

    pub async fn is_active(&self, key: &str) -> bool {
        self.processes.read().await.contains_key(key)
    }

    pub async fn active_sessions(&self) -> Vec<String> {
        self.processes.read().await.keys().cloned().collect()
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SIGTERM first so the CLI can flush and exit cleanly.
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
        return;
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}
