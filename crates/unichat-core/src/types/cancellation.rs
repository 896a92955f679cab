//! Abort handle for in-flight turns

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Why a turn was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The user pressed stop
    UserStop,
    /// The per-turn deadline elapsed
    Timeout,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::UserStop => write!(f, "stopped by user"),
            AbortReason::Timeout => write!(f, "timed out"),
        }
    }
}

/// Handle for aborting one in-flight turn
///
/// Clones share state. The first `abort` wins and records its reason;
/// later calls are no-ops.
#[derive(Clone)]
pub struct AbortHandle {
    inner: Arc<AbortHandleInner>,
}

struct AbortHandleInner {
    aborted: AtomicBool,
    reason: OnceLock<AbortReason>,
    notify: Notify,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    /// Create a new, unsignaled handle
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AbortHandleInner {
                aborted: AtomicBool::new(false),
                reason: OnceLock::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Check if the turn has been aborted
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Abort on behalf of the user
    ///
    /// Returns `true` only for the call that actually signaled the handle.
    pub fn abort(&self) -> bool {
        self.abort_with(AbortReason::UserStop)
    }

    /// Abort with an explicit reason
    pub fn abort_with(&self, reason: AbortReason) -> bool {
        let _ = self.inner.reason.set(reason);
        if self.inner.aborted.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// The reason recorded by the effective abort, if any
    pub fn reason(&self) -> Option<AbortReason> {
        if self.is_aborted() {
            self.inner.reason.get().copied()
        } else {
            None
        }
    }

    /// Wait until the handle is signaled
    pub async fn aborted(&self) {
        // Register before checking the flag so a concurrent abort is not missed.
        let notified = self.inner.notify.notified();
        if self.is_aborted() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("is_aborted", &self.is_aborted())
            .field("reason", &self.reason())
            .finish()
    }
}
