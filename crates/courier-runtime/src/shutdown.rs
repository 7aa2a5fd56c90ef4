//! Graceful shutdown of all live sessions.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::registry::SessionRegistry;

/// Broadcasts termination to every live session and waits, bounded, for the
/// supervisors to finish. Sessions that do not drain in time are abandoned
/// rather than blocking process exit.
pub struct ShutdownCoordinator {
    registry: Arc<SessionRegistry>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Build a coordinator over the shared registry.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Terminate everything. Returns the number of sessions that reached
    /// `Terminated` within the window.
    #[instrument(skip(self), fields(sessions = self.registry.len()))]
    pub async fn shutdown(&self) -> usize {
        let handles = self.registry.handles();
        if handles.is_empty() {
            return 0;
        }
        info!(count = handles.len(), "shutting down sessions");

        for handle in &handles {
            handle.signal_stop();
        }

        let waits = handles.iter().map(|handle| {
            let mut terminated = handle.terminated();
            async move { terminated.wait_for(|done| *done).await.is_ok() }
        });
        let all_done = futures::future::join_all(waits);

        match tokio::time::timeout(self.timeout, all_done).await {
            Ok(results) => {
                let drained = results.into_iter().filter(|ok| *ok).count();
                info!(drained, "all sessions terminated");
                drained
            }
            Err(_) => {
                let drained = handles
                    .iter()
                    .filter(|handle| *handle.terminated().borrow())
                    .count();
                warn!(
                    drained,
                    abandoned = handles.len() - drained,
                    "shutdown timeout elapsed, abandoning remaining sessions"
                );
                drained
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
