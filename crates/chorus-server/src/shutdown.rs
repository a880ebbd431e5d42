//! Shutdown of the listener and the relay workers it spawned.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::graceful_shutdown`] waits by default.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the shutdown signal and tracks every in-flight connection.
///
/// axum runs upgraded sockets on detached tasks, so the serve task finishing
/// says nothing about them. Each upgrade holds a [`TaskTrackerToken`] until
/// its worker has left the hub and closed its socket.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    connections: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Register one connection. Drop the guard once its cleanup is done.
    pub fn track_connection(&self) -> TaskTrackerToken {
        self.connections.token()
    }

    /// Connections registered and not yet finished.
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for `handles` and every tracked
    /// connection to finish.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        let _ = self.connections.close();
        info!(
            task_count = handles.len(),
            connections = self.connections.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let drain = async {
            let _ = futures::future::join_all(handles).await;
            self.connections.wait().await;
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                connections = self.connections.len(),
                "shutdown timed out after {timeout:?}, some tasks may still be running"
            );
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        assert_eq!(coord.active_connections(), 0);
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!token.is_cancelled());
        coord.shutdown();
        coord.shutdown();
        assert!(token.is_cancelled());
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn connection_guard_counts_until_dropped() {
        let coord = ShutdownCoordinator::new();
        let guard = coord.track_connection();
        assert_eq!(coord.active_connections(), 1);
        drop(guard);
        assert_eq!(coord.active_connections(), 0);
    }

    #[tokio::test]
    async fn graceful_shutdown_awaits_all_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();

        let handle = tokio::spawn(async move {
            token.cancelled().await;
        });

        coord.graceful_shutdown(vec![handle], None).await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn graceful_shutdown_waits_for_tracked_connections() {
        let coord = ShutdownCoordinator::new();
        let cleaned_up = Arc::new(AtomicBool::new(false));

        let guard = coord.track_connection();
        let token = coord.token();
        let flag = Arc::clone(&cleaned_up);
        // Detached, like an upgraded socket: nobody holds this handle.
        drop(tokio::spawn(async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            drop(guard);
        }));

        coord.graceful_shutdown(Vec::new(), None).await;
        assert!(cleaned_up.load(Ordering::SeqCst));
        assert_eq!(coord.active_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_times_out() {
        let coord = ShutdownCoordinator::new();

        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });
        let _stuck = coord.track_connection();

        coord
            .graceful_shutdown(vec![handle], Some(Duration::from_millis(100)))
            .await;
        assert!(coord.is_shutting_down());
        assert_eq!(coord.active_connections(), 1);
    }
}
