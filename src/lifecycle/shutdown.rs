//! Shutdown coordination for the bridge.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Cheap to clone; every clone observes the same trigger. Long-running tasks
/// either await [`Shutdown::wait`] or hold a child token from
/// [`Shutdown::child_token`], which is cancelled along with the coordinator.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    /// A token cancelled when shutdown triggers, cancellable on its own
    /// without affecting the coordinator.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
