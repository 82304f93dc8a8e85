//! Shutdown coordination.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Trigger shutdown and wait up to `grace` for `task` to finish.
    /// Returns `false` if the deadline passed first.
    pub async fn drain<F: Future>(&self, task: F, grace: Duration) -> bool {
        self.trigger();
        match tokio::time::timeout(grace, task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed");
                false
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_trigger() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);

        let task = tokio::spawn(async move { rx.recv().await.is_ok() });
        assert!(shutdown.drain(task, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let shutdown = Shutdown::new();
        let stuck = std::future::pending::<()>();
        assert!(!shutdown.drain(stuck, Duration::from_millis(20)).await);
    }
}
