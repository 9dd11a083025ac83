//! Background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::registry::ConnectionRegistry;

/// Periodically purges expired registry entries.
///
/// Only backends without storage-side expiry have anything to do here; the
/// Redis backend reclaims entries via key TTLs and reports zero.
pub struct ExpirySweeper {
    interval: Duration,
    registry: Arc<dyn ConnectionRegistry>,
    shutdown: broadcast::Receiver<()>,
}

impl ExpirySweeper {
    pub fn new(
        interval: Duration,
        registry: Arc<dyn ConnectionRegistry>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            interval,
            registry,
            shutdown,
        }
    }

    /// Run until the shutdown signal arrives
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Expiry sweeper received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.sweep().await;
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }

    async fn sweep(&self) {
        match self.registry.purge_expired().await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::info!(removed = removed, "Purged expired connections");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Expiry sweep failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionRecord, MemoryConnectionRegistry};
    use chrono::Utc;

    #[tokio::test]
    async fn test_sweeper_shutdown() {
        let registry = Arc::new(MemoryConnectionRegistry::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let sweeper = ExpirySweeper::new(Duration::from_secs(60), registry, shutdown_rx);
        let handle = tokio::spawn(async move {
            sweeper.run().await;
        });

        // Wait a bit then send shutdown
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        // Task should complete
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn test_sweeper_purges_expired_entries() {
        let registry = Arc::new(MemoryConnectionRegistry::new());
        registry
            .put(&ConnectionRecord::new(
                "dead",
                "lobby",
                Utc::now() - chrono::Duration::seconds(5),
            ))
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let sweeper = ExpirySweeper::new(Duration::from_millis(10), registry.clone(), shutdown_rx);
        let handle = tokio::spawn(async move {
            sweeper.run().await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(registry.query_by_room("lobby").await.unwrap().is_empty());

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }
}
