//! Background task purging expired elements.
//!
//! Each store gets one sweeper. It wakes every `sweep_interval`, calls
//! [`ElementStore::evict_expired`] and goes back to sleep. The sweep itself
//! runs under the store lock, so it never races a concurrent read or write.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::store::ElementStore;
use crate::cache::types::CacheError;

/// Periodic expiration sweep for one store.
///
/// Must be started from within a tokio runtime. Dropping the sweeper
/// cancels it without waiting; use [`ExpirySweeper::shutdown`] to wait for
/// an in-progress sweep to finish.
pub struct ExpirySweeper {
    /// Handle to the sweep task
    handle: Option<JoinHandle<()>>,
    /// Shutdown signal
    shutdown: CancellationToken,
}

impl ExpirySweeper {
    /// Start sweeping `store` at its configured interval.
    pub fn start(store: Arc<ElementStore>) -> Self {
        let shutdown = CancellationToken::new();
        let interval = store.config().sweep_interval;
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            Self::run_loop(store, interval, token).await;
        });

        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// The main sweep loop.
    async fn run_loop(store: Arc<ElementStore>, interval: Duration, shutdown: CancellationToken) {
        info!(
            cache = %store.name(),
            interval_ms = interval.as_millis() as u64,
            "Expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(cache = %store.name(), "Expiry sweeper received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match store.evict_expired().await {
                        Ok(_) => {}
                        Err(CacheError::RegistryClosed) => break,
                        Err(e) => warn!(cache = %store.name(), error = %e, "Expiry sweep failed"),
                    }
                }
            }
        }

        debug!(cache = %store.name(), "Expiry sweeper stopped");
    }

    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Expiry sweeper task failed");
            }
        }
    }

    /// Check if the sweep task is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::ElementOptions;
    use crate::config::CacheConfig;
    use tempfile::TempDir;

    async fn store(temp: &TempDir, interval: Duration) -> Arc<ElementStore> {
        let config = CacheConfig::default().with_sweep_interval(interval);
        Arc::new(
            ElementStore::open("sweep", config, temp.path().join("sweep"))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_sweeper_purges_expired_elements() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, Duration::from_millis(20)).await;
        let short = ElementOptions::new().with_ttl(Duration::from_millis(10));
        store.put_with("a", vec![1], short).await.unwrap();
        store.put("b", vec![2]).await.unwrap();

        let sweeper = ExpirySweeper::start(store.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.memory_resident_keys().await.unwrap(), vec!["b"]);
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_starts_and_stops() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, Duration::from_secs(60)).await;

        let sweeper = ExpirySweeper::start(store);
        assert!(sweeper.is_running());
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_store_closes() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, Duration::from_millis(10)).await;

        let sweeper = ExpirySweeper::start(store.clone());
        store.close().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!sweeper.is_running());
    }

    #[tokio::test]
    async fn test_sweeper_drop_cancels() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, Duration::from_secs(60)).await;

        {
            let _sweeper = ExpirySweeper::start(store.clone());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Only the test holds the store once the task has exited
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
