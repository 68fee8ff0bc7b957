use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::EphemeralStore;

/// Tracing target for the expiry loop.
const TRACING_TARGET: &str = "ephemera_store::expiry";

/// Background task that drives [`EphemeralStore::reap_expired`].
///
/// A single loop serves every object: it sleeps until the earliest deadline
/// (capped at the tick interval), wakes early when a put introduces an
/// earlier deadline, and stops when its cancellation token fires.
pub struct ExpiryLoop {
    store: Arc<EphemeralStore>,
    cancel: CancellationToken,
}

impl ExpiryLoop {
    pub fn new(store: Arc<EphemeralStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Spawns the loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Runs until cancelled.
    pub async fn run(self) {
        info!(
            target: TRACING_TARGET,
            retention_secs = self.store.config().retention_secs,
            "expiry loop started"
        );

        loop {
            let report = self.store.reap_expired().await;
            if !report.is_idle() {
                debug!(
                    target: TRACING_TARGET,
                    expired = report.expired,
                    removed = report.removed,
                    retried = report.retried,
                    abandoned = report.abandoned,
                    draining = report.draining,
                    "expiry pass"
                );
            }

            let sleep = self.store.next_wakeup();
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,
                () = self.store.deadline_changed() => {}
                () = tokio::time::sleep(sleep) => {}
            }
        }

        info!(target: TRACING_TARGET, "expiry loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::StoreConfig;
    use crate::fs::FsBackend;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn loop_removes_expired_objects_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            retention_secs: 1,
            tick_interval_ms: 50,
            ..StoreConfig::with_directory(dir.path())
        };
        let backend = Arc::new(FsBackend::new(dir.path()).unwrap());
        let store = Arc::new(
            EphemeralStore::open(config, Arc::new(SystemClock), backend)
                .await
                .unwrap(),
        );

        let cancel = CancellationToken::new();
        let handle = ExpiryLoop::new(store.clone(), cancel.clone()).spawn();

        let stored = store.put(Bytes::from_static(b"%PDF"), "a.pdf").await.unwrap();
        let path = dir.path().join(stored.meta.id.as_str());
        assert!(path.exists());

        let mut gone = false;
        for _ in 0..60 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if !path.exists() {
                gone = true;
                break;
            }
        }
        assert!(gone, "expired object should have been removed");
        assert!(store.get(stored.meta.id.as_str()).await.unwrap_err().is_not_found());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should stop")
            .unwrap();
    }
}
