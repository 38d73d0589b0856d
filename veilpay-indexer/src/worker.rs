//! Background workers.
//!
//! The indexer worker polls for new chain events on a fixed interval; the
//! cleanup worker evicts expired cache entries. Both run as detached tokio
//! tasks controlled through a watch-channel shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use veilpay_cache::{AddressBalanceStore, UserSummaryStore};

use crate::indexer::EventIndexer;

/// Configuration for the polling worker.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Interval between indexing cycles.
    pub poll_interval: Duration,
    /// Consecutive cycle failures before escalating the log level.
    pub failure_alert_threshold: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            failure_alert_threshold: 3,
        }
    }
}

/// Periodically runs indexing cycles until stopped.
pub struct IndexerWorker {
    indexer: Arc<EventIndexer>,
    config: WorkerConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IndexerWorker {
    /// Creates a worker around an indexer.
    pub fn new(indexer: Arc<EventIndexer>, config: WorkerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            indexer,
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawns the polling loop and returns a handle to stop it.
    pub fn start(self) -> WorkerHandle {
        let shutdown_tx = self.shutdown_tx.clone();
        let task_handle = tokio::spawn(async move {
            self.run_loop().await;
        });
        WorkerHandle {
            shutdown_tx,
            task_handle,
        }
    }

    async fn run_loop(self) {
        let mut tick = interval(self.config.poll_interval);
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut consecutive_failures: u32 = 0;

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "indexer worker started"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.indexer.run_cycle().await {
                        Ok(stats) => {
                            consecutive_failures = 0;
                            debug!(
                                payments = stats.payments_inserted,
                                withdrawals = stats.withdrawals_inserted,
                                "cycle ok"
                            );
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            if consecutive_failures >= self.config.failure_alert_threshold {
                                error!(
                                    consecutive_failures,
                                    error = %e,
                                    "indexing cycle keeps failing"
                                );
                            } else {
                                warn!(error = %e, "indexing cycle failed, will retry");
                            }
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("indexer worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Periodically evicts expired balance cache entries.
pub struct CacheCleanupWorker {
    address_cache: Arc<AddressBalanceStore>,
    user_summaries: Arc<UserSummaryStore>,
    cleanup_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl CacheCleanupWorker {
    /// Creates a cleanup worker over both cache stores.
    pub fn new(
        address_cache: Arc<AddressBalanceStore>,
        user_summaries: Arc<UserSummaryStore>,
        cleanup_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            address_cache,
            user_summaries,
            cleanup_interval,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawns the cleanup loop and returns a handle to stop it.
    pub fn start(self) -> WorkerHandle {
        let shutdown_tx = self.shutdown_tx.clone();
        let task_handle = tokio::spawn(async move {
            self.run_loop().await;
        });
        WorkerHandle {
            shutdown_tx,
            task_handle,
        }
    }

    async fn run_loop(self) {
        let mut tick = interval(self.cleanup_interval);
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let addresses = self.address_cache.cleanup_expired();
                    let summaries = self.user_summaries.cleanup_expired();
                    if addresses + summaries > 0 {
                        debug!(addresses, summaries, "evicted expired cache entries");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

/// Handle to a running background worker.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    task_handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signals shutdown and waits for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task_handle.await;
    }

    /// Returns true while the worker task is still running.
    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::RpcGate;
    use crate::indexer::{EventIndexer, IndexerConfig};
    use crate::testing::{payment_tx, MockChainReader};
    use chrono::Utc;
    use veilpay_cache::BalanceInvalidator;
    use veilpay_core::traits::LedgerStore;
    use veilpay_core::types::{AccountAddress, Chain, RegisteredViewingKey};
    use veilpay_crypto::derive_meta_keys;
    use veilpay_stealth::create_payment_bundle;
    use veilpay_store::MemoryLedgerStore;

    fn build_indexer(
        reader: Arc<MockChainReader>,
        store: Arc<MemoryLedgerStore>,
    ) -> Arc<EventIndexer> {
        let invalidator = Arc::new(BalanceInvalidator::new(
            store.clone(),
            Arc::new(AddressBalanceStore::new()),
            Arc::new(UserSummaryStore::new()),
        ));
        Arc::new(EventIndexer::new(
            reader,
            store,
            invalidator,
            Arc::new(RpcGate::new(Duration::ZERO)),
            IndexerConfig::new(AccountAddress::from_array([0xCC; 32]), Chain::AptosTestnet),
        ))
    }

    #[tokio::test]
    async fn test_worker_indexes_and_stops() {
        let reader = Arc::new(MockChainReader::new());
        let store = Arc::new(MemoryLedgerStore::new());

        let meta = derive_meta_keys(&[1u8; 32], Chain::AptosTestnet).unwrap();
        store
            .register_viewing_key(RegisteredViewingKey {
                user_id: uuid::Uuid::new_v4(),
                chain: Chain::AptosTestnet,
                spend_pub: meta.spend.public,
                view_pub: meta.view.public,
                view_secret: meta.view.secret.clone(),
                active: true,
                registered_at: Utc::now(),
            })
            .await
            .unwrap();
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();
        reader.push(payment_tx(10, "0xp1", &bundle, [9u8; 32], 100));

        let worker = IndexerWorker::new(
            build_indexer(reader, store.clone()),
            WorkerConfig {
                poll_interval: Duration::from_millis(10),
                failure_alert_threshold: 3,
            },
        );
        let handle = worker.start();
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.payment_count(), 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_worker_survives_cycle_failures() {
        let reader = Arc::new(MockChainReader::new());
        let store = Arc::new(MemoryLedgerStore::new());
        reader.fail_next();

        let worker = IndexerWorker::new(
            build_indexer(reader.clone(), store.clone()),
            WorkerConfig {
                poll_interval: Duration::from_millis(10),
                failure_alert_threshold: 2,
            },
        );
        let handle = worker.start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(handle.is_running());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_cleanup_worker_stops_cleanly() {
        let worker = CacheCleanupWorker::new(
            Arc::new(AddressBalanceStore::new()),
            Arc::new(UserSummaryStore::new()),
            Duration::from_millis(10),
        );
        let handle = worker.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop().await;
    }
}
