//! RPC balance snapshots (validation/ground truth path).
//!
//! Queries current holdings through the shared RPC gate and upserts the
//! address cache. Never the primary real-time source: a snapshot can lag by
//! its cache window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

use veilpay_cache::AddressBalanceStore;
use veilpay_core::error::Result;
use veilpay_core::traits::{ChainReader, LedgerStore};
use veilpay_core::types::{AccountAddress, AddressBalanceCache, Chain};
use veilpay_indexer::RpcGate;

/// Fetches and caches on-chain holdings per stealth address.
pub struct SnapshotService {
    reader: Arc<dyn ChainReader>,
    store: Arc<dyn LedgerStore>,
    cache: Arc<AddressBalanceStore>,
    gate: Arc<RpcGate>,
}

impl SnapshotService {
    /// Creates a snapshot service sharing the process-wide RPC gate.
    pub fn new(
        reader: Arc<dyn ChainReader>,
        store: Arc<dyn LedgerStore>,
        cache: Arc<AddressBalanceStore>,
        gate: Arc<RpcGate>,
    ) -> Self {
        Self {
            reader,
            store,
            cache,
            gate,
        }
    }

    /// Fetches fresh holdings for one address and upserts the cache entry,
    /// stamping the latest indexed activity as the staleness watermark.
    #[instrument(skip(self), fields(address = %address, chain = %chain))]
    pub async fn refresh_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<AddressBalanceCache> {
        let holdings = {
            let _permit = self.gate.acquire().await;
            self.reader.fetch_account_holdings(address).await?
        };

        let last_payment = self
            .store
            .latest_payment_at(address, chain)
            .await?
            .map(|p| p.timestamp);
        let last_withdrawal = self
            .store
            .withdrawals_for_address(address, chain)
            .await?
            .last()
            .map(|w| w.timestamp);
        let last_activity = match (last_payment, last_withdrawal) {
            (Some(p), Some(w)) => Some(p.max(w)),
            (p, w) => p.or(w),
        };

        let snapshot = AddressBalanceCache {
            address: *address,
            chain,
            native_amount: holdings.native_amount,
            assets: holdings.assets,
            last_fetched: Utc::now(),
            last_activity,
        };
        self.cache.upsert(snapshot.clone());
        debug!(native = snapshot.native_amount, "snapshot refreshed");
        Ok(snapshot)
    }

    /// Refreshes every address whose cached snapshot has outlived its tier
    /// TTL. Addresses are refreshed one at a time; the gate forbids
    /// parallel fan-out against the remote node.
    pub async fn refresh_stale(&self) -> Result<usize> {
        let stale = self.cache.stale_addresses();
        let mut refreshed = 0usize;
        for (address, chain) in stale {
            match self.refresh_address(&address, chain).await {
                Ok(_) => refreshed += 1,
                Err(e) => {
                    // One unreachable address must not starve the rest.
                    warn!(address = %address, error = %e, "stale refresh failed");
                }
            }
        }
        Ok(refreshed)
    }
}

impl std::fmt::Debug for SnapshotService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotService").finish_non_exhaustive()
    }
}

/// Periodically refreshes stale address snapshots until stopped.
pub struct RefreshWorker {
    service: Arc<SnapshotService>,
    refresh_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RefreshWorker {
    /// Creates a refresh worker around a snapshot service.
    pub fn new(service: Arc<SnapshotService>, refresh_interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            service,
            refresh_interval,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawns the refresh loop and returns a handle to stop it.
    pub fn start(self) -> RefreshHandle {
        let shutdown_tx = self.shutdown_tx.clone();
        let task_handle = tokio::spawn(async move {
            self.run_loop().await;
        });
        RefreshHandle {
            shutdown_tx,
            task_handle,
        }
    }

    async fn run_loop(self) {
        let mut tick = interval(self.refresh_interval);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            refresh_interval_secs = self.refresh_interval.as_secs(),
            "snapshot refresh worker started"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.service.refresh_stale().await {
                        Ok(0) => {}
                        Ok(n) => debug!(refreshed = n, "stale snapshots refreshed"),
                        Err(e) => warn!(error = %e, "stale refresh pass failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("snapshot refresh worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle to a running refresh worker.
pub struct RefreshHandle {
    shutdown_tx: watch::Sender<bool>,
    task_handle: JoinHandle<()>,
}

impl RefreshHandle {
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
