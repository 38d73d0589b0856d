//! Reconciliation of activity-replay balances against RPC snapshots.
//!
//! The RPC snapshot is ground truth; the fast path self-corrects through
//! bounded `BalanceAdjustment` rows. Gaps past the anomaly ceiling are
//! surfaced and never applied, and corrections are only written from
//! snapshots fresh enough to trust.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};

use veilpay_cache::AddressBalanceStore;
use veilpay_core::constants::OCTAS_PER_COIN;
use veilpay_core::error::Result;
use veilpay_core::traits::LedgerStore;
use veilpay_core::types::{AccountAddress, AssetId, BalanceAdjustment, Chain};

use crate::activity::aggregate_unadjusted;

/// Reconciliation thresholds.
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// Gaps at or under this (in subunits) are negligible.
    pub epsilon: u128,
    /// Gaps at or over this are data anomalies, never auto-corrected.
    pub anomaly_ceiling: u128,
    /// Oldest snapshot trusted as a correction source.
    pub max_snapshot_age: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            epsilon: 1,
            anomaly_ceiling: OCTAS_PER_COIN,
            max_snapshot_age: Duration::minutes(5),
        }
    }
}

/// Result of reconciling one (address, asset).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Replay and snapshot already agree within epsilon.
    Converged,
    /// A stale adjustment existed and the gap has closed; deleted.
    AdjustmentDeleted,
    /// A correction of this size (rpc minus replay) was written.
    AdjustmentUpserted(i128),
    /// No snapshot, or the snapshot is too old to correct from.
    SnapshotTooOld,
    /// Gap at or past the ceiling; surfaced, not applied.
    Anomaly(i128),
}

/// Diffs RPC snapshots against activity replay and maintains adjustments.
pub struct Reconciler {
    store: Arc<dyn LedgerStore>,
    cache: Arc<AddressBalanceStore>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Creates a reconciler with the given thresholds.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<AddressBalanceStore>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Reconciles a single (address, asset) pair.
    ///
    /// The replay side deliberately excludes existing adjustments: the
    /// correction must equal snapshot minus raw replay, or it would feed
    /// back into its own next computation.
    #[instrument(skip(self), fields(address = %address, asset = %asset_id))]
    pub async fn reconcile(
        &self,
        address: &AccountAddress,
        chain: Chain,
        asset_id: &AssetId,
    ) -> Result<ReconcileOutcome> {
        let snapshot = match self.cache.peek(address, chain) {
            Some(snapshot) => snapshot,
            None => return Ok(ReconcileOutcome::SnapshotTooOld),
        };

        let payments = self.store.payments_for_address(address, chain).await?;
        let withdrawals = self.store.withdrawals_for_address(address, chain).await?;
        let raw = aggregate_unadjusted(&payments, &withdrawals);
        let replayed = raw.get(asset_id).copied().unwrap_or(0);
        let rpc = snapshot.holdings().amount_of(asset_id) as i128;
        let diff = rpc - replayed;

        if diff.unsigned_abs() <= self.config.epsilon {
            let had_adjustment = self
                .store
                .adjustments_for_address(address, chain)
                .await?
                .iter()
                .any(|a| &a.asset_id == asset_id);
            if had_adjustment {
                self.store.delete_adjustment(address, chain, asset_id).await?;
                debug!("gap closed, adjustment deleted");
                return Ok(ReconcileOutcome::AdjustmentDeleted);
            }
            return Ok(ReconcileOutcome::Converged);
        }

        if diff.unsigned_abs() >= self.config.anomaly_ceiling {
            warn!(
                diff,
                ceiling = self.config.anomaly_ceiling,
                "balance gap exceeds anomaly ceiling, refusing to correct"
            );
            return Ok(ReconcileOutcome::Anomaly(diff));
        }

        if snapshot.is_stale(self.config.max_snapshot_age, Utc::now()) {
            debug!(diff, "snapshot too old to correct from");
            return Ok(ReconcileOutcome::SnapshotTooOld);
        }

        let user_id = self.store.attributed_owner_of(address, chain).await?;
        self.store
            .upsert_adjustment(BalanceAdjustment {
                stealth_owner: *address,
                chain,
                asset_id: asset_id.clone(),
                user_id,
                amount: diff,
                updated_at: Utc::now(),
            })
            .await?;
        info!(diff, "balance adjustment upserted");
        Ok(ReconcileOutcome::AdjustmentUpserted(diff))
    }

    /// Reconciles every asset seen at an address, on either side.
    pub async fn reconcile_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Vec<(AssetId, ReconcileOutcome)>> {
        let mut assets: BTreeSet<AssetId> = BTreeSet::new();
        if let Some(snapshot) = self.cache.peek(address, chain) {
            assets.insert(AssetId::native());
            assets.extend(snapshot.assets.iter().map(|a| a.asset_id.clone()));
        }
        for p in self.store.payments_for_address(address, chain).await? {
            assets.insert(p.asset_id);
        }
        for w in self.store.withdrawals_for_address(address, chain).await? {
            assets.insert(w.asset_id);
        }

        let mut outcomes = Vec::with_capacity(assets.len());
        for asset_id in assets {
            let outcome = self.reconcile(address, chain, &asset_id).await?;
            outcomes.push((asset_id, outcome));
        }
        Ok(outcomes)
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
