//! Cache invalidation hooks.
//!
//! The indexer calls these after persisting each new row, before moving to
//! the next event, so reads issued right after an indexing cycle never see
//! snapshots or adjustments from before the new activity.

use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};
use uuid::Uuid;

use veilpay_core::error::Result;
use veilpay_core::traits::LedgerStore;
use veilpay_core::types::{AccountAddress, Chain};

use crate::store::{AddressBalanceStore, UserSummaryStore};

/// Invalidates balance caches and stale adjustments on new activity.
pub struct BalanceInvalidator {
    store: Arc<dyn LedgerStore>,
    address_cache: Arc<AddressBalanceStore>,
    user_summaries: Arc<UserSummaryStore>,
}

impl BalanceInvalidator {
    /// Creates a new invalidator over the given store and caches.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        address_cache: Arc<AddressBalanceStore>,
        user_summaries: Arc<UserSummaryStore>,
    ) -> Self {
        Self {
            store,
            address_cache,
            user_summaries,
        }
    }

    /// Invalidates after a new payment was indexed at `address`.
    ///
    /// Drops the address snapshot, deletes the address's adjustments (the
    /// reconciliation they came from predates this activity), and marks the
    /// owner's summary stale when the owner is known.
    #[instrument(skip(self), fields(address = %address, chain = ?chain))]
    pub async fn on_new_payment(
        &self,
        address: &AccountAddress,
        chain: Chain,
        link_id: Option<Uuid>,
    ) -> Result<()> {
        self.address_cache.remove(address, chain);
        self.store.delete_adjustments_for_address(address, chain).await?;

        match self.store.attributed_owner_of(address, chain).await {
            Ok(Some(owner)) => {
                self.user_summaries.mark_activity(owner, chain, Utc::now());
            }
            Ok(None) => {}
            Err(e) => {
                // Cache rows are already gone; a missed watermark only
                // delays summary refresh by one TTL.
                warn!(error = %e, "owner lookup failed during invalidation");
            }
        }

        Ok(())
    }

    /// Invalidates after a new withdrawal was indexed from `address`.
    #[instrument(skip(self), fields(address = %address, chain = ?chain))]
    pub async fn on_new_withdrawal(
        &self,
        address: &AccountAddress,
        chain: Chain,
        user_id: Option<Uuid>,
    ) -> Result<()> {
        self.address_cache.remove(address, chain);
        self.store.delete_adjustments_for_address(address, chain).await?;

        if let Some(user_id) = user_id {
            self.user_summaries.mark_activity(user_id, chain, Utc::now());
        }

        Ok(())
    }
}
