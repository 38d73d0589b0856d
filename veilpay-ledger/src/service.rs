//! Combined balance read path.
//!
//! Prefers activity replay, falls back to chronological replay, then to
//! the RPC snapshot cache, and finally to an explicit zero "no data"
//! response. Upstream failures degrade the source, they never surface as
//! errors to callers.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use veilpay_cache::AddressBalanceStore;
use veilpay_core::traits::LedgerStore;
use veilpay_core::types::{
    AccountAddress, AccountHoldings, AssetId, AssetTotal, BalanceDiscrepancy, BalanceResponse,
    BalanceSource, Chain,
};

use crate::activity::{activity_balances_for_address, activity_balances_for_user};
use crate::chrono_replay::chronological_balances_for_user;

/// Answers balance reads from the best available source.
pub struct BalanceService {
    store: Arc<dyn LedgerStore>,
    cache: Arc<AddressBalanceStore>,
}

impl BalanceService {
    /// Creates a balance service over the ledger and the snapshot cache.
    pub fn new(store: Arc<dyn LedgerStore>, cache: Arc<AddressBalanceStore>) -> Self {
        Self { store, cache }
    }

    /// Returns the user's balance across all attributed stealth addresses.
    ///
    /// Infallible by contract: each calculator that fails or comes back
    /// empty degrades to the next, down to an explicit zero response.
    #[instrument(skip(self), fields(user_id = %user_id, chain = %chain))]
    pub async fn get_balance(&self, user_id: Uuid, chain: Chain) -> BalanceResponse {
        let now = Utc::now();

        let assets = match activity_balances_for_user(&*self.store, user_id, chain).await {
            Ok(totals) if !totals.is_empty() => Some((totals, BalanceSource::Activity)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "activity replay failed, degrading");
                None
            }
        };

        let assets = match assets {
            Some(found) => Some(found),
            None => match chronological_balances_for_user(&*self.store, user_id, chain).await {
                Ok(totals) if !totals.is_empty() => {
                    Some((totals, BalanceSource::Chronological))
                }
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "chronological replay failed, degrading");
                    None
                }
            },
        };

        let assets = match assets {
            Some(found) => Some(found),
            None => self
                .cached_user_totals(user_id, chain)
                .await
                .map(|totals| (totals, BalanceSource::RpcCache)),
        };

        let Some((assets, source)) = assets else {
            debug!("no balance data from any source");
            return BalanceResponse::no_data(now);
        };

        let discrepancies = self.discrepancies_for(user_id, chain, &assets).await;
        BalanceResponse {
            assets,
            source,
            total_usd: None,
            as_of: now,
            discrepancies,
        }
    }

    /// Cache-first read of one address's holdings.
    ///
    /// A fresh snapshot wins; otherwise the activity replay for the
    /// address; otherwise an aged snapshot; otherwise empty holdings.
    pub async fn get_address_balance(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> AccountHoldings {
        if let Some(snapshot) = self.cache.get(address, chain) {
            return snapshot.holdings();
        }

        match activity_balances_for_address(&*self.store, address, chain).await {
            Ok(totals) if !totals.is_empty() => return holdings_of(&totals),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "address activity replay failed"),
        }

        // An old number beats no number.
        self.cache
            .peek(address, chain)
            .map(|snapshot| snapshot.holdings())
            .unwrap_or_default()
    }

    /// Sums aged cache snapshots over the user's attributed addresses.
    async fn cached_user_totals(&self, user_id: Uuid, chain: Chain) -> Option<Vec<AssetTotal>> {
        let addresses = match self.store.addresses_for_user(user_id, chain).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(error = %e, "address lookup failed");
                return None;
            }
        };

        let mut totals: BTreeMap<AssetId, u128> = BTreeMap::new();
        for address in addresses {
            if let Some(snapshot) = self.cache.peek(&address, chain) {
                let holdings = snapshot.holdings();
                if holdings.native_amount > 0 {
                    *totals.entry(AssetId::native()).or_insert(0) += holdings.native_amount;
                }
                for asset in holdings.assets {
                    *totals.entry(asset.asset_id).or_insert(0) += asset.amount;
                }
            }
        }

        if totals.is_empty() {
            return None;
        }
        Some(
            totals
                .into_iter()
                .map(|(asset_id, total)| AssetTotal { asset_id, total })
                .collect(),
        )
    }

    /// Best-effort comparison of replayed totals against cached RPC data.
    async fn discrepancies_for(
        &self,
        user_id: Uuid,
        chain: Chain,
        replayed: &[AssetTotal],
    ) -> Vec<BalanceDiscrepancy> {
        let Some(rpc_totals) = self.cached_user_totals(user_id, chain).await else {
            return Vec::new();
        };
        let rpc: BTreeMap<&AssetId, u128> =
            rpc_totals.iter().map(|t| (&t.asset_id, t.total)).collect();

        replayed
            .iter()
            .filter_map(|t| {
                let rpc_amount = *rpc.get(&t.asset_id)?;
                if rpc_amount == t.total {
                    return None;
                }
                Some(BalanceDiscrepancy {
                    asset_id: t.asset_id.clone(),
                    replayed: t.total,
                    rpc: rpc_amount,
                    delta: rpc_amount as i128 - t.total as i128,
                })
            })
            .collect()
    }
}

fn holdings_of(totals: &[AssetTotal]) -> AccountHoldings {
    let mut holdings = AccountHoldings::default();
    for t in totals {
        if t.asset_id.is_native() {
            holdings.native_amount = t.total;
        } else {
            holdings.assets.push(veilpay_core::types::AssetBalance {
                asset_id: t.asset_id.clone(),
                amount: t.total,
            });
        }
    }
    holdings
}

impl std::fmt::Debug for BalanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceService").finish_non_exhaustive()
    }
}
