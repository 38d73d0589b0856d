//! Balance views, caches, and read-path response types.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::address::AccountAddress;
use crate::types::chain::{AssetId, Chain};

// ═══════════════════════════════════════════════════════════════════════════════
// HOLDINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// One asset's holding in subunits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset_id: AssetId,
    pub amount: u128,
}

/// Current holdings of one account as reported by the chain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountHoldings {
    pub native_amount: u128,
    pub assets: Vec<AssetBalance>,
}

impl AccountHoldings {
    /// Looks up the reported amount for an asset, treating the native coin
    /// entry and the asset list uniformly.
    pub fn amount_of(&self, asset: &AssetId) -> u128 {
        if asset.is_native() {
            return self.native_amount;
        }
        self.assets
            .iter()
            .find(|a| &a.asset_id == asset)
            .map(|a| a.amount)
            .unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHES
// ═══════════════════════════════════════════════════════════════════════════════

/// Cached RPC snapshot of one address's holdings.
///
/// Upserted by snapshot queries; deleted by the invalidation hook whenever a
/// new event for the address is indexed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddressBalanceCache {
    pub address: AccountAddress,
    pub chain: Chain,
    pub native_amount: u128,
    pub assets: Vec<AssetBalance>,
    pub last_fetched: DateTime<Utc>,
    /// Watermark of the newest indexed activity known at fetch time.
    pub last_activity: Option<DateTime<Utc>>,
}

impl AddressBalanceCache {
    /// Returns true if the snapshot is older than the given window.
    pub fn is_stale(&self, window: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_fetched > window
    }

    /// Returns the snapshot as plain holdings.
    pub fn holdings(&self) -> AccountHoldings {
        AccountHoldings {
            native_amount: self.native_amount,
            assets: self.assets.clone(),
        }
    }
}

/// Per-(user, chain) aggregate used to answer "is this summary stale"
/// without recomputation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserBalanceSummary {
    pub user_id: Uuid,
    pub chain: Chain,
    pub total_native: u128,
    pub total_usd: Option<Decimal>,
    pub last_full_refresh: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl UserBalanceSummary {
    /// A summary is stale when activity landed after its last full refresh,
    /// or when it has simply aged past the window.
    pub fn is_stale(&self, window: Duration, now: DateTime<Utc>) -> bool {
        if let Some(activity) = self.last_activity {
            if activity > self.last_full_refresh {
                return true;
            }
        }
        now - self.last_full_refresh > window
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// READ-PATH RESPONSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Which calculator produced a balance response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    /// Fast path: indexed activity replay.
    Activity,
    /// Fallback: high-precision chronological replay.
    Chronological,
    /// Last resort: cached RPC snapshot.
    RpcCache,
    /// Nothing available; totals are zero.
    NoData,
}

impl std::fmt::Display for BalanceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BalanceSource::Activity => "activity",
            BalanceSource::Chronological => "chronological",
            BalanceSource::RpcCache => "rpc_cache",
            BalanceSource::NoData => "no_data",
        };
        f.write_str(s)
    }
}

/// One asset total in a balance response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTotal {
    pub asset_id: AssetId,
    pub total: u128,
}

/// Observed gap between the replayed balance and the RPC snapshot,
/// reported for observability alongside reads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceDiscrepancy {
    pub asset_id: AssetId,
    pub replayed: u128,
    pub rpc: u128,
    /// rpc minus replayed.
    pub delta: i128,
}

/// Combined balance read returned to callers. Always best-effort: failures
/// upstream degrade the source tag, they never surface as errors here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub assets: Vec<AssetTotal>,
    pub source: BalanceSource,
    pub total_usd: Option<Decimal>,
    pub as_of: DateTime<Utc>,
    pub discrepancies: Vec<BalanceDiscrepancy>,
}

impl BalanceResponse {
    /// An explicit "no data" result with zero totals.
    pub fn no_data(now: DateTime<Utc>) -> Self {
        Self {
            assets: Vec::new(),
            source: BalanceSource::NoData,
            total_usd: None,
            as_of: now,
            discrepancies: Vec::new(),
        }
    }
}
