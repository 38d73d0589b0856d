//! High-precision chronological replay (fallback/audit path).
//!
//! Re-derives the same aggregate as activity replay, but walks every event
//! in strict timestamp order with `Decimal` arithmetic. Used when the fast
//! path yields nothing, and as an audit cross-check.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use veilpay_core::error::Result;
use veilpay_core::traits::LedgerStore;
use veilpay_core::types::{
    AccountAddress, AssetId, AssetTotal, BalanceAdjustment, Chain, IndexedPayment,
    IndexedWithdrawal,
};

enum LedgerEvent<'a> {
    Credit(&'a IndexedPayment),
    Debit(&'a IndexedWithdrawal),
}

impl LedgerEvent<'_> {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Credit(p) => p.timestamp,
            LedgerEvent::Debit(w) => w.timestamp,
        }
    }

    fn version(&self) -> u64 {
        match self {
            LedgerEvent::Credit(p) => p.version,
            LedgerEvent::Debit(w) => w.version,
        }
    }
}

fn decimal_of(amount: u128) -> Decimal {
    // Chain amounts fit comfortably in i128 for realistic supplies; a value
    // outside Decimal's mantissa is clamped and flagged.
    Decimal::try_from_i128_with_scale(amount as i128, 0).unwrap_or_else(|_| {
        warn!(amount, "amount exceeds decimal precision, clamping");
        Decimal::MAX
    })
}

/// Replays payments and withdrawals in strict (timestamp, version) order,
/// then applies adjustments, producing per-asset totals.
pub fn replay_chronological(
    payments: &[IndexedPayment],
    withdrawals: &[IndexedWithdrawal],
    adjustments: &[BalanceAdjustment],
) -> Vec<AssetTotal> {
    let mut events: Vec<LedgerEvent<'_>> = payments
        .iter()
        .map(LedgerEvent::Credit)
        .chain(withdrawals.iter().map(LedgerEvent::Debit))
        .collect();
    events.sort_by_key(|e| (e.timestamp(), e.version()));

    let mut running: BTreeMap<AssetId, Decimal> = BTreeMap::new();
    for event in events {
        match event {
            LedgerEvent::Credit(p) => {
                *running.entry(p.asset_id.clone()).or_insert(Decimal::ZERO) +=
                    decimal_of(p.amount);
            }
            LedgerEvent::Debit(w) => {
                *running.entry(w.asset_id.clone()).or_insert(Decimal::ZERO) -=
                    decimal_of(w.effective_amount());
            }
        }
    }
    for a in adjustments {
        let delta = if a.amount >= 0 {
            decimal_of(a.amount as u128)
        } else {
            -decimal_of(a.amount.unsigned_abs())
        };
        *running.entry(a.asset_id.clone()).or_insert(Decimal::ZERO) += delta;
    }

    running
        .into_iter()
        .filter(|(_, total)| total.is_sign_positive() && !total.is_zero())
        .map(|(asset_id, total)| AssetTotal {
            asset_id,
            total: u128::try_from(total.trunc().mantissa()).unwrap_or(0),
        })
        .collect()
}

/// Chronological balances for one stealth address.
pub async fn chronological_balances_for_address(
    store: &dyn LedgerStore,
    address: &AccountAddress,
    chain: Chain,
) -> Result<Vec<AssetTotal>> {
    let payments = store.payments_for_address(address, chain).await?;
    let withdrawals = store.withdrawals_for_address(address, chain).await?;
    let adjustments = store.adjustments_for_address(address, chain).await?;
    Ok(replay_chronological(&payments, &withdrawals, &adjustments))
}

/// Chronological balances aggregated across a user's addresses.
pub async fn chronological_balances_for_user(
    store: &dyn LedgerStore,
    user_id: Uuid,
    chain: Chain,
) -> Result<Vec<AssetTotal>> {
    let payments = store.payments_for_user(user_id, chain).await?;
    let withdrawals = store.withdrawals_for_user(user_id, chain).await?;
    let adjustments = store.adjustments_for_user(user_id, chain).await?;
    Ok(replay_chronological(&payments, &withdrawals, &adjustments))
}
