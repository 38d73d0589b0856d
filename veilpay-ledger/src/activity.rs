//! Activity-replay balances (fast path).
//!
//! Aggregates indexed payments minus withdrawals plus adjustments per
//! asset. Reflects the latest indexed event immediately, which makes it
//! the default source of truth for reads.

use std::collections::BTreeMap;

use veilpay_core::error::Result;
use veilpay_core::traits::LedgerStore;
use veilpay_core::types::{
    AccountAddress, AssetId, AssetTotal, BalanceAdjustment, Chain, IndexedPayment,
    IndexedWithdrawal,
};

/// Aggregates one event stream into per-asset totals.
///
/// Withdrawals subtract their fee-inclusive amount when known. Non-positive
/// totals are dropped from the output; they represent addresses that were
/// fully swept (or adjustment overshoot) and carry no balance.
pub fn aggregate(
    payments: &[IndexedPayment],
    withdrawals: &[IndexedWithdrawal],
    adjustments: &[BalanceAdjustment],
) -> Vec<AssetTotal> {
    let mut totals: BTreeMap<AssetId, i128> = BTreeMap::new();

    for p in payments {
        *totals.entry(p.asset_id.clone()).or_insert(0) += p.amount as i128;
    }
    for w in withdrawals {
        *totals.entry(w.asset_id.clone()).or_insert(0) -= w.effective_amount() as i128;
    }
    for a in adjustments {
        *totals.entry(a.asset_id.clone()).or_insert(0) += a.amount;
    }

    totals
        .into_iter()
        .filter(|(_, total)| *total > 0)
        .map(|(asset_id, total)| AssetTotal {
            asset_id,
            total: total as u128,
        })
        .collect()
}

/// Raw replay without adjustments. Reconciliation diffs this against the
/// RPC snapshot so the adjustment it writes never feeds back into itself.
pub fn aggregate_unadjusted(
    payments: &[IndexedPayment],
    withdrawals: &[IndexedWithdrawal],
) -> BTreeMap<AssetId, i128> {
    let mut totals: BTreeMap<AssetId, i128> = BTreeMap::new();
    for p in payments {
        *totals.entry(p.asset_id.clone()).or_insert(0) += p.amount as i128;
    }
    for w in withdrawals {
        *totals.entry(w.asset_id.clone()).or_insert(0) -= w.effective_amount() as i128;
    }
    totals
}

/// Activity-replay balances for one stealth address.
pub async fn activity_balances_for_address(
    store: &dyn LedgerStore,
    address: &AccountAddress,
    chain: Chain,
) -> Result<Vec<AssetTotal>> {
    let payments = store.payments_for_address(address, chain).await?;
    let withdrawals = store.withdrawals_for_address(address, chain).await?;
    let adjustments = store.adjustments_for_address(address, chain).await?;
    Ok(aggregate(&payments, &withdrawals, &adjustments))
}

/// Activity-replay balances aggregated across all of a user's attributed
/// stealth addresses.
pub async fn activity_balances_for_user(
    store: &dyn LedgerStore,
    user_id: uuid::Uuid,
    chain: Chain,
) -> Result<Vec<AssetTotal>> {
    let payments = store.payments_for_user(user_id, chain).await?;
    let withdrawals = store.withdrawals_for_user(user_id, chain).await?;
    let adjustments = store.adjustments_for_user(user_id, chain).await?;
    Ok(aggregate(&payments, &withdrawals, &adjustments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veilpay_core::constants::ADDRESS_SIZE;
    use veilpay_core::types::PublicKey;

    fn payment(asset: &str, amount: u128) -> IndexedPayment {
        IndexedPayment {
            version: 1,
            tx_hash: format!("0x{amount:x}"),
            event_index: 0,
            chain: Chain::AptosTestnet,
            stealth_owner: AccountAddress::from_array([1; ADDRESS_SIZE]),
            ephemeral_pubkey: PublicKey::from_array([2; 32]),
            payer_address: AccountAddress::from_array([3; ADDRESS_SIZE]),
            asset_id: AssetId::new(asset),
            amount,
            timestamp: Utc::now(),
            encrypted_label: None,
            encrypted_memo: None,
            encrypted_note: None,
            owner_user_id: None,
            link_id: None,
            payer_user_id: None,
        }
    }

    fn withdrawal(asset: &str, amount: u128, after_fee: Option<u128>) -> IndexedWithdrawal {
        IndexedWithdrawal {
            version: 2,
            tx_hash: format!("0xw{amount:x}"),
            chain: Chain::AptosTestnet,
            stealth_owner: AccountAddress::from_array([1; ADDRESS_SIZE]),
            destination: AccountAddress::from_array([4; ADDRESS_SIZE]),
            asset_id: AssetId::new(asset),
            amount,
            amount_after_fee: after_fee,
            timestamp: Utc::now(),
            user_id: None,
            destination_user_id: None,
            is_internal_transfer: false,
        }
    }

    fn adjustment(asset: &str, amount: i128) -> BalanceAdjustment {
        BalanceAdjustment {
            stealth_owner: AccountAddress::from_array([1; ADDRESS_SIZE]),
            chain: Chain::AptosTestnet,
            asset_id: AssetId::new(asset),
            user_id: None,
            amount,
            updated_at: Utc::now(),
        }
    }

    const NATIVE: &str = "0x1::aptos_coin::AptosCoin";
    const USDC: &str = "0xabc::usdc::USDC";

    #[test]
    fn test_ledger_invariant_on_synthetic_stream() {
        let payments = vec![payment(NATIVE, 1_000), payment(NATIVE, 500), payment(USDC, 70)];
        let withdrawals = vec![withdrawal(NATIVE, 200, Some(210))];
        let adjustments = vec![adjustment(NATIVE, -40)];

        let totals = aggregate(&payments, &withdrawals, &adjustments);
        assert_eq!(totals.len(), 2);

        let native = totals.iter().find(|t| t.asset_id.is_native()).unwrap();
        // 1000 + 500 - 210 - 40
        assert_eq!(native.total, 1_250);
        let usdc = totals.iter().find(|t| !t.asset_id.is_native()).unwrap();
        assert_eq!(usdc.total, 70);
    }

    #[test]
    fn test_fee_inclusive_amount_preferred() {
        let totals = aggregate(
            &[payment(NATIVE, 1_000)],
            &[withdrawal(NATIVE, 100, Some(150))],
            &[],
        );
        assert_eq!(totals[0].total, 850);
    }

    #[test]
    fn test_non_positive_totals_dropped() {
        let totals = aggregate(
            &[payment(NATIVE, 100)],
            &[withdrawal(NATIVE, 100, None), withdrawal(USDC, 5, None)],
            &[],
        );
        assert!(totals.is_empty());
    }

    #[test]
    fn test_unadjusted_excludes_adjustments() {
        let payments = vec![payment(NATIVE, 300)];
        let raw = aggregate_unadjusted(&payments, &[]);
        assert_eq!(raw[&AssetId::native()], 300);
    }
}
