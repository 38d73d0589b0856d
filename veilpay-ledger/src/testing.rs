//! Fixtures for ledger tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::traits::ChainReader;
use veilpay_core::types::{
    AccountAddress, AccountHoldings, AssetId, ChainTransaction, IndexedPayment,
    IndexedWithdrawal, PublicKey, TransactionDetail,
};

/// [`ChainReader`] serving scripted holdings per address. History fetches
/// are unsupported; ledger tests only exercise the holdings path.
pub struct MockHoldingsReader {
    holdings: Mutex<HashMap<AccountAddress, AccountHoldings>>,
    failing: Mutex<HashSet<AccountAddress>>,
}

impl MockHoldingsReader {
    pub fn new() -> Self {
        Self {
            holdings: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_holdings(&self, address: AccountAddress, holdings: AccountHoldings) {
        self.holdings.lock().insert(address, holdings);
    }

    /// Makes holdings queries for one address fail.
    pub fn fail_for(&self, address: AccountAddress) {
        self.failing.lock().insert(address);
    }
}

#[async_trait]
impl ChainReader for MockHoldingsReader {
    async fn fetch_transactions_since(
        &self,
        _contract: &AccountAddress,
        _min_version: u64,
        _limit: u64,
        _offset: u64,
    ) -> Result<Vec<ChainTransaction>> {
        Ok(Vec::new())
    }

    async fn fetch_transaction_detail(&self, version: u64) -> Result<TransactionDetail> {
        Err(VeilpayError::ChainRead(format!(
            "no detail scripted for version {version}"
        )))
    }

    async fn fetch_account_holdings(&self, address: &AccountAddress) -> Result<AccountHoldings> {
        if self.failing.lock().contains(address) {
            return Err(VeilpayError::ChainRead("scripted failure".into()));
        }
        Ok(self.holdings.lock().get(address).cloned().unwrap_or_default())
    }
}

/// A native-asset payment row at a fixed chain position.
pub fn seeded_payment(address: AccountAddress, amount: u128, version: u64) -> IndexedPayment {
    IndexedPayment {
        version,
        tx_hash: format!("0xseed{version:x}"),
        event_index: 0,
        chain: veilpay_core::types::Chain::AptosTestnet,
        stealth_owner: address,
        ephemeral_pubkey: PublicKey::from_array([version as u8; 32]),
        payer_address: AccountAddress::from_array([0xEE; 32]),
        asset_id: AssetId::native(),
        amount,
        timestamp: Utc.timestamp_opt(1_700_000_000 + version as i64, 0).unwrap(),
        encrypted_label: None,
        encrypted_memo: None,
        encrypted_note: None,
        owner_user_id: None,
        link_id: None,
        payer_user_id: None,
    }
}

/// A native-asset withdrawal row at a fixed chain position.
pub fn seeded_withdrawal(address: AccountAddress, amount: u128, version: u64) -> IndexedWithdrawal {
    IndexedWithdrawal {
        version,
        tx_hash: format!("0xwseed{version:x}"),
        chain: veilpay_core::types::Chain::AptosTestnet,
        stealth_owner: address,
        destination: AccountAddress::from_array([0xDD; 32]),
        asset_id: AssetId::native(),
        amount,
        amount_after_fee: None,
        timestamp: Utc.timestamp_opt(1_700_000_000 + version as i64, 0).unwrap(),
        user_id: None,
        destination_user_id: None,
        is_internal_transfer: false,
    }
}
