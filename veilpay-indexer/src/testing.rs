//! Scripted chain fixtures for indexer tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::traits::ChainReader;
use veilpay_core::types::{
    AccountAddress, AccountHoldings, ChainTransaction, RawEvent, TransactionDetail,
};
use veilpay_stealth::PaymentBundle;

/// In-memory [`ChainReader`] backed by a scripted transaction list.
pub struct MockChainReader {
    transactions: Mutex<Vec<TransactionDetail>>,
    holdings: Mutex<AccountHoldings>,
    fail_next: AtomicBool,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self {
            transactions: Mutex::new(Vec::new()),
            holdings: Mutex::new(AccountHoldings::default()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Appends a transaction to the scripted backlog.
    pub fn push(&self, detail: TransactionDetail) {
        self.transactions.lock().push(detail);
    }

    /// Makes the next fetch fail with a chain-read error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Replaces the holdings returned for every address.
    pub fn set_holdings(&self, holdings: AccountHoldings) {
        *self.holdings.lock() = holdings;
    }

    fn take_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(VeilpayError::ChainRead("scripted failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn fetch_transactions_since(
        &self,
        _contract: &AccountAddress,
        min_version: u64,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ChainTransaction>> {
        self.take_failure()?;
        let mut matching: Vec<ChainTransaction> = self
            .transactions
            .lock()
            .iter()
            .filter(|tx| tx.version > min_version)
            .map(|tx| ChainTransaction {
                version: tx.version,
                tx_hash: tx.tx_hash.clone(),
                sender: tx.sender,
                function_name: "0x1::veil::send_payment".into(),
                success: tx.success,
                timestamp: tx.timestamp,
            })
            .collect();
        matching.sort_by_key(|tx| tx.version);
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn fetch_transaction_detail(&self, version: u64) -> Result<TransactionDetail> {
        self.take_failure()?;
        self.transactions
            .lock()
            .iter()
            .find(|tx| tx.version == version)
            .cloned()
            .ok_or_else(|| VeilpayError::ChainRead(format!("no transaction at version {version}")))
    }

    async fn fetch_account_holdings(&self, _address: &AccountAddress) -> Result<AccountHoldings> {
        self.take_failure()?;
        Ok(self.holdings.lock().clone())
    }
}

fn hex_or_empty(blob: &Option<Vec<u8>>) -> String {
    blob.as_deref().map(hex::encode).unwrap_or_default()
}

/// Builds a transaction carrying one payment event for `bundle`.
pub fn payment_tx(
    version: u64,
    tx_hash: &str,
    bundle: &PaymentBundle,
    payer: [u8; 32],
    amount: u128,
) -> TransactionDetail {
    let payer = AccountAddress::from_array(payer);
    TransactionDetail {
        version,
        tx_hash: tx_hash.to_string(),
        success: true,
        sender: payer,
        timestamp: Utc.timestamp_opt(1_700_000_000 + version as i64, 0).unwrap(),
        events: vec![RawEvent {
            event_index: 0,
            type_tag: "0x1::veil::PaymentEvent".into(),
            data: serde_json::json!({
                "stealth_owner": bundle.stealth_address.to_hex(),
                "ephemeral_pubkey": bundle.ephemeral_pubkey.to_hex(),
                "payer": payer.to_hex(),
                "asset_id": "0x1::aptos_coin::AptosCoin",
                "amount": amount.to_string(),
                "encrypted_label": hex_or_empty(&bundle.encrypted_label),
                "encrypted_memo": hex_or_empty(&bundle.encrypted_note),
                "encrypted_note": hex::encode(&bundle.encrypted_ephemeral_key),
            }),
        }],
    }
}

/// Builds a transaction carrying one withdrawal event.
pub fn withdrawal_tx(
    version: u64,
    tx_hash: &str,
    stealth_owner: AccountAddress,
    destination: [u8; 32],
    amount: u128,
    amount_after_fee: Option<u128>,
) -> TransactionDetail {
    TransactionDetail {
        version,
        tx_hash: tx_hash.to_string(),
        success: true,
        sender: stealth_owner,
        timestamp: Utc.timestamp_opt(1_700_000_000 + version as i64, 0).unwrap(),
        events: vec![RawEvent {
            event_index: 0,
            type_tag: "0x1::veil::WithdrawalEvent".into(),
            data: serde_json::json!({
                "stealth_owner": stealth_owner.to_hex(),
                "destination": AccountAddress::from_array(destination).to_hex(),
                "asset_id": "0x1::aptos_coin::AptosCoin",
                "amount": amount.to_string(),
                "amount_after_fee": amount_after_fee.map(|a| a.to_string()),
            }),
        }],
    }
}
