//! In-memory ledger store.
//!
//! Fast, thread-safe storage suitable for development, testing, and
//! single-process deployments.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use tracing::{debug, instrument};
use uuid::Uuid;

use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::traits::LedgerStore;
use veilpay_core::types::{
    AccountAddress, AssetId, BalanceAdjustment, Chain, IndexedPayment, IndexedWithdrawal,
    PaymentKey, ProcessType, ProcessingLogEntry, RegisteredViewingKey, WithdrawalKey,
};

/// In-memory ledger store.
///
/// Every table is a concurrent map keyed by the row's natural key, so
/// duplicate inserts from concurrent indexer cycles resolve without
/// application-level locking.
///
/// # Indexing
///
/// - Payments: natural key → row, scanned by address/user on query
/// - Withdrawals: natural key → row
/// - Adjustments: (address, chain, asset) → row
/// - Processing log: (process id, process type) → entry
/// - Viewing keys: (user, chain) → key
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    payments: DashMap<PaymentKey, IndexedPayment>,
    withdrawals: DashMap<WithdrawalKey, IndexedWithdrawal>,
    adjustments: DashMap<(AccountAddress, Chain, AssetId), BalanceAdjustment>,
    processing_log: DashMap<(String, ProcessType), ProcessingLogEntry>,
    viewing_keys: DashMap<(Uuid, Chain), RegisteredViewingKey>,
    max_versions: DashMap<Chain, u64>,
}

impl MemoryLedgerStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with preallocated payment capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            payments: DashMap::with_capacity(capacity),
            withdrawals: DashMap::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Returns the number of stored payments.
    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }

    /// Returns the number of stored withdrawals.
    pub fn withdrawal_count(&self) -> usize {
        self.withdrawals.len()
    }

    /// Clears every table.
    pub fn clear(&self) {
        self.payments.clear();
        self.withdrawals.clear();
        self.adjustments.clear();
        self.processing_log.clear();
        self.viewing_keys.clear();
        self.max_versions.clear();
    }

    fn bump_max_version(&self, chain: Chain, version: u64) {
        let mut entry = self.max_versions.entry(chain).or_insert(0);
        if version > *entry {
            *entry = version;
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    // ─── payments ───────────────────────────────────────────────────────────

    #[instrument(skip(self, payment), fields(tx_hash = %payment.tx_hash, version = payment.version))]
    async fn insert_payment(&self, payment: IndexedPayment) -> Result<bool> {
        let key = payment.natural_key();
        match self.payments.entry(key) {
            Entry::Occupied(_) => {
                debug!("duplicate payment, skipping");
                Ok(false)
            }
            Entry::Vacant(slot) => {
                self.bump_max_version(payment.chain, payment.version);
                slot.insert(payment);
                Ok(true)
            }
        }
    }

    async fn attribute_payment(
        &self,
        key: &PaymentKey,
        owner_user_id: Uuid,
        link_id: Option<Uuid>,
        payer_user_id: Option<Uuid>,
    ) -> Result<()> {
        let mut payment = self
            .payments
            .get_mut(key)
            .ok_or_else(|| VeilpayError::NotFound(format!("payment {}:{}", key.tx_hash, key.event_index)))?;
        payment.owner_user_id = Some(owner_user_id);
        payment.link_id = link_id;
        payment.payer_user_id = payer_user_id;
        Ok(())
    }

    async fn payments_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Vec<IndexedPayment>> {
        let mut rows: Vec<IndexedPayment> = self
            .payments
            .iter()
            .filter(|e| e.chain == chain && &e.stealth_owner == address)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|p| (p.version, p.event_index));
        Ok(rows)
    }

    async fn payments_for_user(
        &self,
        user_id: Uuid,
        chain: Chain,
    ) -> Result<Vec<IndexedPayment>> {
        let mut rows: Vec<IndexedPayment> = self
            .payments
            .iter()
            .filter(|e| e.chain == chain && e.owner_user_id == Some(user_id))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|p| (p.version, p.event_index));
        Ok(rows)
    }

    async fn latest_payment_at(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Option<IndexedPayment>> {
        Ok(self
            .payments
            .iter()
            .filter(|e| e.chain == chain && &e.stealth_owner == address)
            .max_by_key(|e| (e.version, e.event_index))
            .map(|e| e.value().clone()))
    }

    async fn attributed_owner_of(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Option<Uuid>> {
        Ok(self
            .payments
            .iter()
            .filter(|e| e.chain == chain && &e.stealth_owner == address)
            .find_map(|e| e.owner_user_id))
    }

    // ─── withdrawals ────────────────────────────────────────────────────────

    #[instrument(skip(self, withdrawal), fields(tx_hash = %withdrawal.tx_hash, version = withdrawal.version))]
    async fn insert_withdrawal(&self, withdrawal: IndexedWithdrawal) -> Result<bool> {
        let key = withdrawal.natural_key();
        match self.withdrawals.entry(key) {
            Entry::Occupied(_) => {
                debug!("duplicate withdrawal, skipping");
                Ok(false)
            }
            Entry::Vacant(slot) => {
                self.bump_max_version(withdrawal.chain, withdrawal.version);
                slot.insert(withdrawal);
                Ok(true)
            }
        }
    }

    async fn attribute_withdrawal(&self, key: &WithdrawalKey, user_id: Uuid) -> Result<()> {
        let mut withdrawal = self
            .withdrawals
            .get_mut(key)
            .ok_or_else(|| VeilpayError::NotFound(format!("withdrawal {}", key.tx_hash)))?;
        withdrawal.user_id = Some(user_id);
        Ok(())
    }

    async fn withdrawals_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Vec<IndexedWithdrawal>> {
        let mut rows: Vec<IndexedWithdrawal> = self
            .withdrawals
            .iter()
            .filter(|e| e.chain == chain && &e.stealth_owner == address)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|w| w.version);
        Ok(rows)
    }

    async fn withdrawals_for_user(
        &self,
        user_id: Uuid,
        chain: Chain,
    ) -> Result<Vec<IndexedWithdrawal>> {
        let mut rows: Vec<IndexedWithdrawal> = self
            .withdrawals
            .iter()
            .filter(|e| e.chain == chain && e.user_id == Some(user_id))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|w| w.version);
        Ok(rows)
    }

    // ─── resume position ────────────────────────────────────────────────────

    async fn max_indexed_version(&self, chain: Chain) -> Result<u64> {
        Ok(self.max_versions.get(&chain).map(|v| *v).unwrap_or(0))
    }

    // ─── adjustments ────────────────────────────────────────────────────────

    async fn upsert_adjustment(&self, adjustment: BalanceAdjustment) -> Result<()> {
        let key = (
            adjustment.stealth_owner,
            adjustment.chain,
            adjustment.asset_id.clone(),
        );
        self.adjustments.insert(key, adjustment);
        Ok(())
    }

    async fn delete_adjustment(
        &self,
        address: &AccountAddress,
        chain: Chain,
        asset_id: &AssetId,
    ) -> Result<()> {
        self.adjustments.remove(&(*address, chain, asset_id.clone()));
        Ok(())
    }

    async fn delete_adjustments_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<()> {
        self.adjustments
            .retain(|(addr, c, _), _| !(addr == address && *c == chain));
        Ok(())
    }

    async fn adjustments_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Vec<BalanceAdjustment>> {
        Ok(self
            .adjustments
            .iter()
            .filter(|e| &e.stealth_owner == address && e.chain == chain)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn adjustments_for_user(
        &self,
        user_id: Uuid,
        chain: Chain,
    ) -> Result<Vec<BalanceAdjustment>> {
        Ok(self
            .adjustments
            .iter()
            .filter(|e| e.chain == chain && e.user_id == Some(user_id))
            .map(|e| e.value().clone())
            .collect())
    }

    // ─── processing log ─────────────────────────────────────────────────────

    async fn record_attempt(
        &self,
        process_id: &str,
        process_type: ProcessType,
        succeeded: bool,
        max_attempts: u32,
    ) -> Result<ProcessingLogEntry> {
        let mut entry = self
            .processing_log
            .entry((process_id.to_string(), process_type))
            .or_insert_with(|| ProcessingLogEntry {
                process_id: process_id.to_string(),
                process_type,
                attempts: 0,
                succeeded: false,
                last_attempt: Utc::now(),
                max_attempts,
            });
        entry.attempts = entry.attempts.saturating_add(1);
        entry.succeeded = entry.succeeded || succeeded;
        entry.last_attempt = Utc::now();
        entry.max_attempts = max_attempts;
        Ok(entry.clone())
    }

    async fn processing_entry(
        &self,
        process_id: &str,
        process_type: ProcessType,
    ) -> Result<Option<ProcessingLogEntry>> {
        Ok(self
            .processing_log
            .get(&(process_id.to_string(), process_type))
            .map(|e| e.clone()))
    }

    // ─── viewing key registry ───────────────────────────────────────────────

    async fn register_viewing_key(&self, key: RegisteredViewingKey) -> Result<()> {
        self.viewing_keys.insert((key.user_id, key.chain), key);
        Ok(())
    }

    async fn active_viewing_keys(&self, chain: Chain) -> Result<Vec<RegisteredViewingKey>> {
        let mut keys: Vec<RegisteredViewingKey> = self
            .viewing_keys
            .iter()
            .filter(|e| e.chain == chain && e.active)
            .map(|e| e.value().clone())
            .collect();
        // Oldest registrations first so attribution order is stable.
        keys.sort_by_key(|k| k.registered_at);
        Ok(keys)
    }

    async fn set_viewing_key_active(
        &self,
        user_id: Uuid,
        chain: Chain,
        active: bool,
    ) -> Result<()> {
        let mut key = self
            .viewing_keys
            .get_mut(&(user_id, chain))
            .ok_or_else(|| VeilpayError::NotFound(format!("viewing key for user {user_id}")))?;
        key.active = active;
        Ok(())
    }

    async fn addresses_for_user(
        &self,
        user_id: Uuid,
        chain: Chain,
    ) -> Result<Vec<AccountAddress>> {
        let addresses: BTreeSet<AccountAddress> = self
            .payments
            .iter()
            .filter(|e| e.chain == chain && e.owner_user_id == Some(user_id))
            .map(|e| e.stealth_owner)
            .collect();
        Ok(addresses.into_iter().collect())
    }
}
