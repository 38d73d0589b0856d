//! Boundary traits for Veilpay.
//!
//! The chain reader and the persisted ledger are external collaborators;
//! these traits are the seams the indexer and balance ledger are written
//! against, enabling in-memory backends for testing and real backends in
//! production.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::address::AccountAddress;
use crate::types::balance::AccountHoldings;
use crate::types::chain::{AssetId, Chain};
use crate::types::ledger::{
    BalanceAdjustment, IndexedPayment, IndexedWithdrawal, PaymentKey, ProcessType,
    ProcessingLogEntry, RegisteredViewingKey, WithdrawalKey,
};
use crate::types::rpc::{ChainTransaction, TransactionDetail};

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN READER
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to the remote ledger.
///
/// Implementations are rate-limited; all calls must go through the shared
/// RPC gate rather than being issued directly in parallel.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetches transaction summaries touching `contract` with version
    /// strictly greater than `min_version`, paginated. Ordering must be
    /// deterministic (ascending version) for idempotent resume.
    async fn fetch_transactions_since(
        &self,
        contract: &AccountAddress,
        min_version: u64,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ChainTransaction>>;

    /// Fetches full detail (including events) for one transaction.
    async fn fetch_transaction_detail(&self, version: u64) -> Result<TransactionDetail>;

    /// Queries the current holdings of one account.
    async fn fetch_account_holdings(&self, address: &AccountAddress) -> Result<AccountHoldings>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// The persisted ledger: payments, withdrawals, adjustments, the processing
/// log, and the viewing-key registry.
///
/// All mutation is upsert-or-create keyed by natural keys, so concurrent
/// writers are safe without application-level locks: a duplicate insert is
/// a no-op, not an error.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ─── payments ───────────────────────────────────────────────────────────

    /// Inserts a payment if its natural key is new. Returns `true` when a
    /// row was inserted, `false` when the key already existed.
    async fn insert_payment(&self, payment: IndexedPayment) -> Result<bool>;

    /// Enriches an existing payment with attribution results. Identity and
    /// amount fields are never touched.
    async fn attribute_payment(
        &self,
        key: &PaymentKey,
        owner_user_id: Uuid,
        link_id: Option<Uuid>,
        payer_user_id: Option<Uuid>,
    ) -> Result<()>;

    async fn payments_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Vec<IndexedPayment>>;

    async fn payments_for_user(&self, user_id: Uuid, chain: Chain)
        -> Result<Vec<IndexedPayment>>;

    /// Most recent payment observed at a stealth address, by chain order.
    /// Used to back-match withdrawals to an owner.
    async fn latest_payment_at(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Option<IndexedPayment>>;

    /// Resolves the owner of an address from previously attributed
    /// payments, if any. Drives internal-transfer detection.
    async fn attributed_owner_of(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Option<Uuid>>;

    // ─── withdrawals ────────────────────────────────────────────────────────

    /// Inserts a withdrawal if its natural key is new.
    async fn insert_withdrawal(&self, withdrawal: IndexedWithdrawal) -> Result<bool>;

    /// Enriches an existing withdrawal with its resolved owner.
    async fn attribute_withdrawal(&self, key: &WithdrawalKey, user_id: Uuid) -> Result<()>;

    async fn withdrawals_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Vec<IndexedWithdrawal>>;

    async fn withdrawals_for_user(
        &self,
        user_id: Uuid,
        chain: Chain,
    ) -> Result<Vec<IndexedWithdrawal>>;

    // ─── resume position ────────────────────────────────────────────────────

    /// Max chain version already persisted across payments and withdrawals.
    /// The indexer never re-fetches at or below this position.
    async fn max_indexed_version(&self, chain: Chain) -> Result<u64>;

    // ─── adjustments ────────────────────────────────────────────────────────

    /// Creates or replaces the adjustment for the row's
    /// (address, chain, asset) key.
    async fn upsert_adjustment(&self, adjustment: BalanceAdjustment) -> Result<()>;

    /// Deletes the adjustment for the key, if present.
    async fn delete_adjustment(
        &self,
        address: &AccountAddress,
        chain: Chain,
        asset_id: &AssetId,
    ) -> Result<()>;

    /// Deletes every adjustment for an address. The invalidation hook uses
    /// this when new activity makes stale corrections meaningless.
    async fn delete_adjustments_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<()>;

    async fn adjustments_for_address(
        &self,
        address: &AccountAddress,
        chain: Chain,
    ) -> Result<Vec<BalanceAdjustment>>;

    async fn adjustments_for_user(
        &self,
        user_id: Uuid,
        chain: Chain,
    ) -> Result<Vec<BalanceAdjustment>>;

    // ─── processing log ─────────────────────────────────────────────────────

    /// Records one attempt (success or failure), creating the entry on
    /// first touch. Returns the updated entry.
    async fn record_attempt(
        &self,
        process_id: &str,
        process_type: ProcessType,
        succeeded: bool,
        max_attempts: u32,
    ) -> Result<ProcessingLogEntry>;

    async fn processing_entry(
        &self,
        process_id: &str,
        process_type: ProcessType,
    ) -> Result<Option<ProcessingLogEntry>>;

    // ─── viewing key registry ───────────────────────────────────────────────

    /// Registers (or replaces) a user's viewing key for a chain.
    async fn register_viewing_key(&self, key: RegisteredViewingKey) -> Result<()>;

    /// Snapshot of the active viewing keys attribution iterates.
    async fn active_viewing_keys(&self, chain: Chain) -> Result<Vec<RegisteredViewingKey>>;

    /// Activates or deactivates a user's viewing key.
    async fn set_viewing_key_active(
        &self,
        user_id: Uuid,
        chain: Chain,
        active: bool,
    ) -> Result<()>;

    /// Distinct stealth addresses attributed to a user, from its payments.
    async fn addresses_for_user(
        &self,
        user_id: Uuid,
        chain: Chain,
    ) -> Result<Vec<AccountAddress>>;
}
