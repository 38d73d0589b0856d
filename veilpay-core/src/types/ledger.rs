//! Persisted ledger row types.
//!
//! Rows are keyed by natural keys so concurrent or duplicated polling
//! resolves to idempotent upserts rather than conflicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::address::AccountAddress;
use crate::types::chain::{AssetId, Chain};
use crate::types::keys::{PublicKey, SecretKey};

// ═══════════════════════════════════════════════════════════════════════════════
// PAYMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Natural key of an indexed payment.
///
/// Required for idempotent upsert under concurrent/duplicate polling.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentKey {
    pub tx_hash: String,
    pub event_index: u64,
    pub stealth_owner: AccountAddress,
    pub ephemeral_pubkey: PublicKey,
    pub asset_id: AssetId,
}

/// One row per on-chain payment event.
///
/// Identity and amount fields are immutable once written; attribution
/// enrichment (owner/link/payer resolution) mutates only the optional
/// fields at the bottom.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedPayment {
    /// Chain position (transaction version).
    pub version: u64,
    pub tx_hash: String,
    pub event_index: u64,
    pub chain: Chain,
    /// The one-time stealth address the payment landed at.
    pub stealth_owner: AccountAddress,
    /// Ephemeral public key published by the sender.
    pub ephemeral_pubkey: PublicKey,
    /// Sender account (may itself be a stealth address).
    pub payer_address: AccountAddress,
    pub asset_id: AssetId,
    /// Raw integer amount in subunits.
    pub amount: u128,
    pub timestamp: DateTime<Utc>,
    /// Sealed link label, decrypts to an internal link identifier.
    pub encrypted_label: Option<Vec<u8>>,
    /// Sealed free-form memo.
    pub encrypted_memo: Option<Vec<u8>>,
    /// Sealed ephemeral secret key, recoverable by the recipient.
    pub encrypted_note: Option<Vec<u8>>,
    /// Resolved during attribution.
    pub owner_user_id: Option<Uuid>,
    pub link_id: Option<Uuid>,
    pub payer_user_id: Option<Uuid>,
}

impl IndexedPayment {
    /// Returns the natural key for upsert/dedup.
    pub fn natural_key(&self) -> PaymentKey {
        PaymentKey {
            tx_hash: self.tx_hash.clone(),
            event_index: self.event_index,
            stealth_owner: self.stealth_owner,
            ephemeral_pubkey: self.ephemeral_pubkey,
            asset_id: self.asset_id.clone(),
        }
    }

    /// Returns true if ownership attribution already succeeded.
    pub fn is_attributed(&self) -> bool {
        self.owner_user_id.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WITHDRAWALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Natural key of an indexed withdrawal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WithdrawalKey {
    pub tx_hash: String,
    pub stealth_owner: AccountAddress,
    pub asset_id: AssetId,
}

/// One row per outgoing event from a stealth address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedWithdrawal {
    pub version: u64,
    pub tx_hash: String,
    pub chain: Chain,
    /// The stealth address funds left from.
    pub stealth_owner: AccountAddress,
    pub destination: AccountAddress,
    pub asset_id: AssetId,
    pub amount: u128,
    /// Amount including the gas fee, when the fee was paid from this
    /// address. Balance replay prefers this over `amount`.
    pub amount_after_fee: Option<u128>,
    pub timestamp: DateTime<Utc>,
    /// Owner of the withdrawing stealth address, when known.
    pub user_id: Option<Uuid>,
    /// Owner of the destination, when it is a recognized stealth address.
    pub destination_user_id: Option<Uuid>,
    /// Set on the synthesized leg of an internal transfer.
    pub is_internal_transfer: bool,
}

impl IndexedWithdrawal {
    /// Returns the natural key for upsert/dedup.
    pub fn natural_key(&self) -> WithdrawalKey {
        WithdrawalKey {
            tx_hash: self.tx_hash.clone(),
            stealth_owner: self.stealth_owner,
            asset_id: self.asset_id.clone(),
        }
    }

    /// The amount balance replay should subtract: fee-inclusive when known.
    pub fn effective_amount(&self) -> u128 {
        self.amount_after_fee.unwrap_or(self.amount)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADJUSTMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A signed correction reconciling activity-replay balance toward an
/// authoritative on-chain snapshot.
///
/// Created/updated by the reconciliation pass, deleted once the gap becomes
/// negligible. Bounded in magnitude; large gaps are data anomalies and are
/// rejected rather than applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    pub stealth_owner: AccountAddress,
    pub chain: Chain,
    pub asset_id: AssetId,
    pub user_id: Option<Uuid>,
    /// RPC-observed minus activity-replayed, in subunits.
    pub amount: i128,
    pub updated_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROCESSING LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// What kind of work a processing-log entry tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    PaymentAttribution,
    WithdrawalAttribution,
    Reconciliation,
}

/// Idempotency/retry bookkeeping shared by the indexer and reconciliation
/// passes. Prevents an unattributable event from being retried forever.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub process_id: String,
    pub process_type: ProcessType,
    pub attempts: u32,
    pub succeeded: bool,
    pub last_attempt: DateTime<Utc>,
    pub max_attempts: u32,
}

impl ProcessingLogEntry {
    /// Returns true if the retry ceiling has been reached without success.
    pub fn exhausted(&self) -> bool {
        !self.succeeded && self.attempts >= self.max_attempts
    }

    /// Returns true if another attempt is worthwhile.
    pub fn should_attempt(&self) -> bool {
        !self.succeeded && !self.exhausted()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIEWING KEY REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// A registered viewing key the indexer trial-derives against.
///
/// Holds the view secret (recognition only, no spending ability) plus the
/// spend public key needed to compute candidate stealth addresses.
#[derive(Clone)]
pub struct RegisteredViewingKey {
    pub user_id: Uuid,
    pub chain: Chain,
    pub spend_pub: PublicKey,
    pub view_pub: PublicKey,
    pub view_secret: SecretKey,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

impl std::fmt::Debug for RegisteredViewingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredViewingKey")
            .field("user_id", &self.user_id)
            .field("chain", &self.chain)
            .field("spend_pub", &self.spend_pub)
            .field("view_pub", &self.view_pub)
            .field("view_secret", &"[REDACTED]")
            .field("active", &self.active)
            .finish()
    }
}
