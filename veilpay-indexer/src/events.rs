//! Raw event decoding.
//!
//! Event payloads arrive as untyped JSON. They are decoded into a closed
//! enum with exhaustive matching; a type tag we do not recognize becomes an
//! explicit `Unknown` variant instead of being best-effort parsed.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::types::{
    AccountAddress, AssetId, Chain, IndexedPayment, IndexedWithdrawal, PublicKey, RawEvent,
};

/// Type-tag suffix marking a payment event.
pub const PAYMENT_EVENT_SUFFIX: &str = "::PaymentEvent";
/// Type-tag suffix marking a withdrawal event.
pub const WITHDRAWAL_EVENT_SUFFIX: &str = "::WithdrawalEvent";

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A decoded chain event.
#[derive(Clone, Debug)]
pub enum ChainEvent {
    /// Funds landed at a stealth address.
    Payment(PaymentEvent),
    /// Funds left a stealth address.
    Withdrawal(WithdrawalEvent),
    /// A type tag this indexer does not handle. Counted and skipped,
    /// never parsed best-effort.
    Unknown {
        /// The unrecognized type tag.
        type_tag: String,
    },
}

/// A decoded payment event payload.
#[derive(Clone, Debug)]
pub struct PaymentEvent {
    pub stealth_owner: AccountAddress,
    pub ephemeral_pubkey: PublicKey,
    pub payer_address: AccountAddress,
    pub asset_id: AssetId,
    pub amount: u128,
    pub encrypted_label: Option<Vec<u8>>,
    pub encrypted_memo: Option<Vec<u8>>,
    pub encrypted_note: Option<Vec<u8>>,
}

impl PaymentEvent {
    /// Builds the ledger row for this event at a chain position.
    pub fn into_indexed(
        self,
        version: u64,
        tx_hash: String,
        event_index: u64,
        chain: Chain,
        timestamp: DateTime<Utc>,
    ) -> IndexedPayment {
        IndexedPayment {
            version,
            tx_hash,
            event_index,
            chain,
            stealth_owner: self.stealth_owner,
            ephemeral_pubkey: self.ephemeral_pubkey,
            payer_address: self.payer_address,
            asset_id: self.asset_id,
            amount: self.amount,
            timestamp,
            encrypted_label: self.encrypted_label,
            encrypted_memo: self.encrypted_memo,
            encrypted_note: self.encrypted_note,
            owner_user_id: None,
            link_id: None,
            payer_user_id: None,
        }
    }
}

/// A decoded withdrawal event payload.
#[derive(Clone, Debug)]
pub struct WithdrawalEvent {
    pub stealth_owner: AccountAddress,
    pub destination: AccountAddress,
    pub asset_id: AssetId,
    pub amount: u128,
    pub amount_after_fee: Option<u128>,
}

impl WithdrawalEvent {
    /// Builds the ledger row for this event at a chain position.
    pub fn into_indexed(
        self,
        version: u64,
        tx_hash: String,
        chain: Chain,
        timestamp: DateTime<Utc>,
    ) -> IndexedWithdrawal {
        IndexedWithdrawal {
            version,
            tx_hash,
            chain,
            stealth_owner: self.stealth_owner,
            destination: self.destination,
            asset_id: self.asset_id,
            amount: self.amount,
            amount_after_fee: self.amount_after_fee,
            timestamp,
            user_id: None,
            destination_user_id: None,
            is_internal_transfer: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE DECODING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct PaymentEventWire {
    stealth_owner: String,
    ephemeral_pubkey: String,
    payer: String,
    asset_id: String,
    amount: String,
    #[serde(default)]
    encrypted_label: Option<String>,
    #[serde(default)]
    encrypted_memo: Option<String>,
    #[serde(default)]
    encrypted_note: Option<String>,
}

#[derive(Deserialize)]
struct WithdrawalEventWire {
    stealth_owner: String,
    destination: String,
    asset_id: String,
    amount: String,
    #[serde(default)]
    amount_after_fee: Option<String>,
}

// Amounts travel as decimal strings (u64/u128 are not JSON-safe).
fn parse_amount(s: &str) -> Result<u128> {
    s.parse::<u128>()
        .map_err(|_| VeilpayError::EventDecode(format!("bad amount: {s:?}")))
}

// Sealed blobs travel hex-encoded; empty string means absent.
fn parse_blob(s: Option<String>) -> Result<Option<Vec<u8>>> {
    match s.as_deref() {
        None | Some("") | Some("0x") => Ok(None),
        Some(text) => {
            let stripped = text.strip_prefix("0x").unwrap_or(text);
            Ok(Some(hex::decode(stripped).map_err(|e| {
                VeilpayError::EventDecode(format!("bad blob encoding: {e}"))
            })?))
        }
    }
}

/// Decodes one raw event.
///
/// Recognized tags must decode cleanly or error; unrecognized tags succeed
/// as [`ChainEvent::Unknown`]. Callers skip and log failures per event,
/// never abort the batch.
pub fn decode_event(raw: &RawEvent) -> Result<ChainEvent> {
    if raw.type_tag.ends_with(PAYMENT_EVENT_SUFFIX) {
        let wire: PaymentEventWire = serde_json::from_value(raw.data.clone())
            .map_err(|e| VeilpayError::EventDecode(format!("payment event: {e}")))?;
        Ok(ChainEvent::Payment(PaymentEvent {
            stealth_owner: AccountAddress::from_hex(&wire.stealth_owner)?,
            ephemeral_pubkey: PublicKey::from_hex(&wire.ephemeral_pubkey)?,
            payer_address: AccountAddress::from_hex(&wire.payer)?,
            asset_id: AssetId::new(wire.asset_id),
            amount: parse_amount(&wire.amount)?,
            encrypted_label: parse_blob(wire.encrypted_label)?,
            encrypted_memo: parse_blob(wire.encrypted_memo)?,
            encrypted_note: parse_blob(wire.encrypted_note)?,
        }))
    } else if raw.type_tag.ends_with(WITHDRAWAL_EVENT_SUFFIX) {
        let wire: WithdrawalEventWire = serde_json::from_value(raw.data.clone())
            .map_err(|e| VeilpayError::EventDecode(format!("withdrawal event: {e}")))?;
        Ok(ChainEvent::Withdrawal(WithdrawalEvent {
            stealth_owner: AccountAddress::from_hex(&wire.stealth_owner)?,
            destination: AccountAddress::from_hex(&wire.destination)?,
            asset_id: AssetId::new(wire.asset_id),
            amount: parse_amount(&wire.amount)?,
            amount_after_fee: wire
                .amount_after_fee
                .as_deref()
                .map(parse_amount)
                .transpose()?,
        }))
    } else {
        Ok(ChainEvent::Unknown {
            type_tag: raw.type_tag.clone(),
        })
    }
}
