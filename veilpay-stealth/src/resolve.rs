//! Ownership resolution (recipient side).
//!
//! An indexed payment carries only a one-time stealth address and an
//! ephemeral public key. Resolution trial-derives the candidate stealth
//! address for each registered viewing key and matches it against the
//! event's owner address. On a match the sealed label is opened to recover
//! the payment-link id.

use tracing::{debug, warn};
use uuid::Uuid;

use veilpay_core::error::VeilpayError;
use veilpay_core::types::{IndexedPayment, RegisteredViewingKey};
use veilpay_crypto::derive::derive_stealth_public_watch;
use veilpay_crypto::seal::decrypt_note;

/// A resolved payment owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribution {
    /// The user owning the matched viewing key.
    pub user_id: Uuid,
    /// The payment link the sender paid through, recovered from the sealed
    /// label when present and well-formed.
    pub link_id: Option<Uuid>,
}

/// Result of trialing a single viewing key against a payment.
#[derive(Debug)]
pub enum ResolveOutcome {
    /// Derived address did not match - not this key's payment.
    NotOurs,
    /// Derived address matched the event owner.
    Matched(Attribution),
    /// Derivation failed (malformed ephemeral key, etc).
    DerivationFailed(VeilpayError),
}

impl ResolveOutcome {
    /// Returns true if the key matched.
    pub fn is_matched(&self) -> bool {
        matches!(self, ResolveOutcome::Matched(_))
    }

    /// Returns the attribution if the key matched.
    pub fn into_attribution(self) -> Option<Attribution> {
        match self {
            ResolveOutcome::Matched(attribution) => Some(attribution),
            _ => None,
        }
    }
}

/// Statistics for resolution passes.
#[derive(Debug, Clone, Default)]
pub struct ResolveStats {
    /// Total viewing keys trialed.
    pub keys_trialed: u64,
    /// Number of matches.
    pub matches: u64,
    /// Number of derivation errors.
    pub errors: u64,
}

impl ResolveStats {
    /// Creates a new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single trial outcome.
    pub fn record(&mut self, outcome: &ResolveOutcome) {
        self.keys_trialed += 1;
        match outcome {
            ResolveOutcome::Matched(_) => self.matches += 1,
            ResolveOutcome::DerivationFailed(_) => self.errors += 1,
            ResolveOutcome::NotOurs => {}
        }
    }
}

/// Trials a single viewing key against a payment.
pub fn resolve_with_key(
    payment: &IndexedPayment,
    key: &RegisteredViewingKey,
) -> ResolveOutcome {
    if key.chain != payment.chain {
        return ResolveOutcome::NotOurs;
    }

    let candidate = match derive_stealth_public_watch(
        &key.spend_pub,
        &key.view_secret,
        &payment.ephemeral_pubkey,
    ) {
        Ok(stealth) => stealth,
        Err(e) => return ResolveOutcome::DerivationFailed(e),
    };

    if candidate.address != payment.stealth_owner {
        return ResolveOutcome::NotOurs;
    }

    ResolveOutcome::Matched(Attribution {
        user_id: key.user_id,
        link_id: recover_link_id(payment, key),
    })
}

/// Resolves the owner of a payment by sequential trial over the registered
/// viewing keys, short-circuiting on the first match.
///
/// Inactive keys are skipped. A derivation failure for one key is logged
/// and does not stop the scan.
pub fn resolve_ownership(
    payment: &IndexedPayment,
    keys: &[RegisteredViewingKey],
) -> Option<Attribution> {
    let mut stats = ResolveStats::new();

    for key in keys.iter().filter(|k| k.active) {
        let outcome = resolve_with_key(payment, key);
        stats.record(&outcome);

        match outcome {
            ResolveOutcome::Matched(attribution) => {
                debug!(
                    user_id = %attribution.user_id,
                    keys_trialed = stats.keys_trialed,
                    tx_hash = %payment.tx_hash,
                    "resolved payment owner"
                );
                return Some(attribution);
            }
            ResolveOutcome::DerivationFailed(e) => {
                warn!(user_id = %key.user_id, error = %e, "trial derivation failed");
            }
            ResolveOutcome::NotOurs => {}
        }
    }

    None
}

/// Opens the sealed label and parses it as a link id. Missing, unopenable,
/// or non-UUID labels yield `None` rather than failing attribution.
fn recover_link_id(payment: &IndexedPayment, key: &RegisteredViewingKey) -> Option<Uuid> {
    let sealed = payment.encrypted_label.as_ref()?;
    let plaintext = match decrypt_note(sealed, &key.view_secret, &payment.ephemeral_pubkey) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            warn!(tx_hash = %payment.tx_hash, error = %e, "failed to open payment label");
            return None;
        }
    };

    let text = String::from_utf8(plaintext).ok()?;
    Uuid::parse_str(text.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentBundleBuilder;
    use chrono::Utc;
    use veilpay_core::types::{
        AccountAddress, AssetId, Chain, MetaKeyPair, PublicKey,
    };
    use veilpay_crypto::derive::derive_meta_keys;

    fn test_meta(seed_byte: u8) -> MetaKeyPair {
        derive_meta_keys(&[seed_byte; 32], Chain::AptosTestnet).unwrap()
    }

    fn registered(meta: &MetaKeyPair, user_id: Uuid, active: bool) -> RegisteredViewingKey {
        RegisteredViewingKey {
            user_id,
            chain: Chain::AptosTestnet,
            spend_pub: meta.spend.public,
            view_pub: meta.view.public,
            view_secret: meta.view.secret.clone(),
            active,
            registered_at: Utc::now(),
        }
    }

    fn payment_for(meta: &MetaKeyPair, link_id: Option<Uuid>) -> IndexedPayment {
        let mut builder = PaymentBundleBuilder::new()
            .recipient(meta.spend.public, meta.view.public);
        if let Some(id) = link_id {
            builder = builder.label(id.to_string().into_bytes());
        }
        let bundle = builder.build().unwrap();

        IndexedPayment {
            version: 100,
            tx_hash: "0xabc".into(),
            event_index: 0,
            chain: Chain::AptosTestnet,
            stealth_owner: bundle.stealth_address,
            ephemeral_pubkey: bundle.ephemeral_pubkey,
            payer_address: AccountAddress::from_array([9u8; 32]),
            asset_id: AssetId::native(),
            amount: 1_000,
            timestamp: Utc::now(),
            encrypted_label: bundle.encrypted_label,
            encrypted_memo: bundle.encrypted_note,
            encrypted_note: Some(bundle.encrypted_ephemeral_key),
            owner_user_id: None,
            link_id: None,
            payer_user_id: None,
        }
    }

    #[test]
    fn test_resolve_finds_owner() {
        let meta = test_meta(1);
        let user_id = Uuid::new_v4();
        let payment = payment_for(&meta, None);

        let keys = vec![
            registered(&test_meta(2), Uuid::new_v4(), true),
            registered(&meta, user_id, true),
        ];

        let attribution = resolve_ownership(&payment, &keys).unwrap();
        assert_eq!(attribution.user_id, user_id);
        assert_eq!(attribution.link_id, None);
    }

    #[test]
    fn test_resolve_recovers_link_id() {
        let meta = test_meta(3);
        let link_id = Uuid::new_v4();
        let payment = payment_for(&meta, Some(link_id));

        let keys = vec![registered(&meta, Uuid::new_v4(), true)];
        let attribution = resolve_ownership(&payment, &keys).unwrap();
        assert_eq!(attribution.link_id, Some(link_id));
    }

    #[test]
    fn test_resolve_nobody_matches() {
        let payment = payment_for(&test_meta(4), None);
        let keys = vec![
            registered(&test_meta(5), Uuid::new_v4(), true),
            registered(&test_meta(6), Uuid::new_v4(), true),
        ];
        assert!(resolve_ownership(&payment, &keys).is_none());
    }

    #[test]
    fn test_resolve_skips_inactive_keys() {
        let meta = test_meta(7);
        let payment = payment_for(&meta, None);

        let keys = vec![registered(&meta, Uuid::new_v4(), false)];
        assert!(resolve_ownership(&payment, &keys).is_none());
    }

    #[test]
    fn test_resolve_skips_other_chain() {
        let meta = test_meta(8);
        let payment = payment_for(&meta, None);

        let mut key = registered(&meta, Uuid::new_v4(), true);
        key.chain = Chain::AptosMainnet;
        assert!(resolve_ownership(&payment, &[key]).is_none());
    }

    #[test]
    fn test_malformed_ephemeral_key_does_not_abort_scan() {
        let meta = test_meta(9);
        let user_id = Uuid::new_v4();
        let mut payment = payment_for(&meta, None);
        // Not a valid curve point; trial derivation fails for every key.
        payment.ephemeral_pubkey = PublicKey::from_array([0xFF; 32]);

        let keys = vec![registered(&meta, user_id, true)];
        assert!(resolve_ownership(&payment, &keys).is_none());
    }

    #[test]
    fn test_stats_record() {
        let mut stats = ResolveStats::new();
        stats.record(&ResolveOutcome::NotOurs);
        stats.record(&ResolveOutcome::Matched(Attribution {
            user_id: Uuid::new_v4(),
            link_id: None,
        }));
        assert_eq!(stats.keys_trialed, 2);
        assert_eq!(stats.matches, 1);
        assert_eq!(stats.errors, 0);
    }
}
