//! Stealth payment creation (sender side).

use serde::{Deserialize, Serialize};

use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::types::{AssetId, PublicKey, StealthAddress};
use veilpay_crypto::derive::{derive_stealth_public, generate_ephemeral_keypair};
use veilpay_crypto::seal::{encrypt_ephemeral_secret, encrypt_note};

/// Everything the sender needs to submit a stealth payment: the one-time
/// address to send funds to and the sealed fields to publish with the
/// transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentBundle {
    /// The one-time address to send funds to.
    pub stealth_address: StealthAddress,
    /// The ephemeral public key, published in clear.
    pub ephemeral_pubkey: PublicKey,
    /// The ephemeral secret sealed to the recipient's view key.
    pub encrypted_ephemeral_key: Vec<u8>,
    /// Optional payment-link label sealed to the recipient's view key.
    pub encrypted_label: Option<Vec<u8>>,
    /// Optional free-form note sealed to the recipient's view key.
    pub encrypted_note: Option<Vec<u8>>,
    /// Informational metadata, never published on-chain.
    pub metadata: PaymentMetadata,
}

/// Metadata about a stealth payment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaymentMetadata {
    /// Payment amount in base units (informational only).
    pub amount: Option<u128>,
    /// Asset being paid.
    pub asset_id: Option<AssetId>,
    /// Optional sender-side memo (not stored on-chain).
    pub memo: Option<String>,
}

/// Creates a stealth payment bundle for the given recipient meta keys.
///
/// Generates a fresh ephemeral key pair, derives the one-time address, and
/// seals the ephemeral secret so the recipient can later recover the
/// spendable key.
pub fn create_payment_bundle(
    spend_pub: &PublicKey,
    view_pub: &PublicKey,
) -> Result<PaymentBundle> {
    PaymentBundleBuilder::new()
        .recipient(*spend_pub, *view_pub)
        .build()
}

/// Builder for [`PaymentBundle`] with optional sealed label and note.
#[derive(Default)]
pub struct PaymentBundleBuilder {
    recipient: Option<(PublicKey, PublicKey)>,
    label: Option<Vec<u8>>,
    note: Option<Vec<u8>>,
    amount: Option<u128>,
    asset_id: Option<AssetId>,
    memo: Option<String>,
}

impl PaymentBundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recipient's (spend, view) public keys.
    pub fn recipient(mut self, spend_pub: PublicKey, view_pub: PublicKey) -> Self {
        self.recipient = Some((spend_pub, view_pub));
        self
    }

    /// Attaches a payment-link label, sealed to the recipient.
    pub fn label(mut self, label: impl Into<Vec<u8>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches a free-form note, sealed to the recipient.
    pub fn note(mut self, note: impl Into<Vec<u8>>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn amount(mut self, amount: u128) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn asset_id(mut self, asset_id: AssetId) -> Self {
        self.asset_id = Some(asset_id);
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn build(self) -> Result<PaymentBundle> {
        let (spend_pub, view_pub) = self
            .recipient
            .ok_or_else(|| VeilpayError::ValidationError("recipient meta keys are required".into()))?;

        let ephemeral = generate_ephemeral_keypair();
        let stealth = derive_stealth_public(&spend_pub, &view_pub, &ephemeral.secret)?;
        let encrypted_ephemeral_key = encrypt_ephemeral_secret(&ephemeral, &view_pub)?;

        let encrypted_label = self
            .label
            .map(|label| encrypt_note(&label, &ephemeral, &view_pub))
            .transpose()?;
        let encrypted_note = self
            .note
            .map(|note| encrypt_note(&note, &ephemeral, &view_pub))
            .transpose()?;

        Ok(PaymentBundle {
            stealth_address: stealth.address,
            ephemeral_pubkey: ephemeral.public,
            encrypted_ephemeral_key,
            encrypted_label,
            encrypted_note,
            metadata: PaymentMetadata {
                amount: self.amount,
                asset_id: self.asset_id,
                memo: self.memo,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilpay_core::types::Chain;
    use veilpay_crypto::derive::{derive_meta_keys, derive_stealth_keypair};
    use veilpay_crypto::seal::{decrypt_ephemeral_secret, decrypt_note};

    fn test_meta() -> veilpay_core::types::MetaKeyPair {
        derive_meta_keys(&[42u8; 32], Chain::AptosTestnet).unwrap()
    }

    #[test]
    fn test_create_payment_bundle() {
        let meta = test_meta();
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        assert!(!bundle.stealth_address.is_zero());
        assert!(!bundle.encrypted_ephemeral_key.is_empty());
        assert!(bundle.encrypted_label.is_none());
        assert!(bundle.encrypted_note.is_none());
    }

    #[test]
    fn test_bundles_unlinkable() {
        // Each call must produce a different address (fresh ephemeral).
        let meta = test_meta();

        let a = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();
        let b = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        assert_ne!(a.stealth_address, b.stealth_address);
        assert_ne!(a.ephemeral_pubkey, b.ephemeral_pubkey);
    }

    #[test]
    fn test_builder_with_label_and_note() {
        let meta = test_meta();

        let bundle = PaymentBundleBuilder::new()
            .recipient(meta.spend.public, meta.view.public)
            .label("d7f1e8a0-0000-4000-8000-000000000001")
            .note("Payment for services")
            .amount(150_000_000)
            .asset_id(AssetId::native())
            .build()
            .unwrap();

        let label = decrypt_note(
            bundle.encrypted_label.as_ref().unwrap(),
            &meta.view.secret,
            &bundle.ephemeral_pubkey,
        )
        .unwrap();
        assert_eq!(label, b"d7f1e8a0-0000-4000-8000-000000000001");

        let note = decrypt_note(
            bundle.encrypted_note.as_ref().unwrap(),
            &meta.view.secret,
            &bundle.ephemeral_pubkey,
        )
        .unwrap();
        assert_eq!(note, b"Payment for services");

        assert_eq!(bundle.metadata.amount, Some(150_000_000));
        assert!(bundle.metadata.asset_id.as_ref().unwrap().is_native());
    }

    #[test]
    fn test_builder_missing_recipient() {
        let result = PaymentBundleBuilder::new().amount(1).build();
        assert!(result.is_err());
    }

    /// Full round trip: recipient recovers the ephemeral secret and derives
    /// keys controlling the bundle's stealth address.
    #[test]
    fn test_recipient_controls_stealth_address() {
        let meta = test_meta();
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        let eph_secret = decrypt_ephemeral_secret(
            &bundle.encrypted_ephemeral_key,
            &meta.view.secret,
            &bundle.ephemeral_pubkey,
        )
        .unwrap();
        drop(eph_secret);

        let keys = derive_stealth_keypair(
            &meta.spend.secret,
            &meta.view.secret,
            &bundle.ephemeral_pubkey,
        )
        .unwrap();
        assert_eq!(keys.address, bundle.stealth_address);
    }

    #[test]
    fn test_bundle_serialization() {
        let meta = test_meta();
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        let json = serde_json::to_string(&bundle).unwrap();
        let restored: PaymentBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(bundle.stealth_address, restored.stealth_address);
        assert_eq!(bundle.encrypted_ephemeral_key, restored.encrypted_ephemeral_key);
    }
}
