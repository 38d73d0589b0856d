//! Spendable key recovery (recipient claim path).

use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::types::{MetaKeyPair, PublicKey, StealthAddress};
use veilpay_crypto::derive::{derive_stealth_keypair, StealthKeys};
use veilpay_crypto::seal::decrypt_ephemeral_secret;

/// Recovers the spendable stealth key pair for an indexed payment.
///
/// Opens the sealed ephemeral secret as an authenticity check, then
/// re-derives the key pair from the meta keys and verifies it controls the
/// expected address.
///
/// # Errors
/// - `OpenFailure` / `EphemeralKeyMismatch` when the sealed key was not
///   produced for these meta keys.
/// - `ValidationError` when the derived address does not match the
///   payment's stealth address.
pub fn recover_stealth_keys(
    meta: &MetaKeyPair,
    ephemeral_pubkey: &PublicKey,
    encrypted_ephemeral_key: &[u8],
    expected_address: &StealthAddress,
) -> Result<StealthKeys> {
    // The sealed copy proves the sender actually used this ephemeral key.
    let _ephemeral_secret =
        decrypt_ephemeral_secret(encrypted_ephemeral_key, &meta.view.secret, ephemeral_pubkey)?;

    let keys = derive_stealth_keypair(&meta.spend.secret, &meta.view.secret, ephemeral_pubkey)?;
    if &keys.address != expected_address {
        return Err(VeilpayError::ValidationError(
            "recovered keys do not control the payment address".into(),
        ));
    }

    Ok(keys)
}
