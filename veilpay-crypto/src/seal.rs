//! Authenticated sealing of ephemeral secrets and payment notes.
//!
//! The AEAD key is derived from the ECDH shared secret:
//!
//! ```text
//! key = HKDF-SHA256(ikm = shared_point, salt = eph_pub, info = purpose)
//! sealed = nonce || AES-256-GCM(key, nonce, plaintext)
//! ```
//!
//! The purpose string separates ephemeral-key payloads from memo payloads.
//! Decrypting an ephemeral secret additionally recomputes its public key
//! and fails on mismatch - that check is the authenticity guarantee, not
//! just confidentiality.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use veilpay_core::constants::{
    AEAD_INFO_EPHEMERAL_KEY, AEAD_INFO_MEMO, AEAD_KEY_SIZE, AEAD_NONCE_SIZE, AEAD_TAG_SIZE,
    MAX_ENCRYPTED_FIELD_SIZE, MAX_NOTE_PLAINTEXT_SIZE,
};
use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::types::{KeyPair, PublicKey, SecretKey};

use crate::derive::{public_of, shared_secret_recipient, shared_secret_sender};

// ═══════════════════════════════════════════════════════════════════════════════
// KEY DERIVATION + RAW SEAL/OPEN
// ═══════════════════════════════════════════════════════════════════════════════

fn seal_key(shared: &[u8; 32], eph_pub: &PublicKey, info: &[u8]) -> Result<[u8; AEAD_KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(eph_pub.as_bytes()), shared);
    let mut okm = [0u8; AEAD_KEY_SIZE];
    hk.expand(info, &mut okm)
        .map_err(|e| VeilpayError::SealFailure(format!("hkdf expand: {e}")))?;
    Ok(okm)
}

fn seal(plaintext: &[u8], shared: &[u8; 32], eph_pub: &PublicKey, info: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() > MAX_NOTE_PLAINTEXT_SIZE {
        return Err(VeilpayError::PayloadTooLarge {
            max: MAX_NOTE_PLAINTEXT_SIZE,
            actual: plaintext.len(),
        });
    }

    let mut key = seal_key(shared, eph_pub, info)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let mut nonce = [0u8; AEAD_NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| VeilpayError::SealFailure("aead encrypt".into()))?;
    key.zeroize();

    let mut sealed = Vec::with_capacity(AEAD_NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    // Belt and braces: the plaintext ceiling above already guarantees this.
    if sealed.len() > MAX_ENCRYPTED_FIELD_SIZE {
        return Err(VeilpayError::PayloadTooLarge {
            max: MAX_ENCRYPTED_FIELD_SIZE,
            actual: sealed.len(),
        });
    }

    Ok(sealed)
}

fn open(sealed: &[u8], shared: &[u8; 32], eph_pub: &PublicKey, info: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < AEAD_NONCE_SIZE + AEAD_TAG_SIZE {
        return Err(VeilpayError::OpenFailure(format!(
            "sealed payload too short: {} bytes",
            sealed.len()
        )));
    }
    if sealed.len() > MAX_ENCRYPTED_FIELD_SIZE {
        return Err(VeilpayError::PayloadTooLarge {
            max: MAX_ENCRYPTED_FIELD_SIZE,
            actual: sealed.len(),
        });
    }

    let (nonce, ciphertext) = sealed.split_at(AEAD_NONCE_SIZE);

    let mut key = seal_key(shared, eph_pub, info)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VeilpayError::OpenFailure("aead authentication failed".into()));
    key.zeroize();

    plaintext
}

// ═══════════════════════════════════════════════════════════════════════════════
// EPHEMERAL SECRET SEALING
// ═══════════════════════════════════════════════════════════════════════════════

/// Seals the ephemeral secret key to the recipient's view key. Published
/// alongside the payment so the recipient can later re-derive the stealth
/// key pair.
pub fn encrypt_ephemeral_secret(ephemeral: &KeyPair, view_pub: &PublicKey) -> Result<Vec<u8>> {
    let shared = shared_secret_sender(&ephemeral.secret, view_pub)?;
    seal(
        ephemeral.secret.as_bytes(),
        &shared,
        &ephemeral.public,
        AEAD_INFO_EPHEMERAL_KEY,
    )
}

/// Opens a sealed ephemeral secret with the recipient's view secret.
///
/// # Errors
/// - `OpenFailure` when the AEAD tag does not verify (wrong view key).
/// - `EphemeralKeyMismatch` when the recovered secret does not reproduce
///   the published ephemeral public key.
pub fn decrypt_ephemeral_secret(
    sealed: &[u8],
    view_secret: &SecretKey,
    eph_pub: &PublicKey,
) -> Result<SecretKey> {
    let shared = shared_secret_recipient(view_secret, eph_pub)?;
    let mut plaintext = open(sealed, &shared, eph_pub, AEAD_INFO_EPHEMERAL_KEY)?;

    let secret = SecretKey::from_bytes(&plaintext);
    plaintext.zeroize();
    let secret = secret?;

    if &public_of(&secret) != eph_pub {
        return Err(VeilpayError::EphemeralKeyMismatch);
    }

    Ok(secret)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOTE SEALING
// ═══════════════════════════════════════════════════════════════════════════════

/// Seals a label/memo/note to the recipient's view key.
pub fn encrypt_note(
    plaintext: &[u8],
    ephemeral: &KeyPair,
    view_pub: &PublicKey,
) -> Result<Vec<u8>> {
    let shared = shared_secret_sender(&ephemeral.secret, view_pub)?;
    seal(plaintext, &shared, &ephemeral.public, AEAD_INFO_MEMO)
}

/// Opens a sealed note with the recipient's view secret.
pub fn decrypt_note(
    sealed: &[u8],
    view_secret: &SecretKey,
    eph_pub: &PublicKey,
) -> Result<Vec<u8>> {
    let shared = shared_secret_recipient(view_secret, eph_pub)?;
    open(sealed, &shared, eph_pub, AEAD_INFO_MEMO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{derive_meta_keys, generate_ephemeral_keypair};
    use proptest::prelude::*;
    use veilpay_core::types::Chain;

    fn setup() -> (veilpay_core::types::MetaKeyPair, KeyPair) {
        let meta = derive_meta_keys(&[21u8; 32], Chain::AptosTestnet).unwrap();
        let eph = generate_ephemeral_keypair();
        (meta, eph)
    }

    #[test]
    fn test_ephemeral_secret_round_trip() {
        let (meta, eph) = setup();

        let sealed = encrypt_ephemeral_secret(&eph, &meta.view.public).unwrap();
        let recovered =
            decrypt_ephemeral_secret(&sealed, &meta.view.secret, &eph.public).unwrap();

        assert_eq!(recovered.as_bytes(), eph.secret.as_bytes());
    }

    #[test]
    fn test_wrong_view_key_fails_authenticity() {
        let (meta, eph) = setup();
        let other = derive_meta_keys(&[22u8; 32], Chain::AptosTestnet).unwrap();

        let sealed = encrypt_ephemeral_secret(&eph, &meta.view.public).unwrap();
        let result = decrypt_ephemeral_secret(&sealed, &other.view.secret, &eph.public);

        // Must fail loudly, never silently return wrong bytes.
        assert!(result.unwrap_err().is_wrong_key());
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let (meta, eph) = setup();
        let mut sealed = encrypt_ephemeral_secret(&eph, &meta.view.public).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        let result = decrypt_ephemeral_secret(&sealed, &meta.view.secret, &eph.public);
        assert!(matches!(result, Err(VeilpayError::OpenFailure(_))));
    }

    #[test]
    fn test_wrong_ephemeral_pubkey_mismatch() {
        let (meta, eph) = setup();
        let other_eph = generate_ephemeral_keypair();

        let sealed = encrypt_ephemeral_secret(&eph, &meta.view.public).unwrap();
        // AEAD key derivation is salted by eph_pub, so substituting the key
        // fails at authentication already.
        let result = decrypt_ephemeral_secret(&sealed, &meta.view.secret, &other_eph.public);
        assert!(result.unwrap_err().is_wrong_key());
    }

    #[test]
    fn test_note_round_trip() {
        let (meta, eph) = setup();

        let sealed = encrypt_note(b"link:coffee-fund", &eph, &meta.view.public).unwrap();
        let plain = decrypt_note(&sealed, &meta.view.secret, &eph.public).unwrap();
        assert_eq!(plain, b"link:coffee-fund");
    }

    #[test]
    fn test_note_and_ephemeral_domains_separate() {
        let (meta, eph) = setup();

        // A note sealed under the memo domain must not open under the
        // ephemeral-key domain.
        let sealed = encrypt_note(eph.secret.as_bytes(), &eph, &meta.view.public).unwrap();
        let result = decrypt_ephemeral_secret(&sealed, &meta.view.secret, &eph.public);
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_note_rejected() {
        let (meta, eph) = setup();
        let big = vec![0u8; MAX_NOTE_PLAINTEXT_SIZE + 1];

        let result = encrypt_note(&big, &eph, &meta.view.public);
        assert!(matches!(result, Err(VeilpayError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let (meta, _eph) = setup();
        let eph = generate_ephemeral_keypair();
        let result = decrypt_note(&[0u8; 8], &meta.view.secret, &eph.public);
        assert!(matches!(result, Err(VeilpayError::OpenFailure(_))));
    }

    #[test]
    fn test_nonce_randomized() {
        let (meta, eph) = setup();
        let a = encrypt_note(b"same", &eph, &meta.view.public).unwrap();
        let b = encrypt_note(b"same", &eph, &meta.view.public).unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_note_round_trip(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let meta = derive_meta_keys(&[33u8; 32], Chain::AptosTestnet).unwrap();
            let eph = generate_ephemeral_keypair();

            let sealed = encrypt_note(&data, &eph, &meta.view.public).unwrap();
            let plain = decrypt_note(&sealed, &meta.view.secret, &eph.public).unwrap();
            prop_assert_eq!(plain, data);
        }
    }
}
