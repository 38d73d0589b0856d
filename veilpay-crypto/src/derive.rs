//! Meta-key and stealth key/address derivation.
//!
//! ## Derivation flow
//!
//! ```text
//! sender:    shared = eph_secret · view_pub
//! recipient: shared = view_secret · eph_pub          (same point)
//!       ↓
//! tweak = SHAKE256(DOMAIN_STEALTH_TWEAK || shared) mod ℓ
//!       ↓
//! stealth_pub    = spend_pub + tweak·G
//! stealth_secret = spend_secret + tweak   (mod ℓ)
//!       ↓
//! address = SHA3-256(stealth_pub || scheme_tag)
//! ```

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use rand::RngCore;
use zeroize::Zeroize;

use veilpay_core::constants::{DOMAIN_SPEND_KEY, DOMAIN_STEALTH_TWEAK, DOMAIN_VIEW_KEY, MIN_SEED_SIZE};
use veilpay_core::error::{Result, VeilpayError};
use veilpay_core::types::{Chain, KeyPair, MetaKeyPair, PublicKey, SecretKey, StealthAddress};

use crate::hash::{auth_key, shake256_multi};

// ═══════════════════════════════════════════════════════════════════════════════
// SCALAR / POINT PLUMBING
// ═══════════════════════════════════════════════════════════════════════════════

/// Hashes domain-separated inputs to a uniformly distributed scalar via
/// wide (64-byte) reduction.
fn scalar_from_hash(domain: &[u8], inputs: &[&[u8]]) -> Scalar {
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&shake256_multi(domain, inputs, 64));
    let scalar = Scalar::from_bytes_mod_order_wide(&wide);
    wide.zeroize();
    scalar
}

fn scalar_of(secret: &SecretKey) -> Scalar {
    Scalar::from_bytes_mod_order(*secret.as_array())
}

fn point_of(public: &PublicKey) -> Result<EdwardsPoint> {
    let point = CompressedEdwardsY(*public.as_array())
        .decompress()
        .ok_or_else(|| VeilpayError::InvalidPoint(format!("{:?}", public)))?;
    if point.is_identity() {
        return Err(VeilpayError::InvalidPoint("identity point".into()));
    }
    Ok(point)
}

fn keypair_from_scalar(scalar: Scalar) -> KeyPair {
    let public = EdwardsPoint::mul_base(&scalar).compress().to_bytes();
    KeyPair::new(
        PublicKey::from_array(public),
        SecretKey::from_array(scalar.to_bytes()),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// META KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives the long-lived (spend, view) meta key pair from a seed.
///
/// Deterministic: the same seed always reproduces the same pair, so a
/// wallet signature can regenerate keys without persisting them
/// client-side. The two scalars use distinct domain separators, and the
/// network name is mixed in so keys differ per chain.
///
/// # Errors
/// Returns `ValidationError` if the seed is shorter than [`MIN_SEED_SIZE`].
pub fn derive_meta_keys(seed: &[u8], chain: Chain) -> Result<MetaKeyPair> {
    if seed.len() < MIN_SEED_SIZE {
        return Err(VeilpayError::ValidationError(format!(
            "seed too short: {} bytes, need at least {}",
            seed.len(),
            MIN_SEED_SIZE
        )));
    }

    let network = chain.network_name().as_bytes();
    let spend = scalar_from_hash(DOMAIN_SPEND_KEY, &[network, seed]);
    let view = scalar_from_hash(DOMAIN_VIEW_KEY, &[network, seed]);

    if spend == Scalar::ZERO || view == Scalar::ZERO {
        // Unreachable for a uniform hash, but never hand out a zero key.
        return Err(VeilpayError::KeyDerivationError(
            "derived zero scalar".into(),
        ));
    }

    Ok(MetaKeyPair::new(
        keypair_from_scalar(spend),
        keypair_from_scalar(view),
    ))
}

/// Generates a fresh ephemeral key pair for one outgoing payment.
///
/// The secret half is discarded by the sender after use; the recipient
/// recovers it by decrypting the sealed copy that travels with the payment.
pub fn generate_ephemeral_keypair() -> KeyPair {
    let mut wide = [0u8; 64];
    rand::rngs::OsRng.fill_bytes(&mut wide);
    let scalar = Scalar::from_bytes_mod_order_wide(&wide);
    wide.zeroize();
    keypair_from_scalar(scalar)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED SECRET
// ═══════════════════════════════════════════════════════════════════════════════

/// Sender-side ECDH: `eph_secret · view_pub`, compressed.
pub fn shared_secret_sender(eph_secret: &SecretKey, view_pub: &PublicKey) -> Result<[u8; 32]> {
    let point = point_of(view_pub)?;
    Ok((scalar_of(eph_secret) * point).compress().to_bytes())
}

/// Recipient-side ECDH: `view_secret · eph_pub`, compressed. Yields the
/// same point as the sender side.
pub fn shared_secret_recipient(view_secret: &SecretKey, eph_pub: &PublicKey) -> Result<[u8; 32]> {
    let point = point_of(eph_pub)?;
    Ok((scalar_of(view_secret) * point).compress().to_bytes())
}

fn tweak_scalar(shared: &[u8; 32]) -> Scalar {
    scalar_from_hash(DOMAIN_STEALTH_TWEAK, &[shared])
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Sender-side derivation result: the one-time public key and its address.
#[derive(Clone, Debug)]
pub struct StealthPublic {
    /// The stealth public key.
    pub public: PublicKey,
    /// The derived on-chain address.
    pub address: StealthAddress,
}

/// Recipient-side derivation result: a spendable key pair plus address.
pub struct StealthKeys {
    /// The stealth public key.
    pub public: PublicKey,
    /// The stealth secret key (zeroized on drop).
    pub secret: SecretKey,
    /// The derived on-chain address.
    pub address: StealthAddress,
}

impl std::fmt::Debug for StealthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthKeys")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .field("address", &self.address)
            .finish()
    }
}

/// Computes the on-chain address of a stealth public key.
pub fn derive_address(public: &PublicKey) -> StealthAddress {
    StealthAddress::from_array(auth_key(public.as_array()))
}

/// Sender side: derives the stealth public key and address a payment
/// should be sent to.
pub fn derive_stealth_public(
    spend_pub: &PublicKey,
    view_pub: &PublicKey,
    eph_secret: &SecretKey,
) -> Result<StealthPublic> {
    let shared = shared_secret_sender(eph_secret, view_pub)?;
    let tweak = tweak_scalar(&shared);

    let stealth_point = point_of(spend_pub)? + EdwardsPoint::mul_base(&tweak);
    let public = PublicKey::from_array(stealth_point.compress().to_bytes());

    Ok(StealthPublic {
        address: derive_address(&public),
        public,
    })
}

/// Recipient side: derives the spendable stealth key pair for a discovered
/// payment. The public half must equal the sender-derived stealth public
/// key.
pub fn derive_stealth_keypair(
    spend_secret: &SecretKey,
    view_secret: &SecretKey,
    eph_pub: &PublicKey,
) -> Result<StealthKeys> {
    let shared = shared_secret_recipient(view_secret, eph_pub)?;
    let tweak = tweak_scalar(&shared);

    let stealth_scalar = scalar_of(spend_secret) + tweak;
    let public = PublicKey::from_array(EdwardsPoint::mul_base(&stealth_scalar).compress().to_bytes());

    Ok(StealthKeys {
        address: derive_address(&public),
        secret: SecretKey::from_array(stealth_scalar.to_bytes()),
        public,
    })
}

/// Watch-only derivation: recomputes the stealth public key from the view
/// secret and the spend public key, without the spend secret. This is the
/// trial-derivation path used to attribute on-chain payments to registered
/// viewing keys.
pub fn derive_stealth_public_watch(
    spend_pub: &PublicKey,
    view_secret: &SecretKey,
    eph_pub: &PublicKey,
) -> Result<StealthPublic> {
    let shared = shared_secret_recipient(view_secret, eph_pub)?;
    let tweak = tweak_scalar(&shared);

    let stealth_point = point_of(spend_pub)? + EdwardsPoint::mul_base(&tweak);
    let public = PublicKey::from_array(stealth_point.compress().to_bytes());

    Ok(StealthPublic {
        address: derive_address(&public),
        public,
    })
}

/// Verifies that a stealth address was derived from the given meta keys
/// and ephemeral secret. Constant-time comparison.
pub fn verify_stealth_address(
    spend_pub: &PublicKey,
    view_pub: &PublicKey,
    eph_secret: &SecretKey,
    expected: &StealthAddress,
) -> Result<bool> {
    let derived = derive_stealth_public(spend_pub, view_pub, eph_secret)?;
    Ok(subtle::ConstantTimeEq::ct_eq(derived.address.as_bytes(), expected.as_bytes()).into())
}

/// Recomputes the public half of an ephemeral secret. Used by decryption
/// as the authenticity check.
pub fn public_of(secret: &SecretKey) -> PublicKey {
    PublicKey::from_array(
        EdwardsPoint::mul_base(&scalar_of(secret))
            .compress()
            .to_bytes(),
    )
}
