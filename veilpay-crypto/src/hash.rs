//! Hashing utilities with domain separation.
//!
//! Every SHAKE256 invocation in the protocol includes a unique,
//! length-prefixed domain separator:
//!
//! ```text
//! output = SHAKE256(len(domain) || domain || input, output_length)
//! ```
//!
//! This prevents cross-protocol attacks where the same input might be
//! used in different contexts.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Sha3_256, Shake256};

use veilpay_core::constants::{ADDRESS_SIZE, ED25519_SCHEME_TAG};

// ═══════════════════════════════════════════════════════════════════════════════
// SHAKE256
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes SHAKE256 with domain separation.
///
/// # Arguments
///
/// * `domain` - Domain separator bytes (unique per use case)
/// * `input` - Input data to hash
/// * `output_len` - Desired output length in bytes
pub fn shake256(domain: &[u8], input: &[u8], output_len: usize) -> Vec<u8> {
    let mut hasher = Shake256::default();

    // Domain separation: prepend domain with length prefix
    hasher.update(&(domain.len() as u32).to_le_bytes());
    hasher.update(domain);

    hasher.update(input);

    let mut reader = hasher.finalize_xof();
    let mut output = vec![0u8; output_len];
    reader.read(&mut output);

    output
}

/// Computes SHAKE256 over multiple inputs, each length-prefixed so the
/// framing is unambiguous.
pub fn shake256_multi(domain: &[u8], inputs: &[&[u8]], output_len: usize) -> Vec<u8> {
    let mut hasher = Shake256::default();

    hasher.update(&(domain.len() as u32).to_le_bytes());
    hasher.update(domain);

    for input in inputs {
        hasher.update(&(input.len() as u64).to_le_bytes());
        hasher.update(input);
    }

    let mut reader = hasher.finalize_xof();
    let mut output = vec![0u8; output_len];
    reader.read(&mut output);

    output
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHA3-256 (chain authentication keys)
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes SHA3-256 (not Keccak; the chain uses the standardized padding).
pub fn sha3_256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    Digest::update(&mut hasher, input);
    hasher.finalize().into()
}

/// Computes the on-chain authentication key of an ed25519 public key:
/// `SHA3-256(pubkey || scheme_tag)`.
///
/// This must match the target chain's address-derivation rule exactly -
/// any deviation silently breaks ownership recognition.
pub fn auth_key(public_key: &[u8; 32]) -> [u8; ADDRESS_SIZE] {
    let mut preimage = [0u8; 33];
    preimage[..32].copy_from_slice(public_key);
    preimage[32] = ED25519_SCHEME_TAG;
    sha3_256(&preimage)
}
