//! Protocol constants for Veilpay.
//!
//! All byte sizes follow the target chain's single-ed25519 account scheme:
//! compressed 32-byte curve points, 32-byte SHA3-256 authentication keys.

// ═══════════════════════════════════════════════════════════════════════════════
// KEY AND ADDRESS SIZES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a compressed ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an ed25519 secret scalar in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of an on-chain account address (SHA3-256 output) in bytes.
pub const ADDRESS_SIZE: usize = 32;

/// Scheme tag appended to the public key before hashing into an auth key.
/// 0x00 is the single-ed25519 signature scheme.
pub const ED25519_SCHEME_TAG: u8 = 0x00;

/// Minimum seed length accepted by meta-key derivation.
///
/// Seeds are typically 64-byte wallet signatures; anything shorter than
/// 32 bytes does not carry enough entropy for two independent keys.
pub const MIN_SEED_SIZE: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// AEAD SEALING
// ═══════════════════════════════════════════════════════════════════════════════

/// AES-256-GCM key size in bytes.
pub const AEAD_KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes. The nonce is random and prepended to
/// every sealed payload.
pub const AEAD_NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const AEAD_TAG_SIZE: usize = 16;

/// Hard ceiling for any encrypted field submitted on-chain.
///
/// On-chain script arguments have fixed byte budgets; oversized payloads
/// must be rejected before submission, not truncated.
pub const MAX_ENCRYPTED_FIELD_SIZE: usize = 1024;

/// Largest plaintext that still fits under [`MAX_ENCRYPTED_FIELD_SIZE`]
/// once the nonce and tag are accounted for.
pub const MAX_NOTE_PLAINTEXT_SIZE: usize =
    MAX_ENCRYPTED_FIELD_SIZE - AEAD_NONCE_SIZE - AEAD_TAG_SIZE;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN SEPARATORS
// ═══════════════════════════════════════════════════════════════════════════════
// Each SHAKE256/HKDF invocation uses a unique domain separator so outputs
// from different operations never collide, even with identical inputs.

/// Domain separator for the spend meta-key scalar.
pub const DOMAIN_SPEND_KEY: &[u8] = b"VEILPAY_SPEND_KEY_V1";

/// Domain separator for the view meta-key scalar.
pub const DOMAIN_VIEW_KEY: &[u8] = b"VEILPAY_VIEW_KEY_V1";

/// Domain separator for the stealth tweak scalar.
pub const DOMAIN_STEALTH_TWEAK: &[u8] = b"VEILPAY_STEALTH_TWEAK_V1";

/// HKDF info string when sealing an ephemeral secret key.
pub const AEAD_INFO_EPHEMERAL_KEY: &[u8] = b"veilpay/ephemeral-key";

/// HKDF info string when sealing a memo/label/note.
pub const AEAD_INFO_MEMO: &[u8] = b"veilpay/memo";

// ═══════════════════════════════════════════════════════════════════════════════
// NATIVE ASSET
// ═══════════════════════════════════════════════════════════════════════════════

/// Canonical asset identifier for the native coin.
pub const NATIVE_ASSET: &str = "0x1::aptos_coin::AptosCoin";

/// Subunits per whole native coin (octas).
pub const OCTAS_PER_COIN: u128 = 100_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// INDEXING DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default page size when fetching transactions from the chain reader.
pub const DEFAULT_FETCH_BATCH_SIZE: u64 = 50;

/// Default attempt ceiling for processing-log entries. Events that cannot
/// be attributed after this many passes stop being retried.
pub const DEFAULT_MAX_PROCESS_ATTEMPTS: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_ceiling_leaves_room_for_framing() {
        assert_eq!(
            MAX_NOTE_PLAINTEXT_SIZE + AEAD_NONCE_SIZE + AEAD_TAG_SIZE,
            MAX_ENCRYPTED_FIELD_SIZE
        );
    }

    #[test]
    fn test_domain_separators_unique() {
        let domains = [
            DOMAIN_SPEND_KEY,
            DOMAIN_VIEW_KEY,
            DOMAIN_STEALTH_TWEAK,
            AEAD_INFO_EPHEMERAL_KEY,
            AEAD_INFO_MEMO,
        ];
        for (i, a) in domains.iter().enumerate() {
            for (j, b) in domains.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Domain separators must be unique");
                }
            }
        }
    }
}
