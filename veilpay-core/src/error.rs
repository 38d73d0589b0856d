//! Error types for Veilpay.
//!
//! A single `thiserror` hierarchy shared across the workspace. Errors carry
//! enough context to be actionable; classification helpers let callers decide
//! between retry, skip, and surface.

use thiserror::Error;

/// Result type alias using `VeilpayError`.
pub type Result<T> = std::result::Result<T, VeilpayError>;

/// Main error type for all Veilpay operations.
#[derive(Debug, Error)]
pub enum VeilpayError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CRYPTOGRAPHIC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Meta or stealth key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    /// Invalid key size or format.
    #[error("Invalid key: expected {expected} bytes, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    /// A compressed curve point failed to decompress.
    #[error("Invalid curve point: {0}")]
    InvalidPoint(String),

    /// AEAD encryption failed.
    #[error("Sealing failed: {0}")]
    SealFailure(String),

    /// AEAD decryption/authentication failed.
    ///
    /// During attribution this means "wrong key, try the next one" rather
    /// than a fatal fault.
    #[error("Opening failed: {0}")]
    OpenFailure(String),

    /// A decrypted ephemeral secret does not reproduce the on-chain
    /// ephemeral public key. This is the authenticity check failing.
    #[error("Decrypted ephemeral key does not match the published public key")]
    EphemeralKeyMismatch,

    /// An encrypted payload would exceed the on-chain field ceiling.
    #[error("Encrypted payload too large: {actual} bytes exceeds ceiling of {max}")]
    PayloadTooLarge { max: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════════════════
    // INDEXING ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A raw event payload could not be decoded. The event is skipped and
    /// logged; the batch continues.
    #[error("Event decode failed: {0}")]
    EventDecode(String),

    /// The chain reader was unreachable or rate-limited. Aborts the current
    /// indexing cycle only; resume is idempotent.
    #[error("Chain read failed: {0}")]
    ChainRead(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Generic store failure (the in-memory store only produces these for
    /// invariant violations; persistent backends map their own errors here).
    #[error("Store error: {0}")]
    StoreError(String),

    /// A row referenced by key does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl VeilpayError {
    /// Returns true if this error is recoverable by retrying on the next
    /// scheduled pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VeilpayError::ChainRead(_))
    }

    /// Returns true if this is a cryptographic error.
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            VeilpayError::KeyDerivationError(_)
                | VeilpayError::InvalidKeySize { .. }
                | VeilpayError::InvalidPoint(_)
                | VeilpayError::SealFailure(_)
                | VeilpayError::OpenFailure(_)
                | VeilpayError::EphemeralKeyMismatch
        )
    }

    /// Returns true if the error means "this key was not the right one"
    /// during trial decryption, as opposed to a malformed input.
    pub fn is_wrong_key(&self) -> bool {
        matches!(
            self,
            VeilpayError::OpenFailure(_) | VeilpayError::EphemeralKeyMismatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VeilpayError::InvalidKeySize {
            expected: 32,
            actual: 16,
        };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("16"));
    }

    use test_case::test_case;

    #[test_case(VeilpayError::ChainRead("timeout".into()), true; "chain read is recoverable")]
    #[test_case(VeilpayError::EventDecode("bad".into()), false; "decode is not recoverable")]
    #[test_case(VeilpayError::StoreError("down".into()), false; "store is not recoverable")]
    fn test_recoverable_classification(err: VeilpayError, recoverable: bool) {
        assert_eq!(err.is_recoverable(), recoverable);
    }

    #[test]
    fn test_wrong_key_classification() {
        assert!(VeilpayError::EphemeralKeyMismatch.is_crypto_error());
        assert!(VeilpayError::OpenFailure("tag".into()).is_wrong_key());
        assert!(!VeilpayError::SealFailure("x".into()).is_wrong_key());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("invalid");
        let result: Result<serde_json::Value> = json_result.map_err(VeilpayError::from);
        assert!(matches!(result, Err(VeilpayError::JsonError(_))));
    }
}
