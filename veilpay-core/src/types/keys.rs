//! Key types for Veilpay.
//!
//! This module defines the key structures used by the protocol:
//!
//! - [`PublicKey`]: compressed ed25519 point (32 bytes)
//! - [`SecretKey`]: ed25519 scalar (32 bytes, zeroized on drop)
//! - [`KeyPair`]: combined public + secret key
//! - [`MetaKeyPair`]: the long-lived (spend, view) pair every stealth
//!   address for a recipient derives from

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
use crate::error::{Result, VeilpayError};

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Compressed ed25519 public key.
///
/// Safe to share; spend/view public halves are published as the recipient's
/// identity, ephemeral public halves travel with each payment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_SIZE],
}

impl PublicKey {
    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    /// Returns error if bytes length doesn't match `PUBLIC_KEY_SIZE`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(VeilpayError::InvalidKeySize {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates a public key from a fixed-size array.
    pub fn from_array(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes of the public key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the public key as a fixed-size array reference.
    pub fn as_array(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Returns the hex-encoded public key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Creates a public key from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show first/last 4 bytes for readability
        write!(
            f,
            "PublicKey({}...{})",
            hex::encode(&self.bytes[..4]),
            hex::encode(&self.bytes[PUBLIC_KEY_SIZE - 4..])
        )
    }
}

impl Default for PublicKey {
    fn default() -> Self {
        Self {
            bytes: [0u8; PUBLIC_KEY_SIZE],
        }
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECRET KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Ed25519 secret scalar.
///
/// Sensitive and automatically zeroized when dropped. Never expose in logs
/// or error messages.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; SECRET_KEY_SIZE],
}

impl SecretKey {
    /// Creates a new secret key from raw bytes.
    ///
    /// # Errors
    /// Returns error if bytes length doesn't match `SECRET_KEY_SIZE`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(VeilpayError::InvalidKeySize {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SECRET_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates a secret key from a fixed-size array.
    pub fn from_array(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes of the secret key.
    ///
    /// # Security
    /// Handle the returned bytes carefully - do not log or expose them.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the secret key as a fixed-size array reference.
    pub fn as_array(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose secret key content
        write!(f, "SecretKey([REDACTED])")
    }
}

impl Default for SecretKey {
    fn default() -> Self {
        Self {
            bytes: [0u8; SECRET_KEY_SIZE],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PAIRS
// ═══════════════════════════════════════════════════════════════════════════════

/// A complete key pair (public + secret).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    /// Public key (safe to share)
    #[zeroize(skip)]
    pub public: PublicKey,
    /// Secret key (keep private, auto-zeroized)
    pub secret: SecretKey,
}

impl KeyPair {
    /// Creates a new key pair from public and secret keys.
    pub fn new(public: PublicKey, secret: SecretKey) -> Self {
        Self { public, secret }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Spend key pair - controls funds at derived stealth addresses.
pub type SpendKeyPair = KeyPair;

/// View key pair - recognizes incoming payments without spending ability.
///
/// The view secret can be held server-side for indexing; it cannot move
/// funds.
pub type ViewKeyPair = KeyPair;

/// The long-lived per-(user, chain) meta key pair.
///
/// Immutable once payments exist against addresses it derived; rotation is
/// out of scope.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MetaKeyPair {
    /// Keys that control funds at derived stealth addresses
    pub spend: SpendKeyPair,
    /// Keys that recognize incoming payments
    pub view: ViewKeyPair,
}

impl MetaKeyPair {
    /// Creates a new meta key pair.
    pub fn new(spend: SpendKeyPair, view: ViewKeyPair) -> Self {
        Self { spend, view }
    }
}

impl std::fmt::Debug for MetaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaKeyPair")
            .field("spend", &self.spend)
            .field("view", &self.view)
            .finish()
    }
}
