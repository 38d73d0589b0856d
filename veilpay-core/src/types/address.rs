//! On-chain account addresses.
//!
//! An account address is the SHA3-256 authentication key of an encoded
//! public key plus its signature-scheme tag. Stealth addresses are ordinary
//! account addresses; nothing distinguishes them on chain.

use serde::{Deserialize, Serialize};

use crate::constants::ADDRESS_SIZE;
use crate::error::{Result, VeilpayError};

/// A 32-byte on-chain account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress {
    bytes: [u8; ADDRESS_SIZE],
}

impl AccountAddress {
    /// Creates an address from raw bytes.
    ///
    /// # Errors
    /// Returns error if bytes length doesn't match `ADDRESS_SIZE`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ADDRESS_SIZE {
            return Err(VeilpayError::InvalidKeySize {
                expected: ADDRESS_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates an address from a fixed-size array.
    pub fn from_array(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parses a `0x`-prefixed (or bare) hex address.
    pub fn from_hex(s: &str) -> Result<Self> {
        let stripped = s.trim().trim_start_matches("0x");
        // Short addresses are zero-padded on the left, as the chain does.
        if stripped.len() > ADDRESS_SIZE * 2 {
            return Err(VeilpayError::ValidationError(format!(
                "address too long: {} hex chars",
                stripped.len()
            )));
        }
        let padded = format!("{:0>64}", stripped);
        let bytes = hex::decode(padded)?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the address as a fixed-size array reference.
    pub fn as_array(&self) -> &[u8; ADDRESS_SIZE] {
        &self.bytes
    }

    /// Returns the `0x`-prefixed hex representation.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Returns true if this is the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

/// A one-time stealth receiving address. Structurally identical to any
/// other account address; always recomputed, never stored as its own entity.
pub type StealthAddress = AccountAddress;

impl std::fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AccountAddress(0x{}...{})",
            hex::encode(&self.bytes[..4]),
            hex::encode(&self.bytes[ADDRESS_SIZE - 4..])
        )
    }
}

impl std::fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Default for AccountAddress {
    fn default() -> Self {
        Self {
            bytes: [0u8; ADDRESS_SIZE],
        }
    }
}

impl Serialize for AccountAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
