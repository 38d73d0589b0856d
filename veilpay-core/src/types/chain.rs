//! Chain and asset identifiers.

use serde::{Deserialize, Serialize};

use crate::constants::NATIVE_ASSET;

/// Supported networks. The network name participates in meta-key derivation
/// so the same seed yields different keys per network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    /// Aptos mainnet.
    AptosMainnet,
    /// Aptos testnet.
    AptosTestnet,
}

impl Chain {
    /// Network-level domain string mixed into key derivation.
    pub fn network_name(&self) -> &'static str {
        match self {
            Chain::AptosMainnet => "aptos:mainnet",
            Chain::AptosTestnet => "aptos:testnet",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.network_name())
    }
}

/// Asset identifier (fully qualified coin type on chain).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    /// Creates an asset id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The native coin.
    pub fn native() -> Self {
        Self(NATIVE_ASSET.to_string())
    }

    /// Returns true if this is the native coin.
    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_ASSET
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names_differ() {
        assert_ne!(
            Chain::AptosMainnet.network_name(),
            Chain::AptosTestnet.network_name()
        );
    }

    #[test]
    fn test_native_asset() {
        assert!(AssetId::native().is_native());
        assert!(!AssetId::new("0xabc::usdc::USDC").is_native());
    }

    #[test]
    fn test_chain_serde() {
        let json = serde_json::to_string(&Chain::AptosMainnet).unwrap();
        assert_eq!(json, "\"aptos_mainnet\"");
        let back: Chain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Chain::AptosMainnet);
    }
}
