//! # Veilpay Cryptography
//!
//! Cryptographic primitives for the Veilpay stealth-payment protocol.
//!
//! This crate provides:
//!
//! - **Hash**: SHAKE256 with domain separation and chain auth-key hashing
//! - **Derive**: meta-key, ephemeral, and stealth key derivation (ed25519)
//! - **Seal**: AEAD sealing of ephemeral secrets and payment notes
//!
//! ## Security Properties
//!
//! - Secret keys are zeroized on drop
//! - Address comparisons use constant-time equality
//! - Domain separators prevent cross-protocol attacks
//!
//! ## Example
//!
//! ```rust
//! use veilpay_core::Chain;
//! use veilpay_crypto::{
//!     derive_meta_keys, derive_stealth_keypair, derive_stealth_public,
//!     generate_ephemeral_keypair,
//! };
//!
//! # fn main() -> veilpay_core::Result<()> {
//! let meta = derive_meta_keys(&[7u8; 32], Chain::AptosTestnet)?;
//!
//! // Sender derives the one-time address
//! let eph = generate_ephemeral_keypair();
//! let stealth = derive_stealth_public(&meta.spend.public, &meta.view.public, &eph.secret)?;
//!
//! // Recipient re-derives the matching key pair
//! let keys = derive_stealth_keypair(&meta.spend.secret, &meta.view.secret, &eph.public)?;
//! assert_eq!(keys.address, stealth.address);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod derive;
pub mod hash;
pub mod seal;

// Re-export main functions at crate root
pub use derive::{
    derive_address, derive_meta_keys, derive_stealth_keypair, derive_stealth_public,
    derive_stealth_public_watch, generate_ephemeral_keypair, public_of, verify_stealth_address,
    StealthKeys, StealthPublic,
};
pub use hash::{auth_key, sha3_256, shake256, shake256_multi};
pub use seal::{
    decrypt_ephemeral_secret, decrypt_note, encrypt_ephemeral_secret, encrypt_note,
};
