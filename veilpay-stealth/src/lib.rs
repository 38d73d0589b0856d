//! # Veilpay Stealth Protocol
//!
//! High-level API for creating and resolving stealth payments.
//!
//! This crate provides:
//!
//! - **Payment Creation**: build a one-time address plus sealed fields for
//!   an outgoing payment
//! - **Ownership Resolution**: match indexed on-chain payments against
//!   registered viewing keys by trial derivation
//! - **Key Recovery**: re-derive the spendable key pair for a discovered
//!   payment
//!
//! ## Quick Start
//!
//! ```rust
//! use veilpay_core::Chain;
//! use veilpay_crypto::derive_meta_keys;
//! use veilpay_stealth::{create_payment_bundle, recover_stealth_keys};
//!
//! # fn main() -> veilpay_core::Result<()> {
//! // Recipient: derive meta keys from a wallet seed
//! let meta = derive_meta_keys(&[7u8; 32], Chain::AptosTestnet)?;
//!
//! // Sender: create a payment bundle for the published meta keys
//! let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public)?;
//! // ... send funds to bundle.stealth_address, publish the sealed fields
//!
//! // Recipient: recover the spendable key pair
//! let keys = recover_stealth_keys(
//!     &meta,
//!     &bundle.ephemeral_pubkey,
//!     &bundle.encrypted_ephemeral_key,
//!     &bundle.stealth_address,
//! )?;
//! assert_eq!(keys.address, bundle.stealth_address);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod payment;
pub mod recover;
pub mod resolve;

pub use payment::{create_payment_bundle, PaymentBundle, PaymentBundleBuilder, PaymentMetadata};
pub use recover::recover_stealth_keys;
pub use resolve::{resolve_ownership, resolve_with_key, Attribution, ResolveOutcome, ResolveStats};
