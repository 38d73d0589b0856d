//! # Veilpay Core
//!
//! Core types, errors, and traits for the Veilpay stealth-payment core.
//!
//! This crate provides the foundational building blocks used by all other
//! Veilpay crates:
//!
//! - **Types**: keys, addresses, ledger rows, balances, wire types
//! - **Errors**: one taxonomy with retry/skip/surface classification
//! - **Constants**: protocol sizes and domain separators
//! - **Traits**: the chain-reader and ledger-store boundaries
//!
//! ## Example
//!
//! ```rust
//! use veilpay_core::{AccountAddress, AssetId, Chain};
//!
//! let asset = AssetId::native();
//! let addr = AccountAddress::from_hex("0x1").unwrap();
//! assert!(asset.is_native());
//! assert!(!addr.is_zero());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{Result, VeilpayError};
pub use traits::*;
pub use types::*;
