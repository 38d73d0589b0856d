//! # Veilpay Cache
//!
//! Tiered in-memory balance caches and the invalidation hooks that keep
//! them honest.
//!
//! This crate provides:
//!
//! - **Address snapshots**: cached RPC holdings per stealth address, with
//!   TTLs tiered by how active the address is
//! - **User summaries**: per-user aggregates with activity watermarks
//! - **Invalidation**: synchronous hooks fired by the indexer on each new
//!   payment or withdrawal

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod invalidate;
pub mod store;

pub use invalidate::BalanceInvalidator;
pub use store::{ActivityTier, AddressBalanceStore, CacheConfig, UserSummaryStore};
