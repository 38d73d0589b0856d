//! # Veilpay Store
//!
//! In-memory [`LedgerStore`](veilpay_core::traits::LedgerStore) backend.
//!
//! This is the reference implementation of the persistence boundary, used
//! by tests and single-process deployments. Production backends implement
//! the same trait against a real database.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod memory;

pub use memory::MemoryLedgerStore;
