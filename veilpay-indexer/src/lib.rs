//! # Veilpay Indexer
//!
//! Polls the chain for stealth payment and withdrawal events, persists them
//! idempotently, attributes ownership by trial derivation against registered
//! viewing keys, and keeps the balance caches invalidated.
//!
//! The moving parts:
//!
//! - [`events`]: decodes raw event payloads into a closed enum
//! - [`gate`]: paces and serializes all RPC traffic
//! - [`indexer`]: the per-cycle engine (discover, dedup, attribute, pair)
//! - [`worker`]: background loops with watch-channel shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod events;
pub mod gate;
pub mod indexer;
pub mod worker;

#[cfg(test)]
mod testing;

pub use events::{decode_event, ChainEvent, PaymentEvent, WithdrawalEvent};
pub use gate::{RpcGate, RpcPermit};
pub use indexer::{EventIndexer, IndexerConfig, IndexerStats};
pub use worker::{CacheCleanupWorker, IndexerWorker, WorkerConfig, WorkerHandle};
