//! # Veilpay Ledger
//!
//! Balance calculation and reconciliation over the indexed event ledger.
//!
//! Three calculators, increasing in cost and decreasing in staleness risk:
//!
//! - [`activity`]: fast replay of payments minus withdrawals plus
//!   adjustments, the default read path
//! - [`chrono_replay`]: the same aggregate re-derived in strict timestamp
//!   order with decimal precision, for fallback and audit
//! - [`snapshot`]: RPC-sourced ground truth, cached per address
//!
//! [`reconcile`] keeps the fast path honest against snapshots through
//! bounded adjustments, and [`service`] exposes the combined read path.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod activity;
pub mod chrono_replay;
pub mod reconcile;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use activity::{activity_balances_for_address, activity_balances_for_user};
pub use chrono_replay::{chronological_balances_for_address, chronological_balances_for_user};
pub use reconcile::{ReconcileOutcome, Reconciler, ReconcilerConfig};
pub use service::BalanceService;
pub use snapshot::{RefreshHandle, RefreshWorker, SnapshotService};
