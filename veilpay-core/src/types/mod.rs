//! Core type definitions.

pub mod address;
pub mod balance;
pub mod chain;
pub mod keys;
pub mod ledger;
pub mod rpc;

pub use address::{AccountAddress, StealthAddress};
pub use balance::{
    AccountHoldings, AddressBalanceCache, AssetBalance, AssetTotal, BalanceDiscrepancy,
    BalanceResponse, BalanceSource, UserBalanceSummary,
};
pub use chain::{AssetId, Chain};
pub use keys::{KeyPair, MetaKeyPair, PublicKey, SecretKey, SpendKeyPair, ViewKeyPair};
pub use ledger::{
    BalanceAdjustment, IndexedPayment, IndexedWithdrawal, PaymentKey, ProcessType,
    ProcessingLogEntry, RegisteredViewingKey, WithdrawalKey,
};
pub use rpc::{ChainTransaction, RawEvent, TransactionDetail};
