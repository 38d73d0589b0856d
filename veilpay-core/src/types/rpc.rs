//! Wire types returned by the chain reader boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::address::AccountAddress;

/// A transaction summary row from paginated history fetch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainTransaction {
    /// Monotonically increasing chain position.
    pub version: u64,
    pub tx_hash: String,
    pub sender: AccountAddress,
    pub function_name: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// A raw event as reported inside a transaction.
///
/// The payload stays untyped here; the indexer decodes it into a closed
/// event enum and treats unknown type tags explicitly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_index: u64,
    pub type_tag: String,
    pub data: serde_json::Value,
}

/// Full detail of a single transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub version: u64,
    pub tx_hash: String,
    pub success: bool,
    pub sender: AccountAddress,
    pub timestamp: DateTime<Utc>,
    pub events: Vec<RawEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ADDRESS_SIZE;

    #[test]
    fn test_raw_event_json_payload() {
        let event = RawEvent {
            event_index: 3,
            type_tag: "0x1::veil::PaymentEvent".into(),
            data: serde_json::json!({ "amount": "500000" }),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: RawEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_index, 3);
        assert_eq!(back.data["amount"], "500000");
    }

    #[test]
    fn test_transaction_serde() {
        let tx = ChainTransaction {
            version: 99,
            tx_hash: "0xfeed".into(),
            sender: AccountAddress::from_array([9; ADDRESS_SIZE]),
            function_name: "0x1::veil::send_payment".into(),
            success: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&tx).unwrap();
        let back: ChainTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, 99);
    }
}
