//! Data models for the ledger
//!
//! Plain data structures; persistence lives behind [`super::LedgerStore`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::{AccountId, TransactionId, UserId};
use crate::money::Money;

/// Customer account as seen by the transfer engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[schema(value_type = i64)]
    pub id: AccountId,
    #[schema(example = "ACC-0001")]
    pub account_number: String,
    #[schema(value_type = String, example = "100.00")]
    pub balance: Money,
    #[schema(value_type = i64)]
    pub owner_id: UserId,
}

/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRANSFER" => Ok(TransactionType::Transfer),
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// Immutable ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[schema(value_type = i64)]
    pub id: TransactionId,
    #[schema(value_type = String, example = "30.00")]
    pub amount: Money,
    #[schema(value_type = Option<i64>)]
    pub from_account_id: Option<AccountId>,
    #[schema(value_type = Option<i64>)]
    pub to_account_id: Option<AccountId>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub created_at: DateTime<Utc>,
}

/// Ledger row before the store assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub amount: Money,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub kind: TransactionType,
}

impl NewTransaction {
    pub fn transfer(from: AccountId, to: AccountId, amount: Money) -> Self {
        Self {
            amount,
            from_account_id: Some(from),
            to_account_id: Some(to),
            kind: TransactionType::Transfer,
        }
    }
}

/// Write-once mapping from a client key to the transaction it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub key: String,
    pub transaction_id: TransactionId,
    pub created_at: DateTime<Utc>,
}

/// Transaction record joined with both legs' account numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub from_account_number: Option<String>,
    pub to_account_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_roundtrip_names() {
        for kind in [
            TransactionType::Transfer,
            TransactionType::Deposit,
            TransactionType::Withdrawal,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionType>().unwrap(), kind);
        }
        assert!("REFUND".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = TransactionRecord {
            id: 7,
            amount: Money::parse("30").unwrap(),
            from_account_id: Some(1),
            to_account_id: None,
            kind: TransactionType::Transfer,
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fromAccountId"], 1);
        assert!(json["toAccountId"].is_null());
        assert_eq!(json["type"], "TRANSFER");
        assert_eq!(json["amount"], "30.00");
    }

    #[test]
    fn test_history_entry_flattens_record() {
        let entry = HistoryEntry {
            record: TransactionRecord {
                id: 1,
                amount: Money::parse("1").unwrap(),
                from_account_id: Some(1),
                to_account_id: Some(2),
                kind: TransactionType::Transfer,
                created_at: Utc::now(),
            },
            from_account_number: Some("A".into()),
            to_account_number: Some("B".into()),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["toAccountNumber"], "B");
    }
}
