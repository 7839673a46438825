//! Transaction data models and API request/response types.
//!
//! A transaction row is an immutable audit record of one money movement.
//! The balance-before snapshots are denormalized onto the row so every
//! movement is auditable on its own, without replaying history — which is
//! also why the account foreign keys are RESTRICT rather than cascade.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the money comes from.
///
/// Serializes as an integer per the wire contract:
/// 0 = ACCOUNT (internal), 1 = IBAN (external party), 2 = SYSTEM
/// (administrative credit originating outside any tracked account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "u8", into = "u8")]
#[repr(i16)]
pub enum SourceType {
    Account = 0,
    Iban = 1,
    System = 2,
}

impl TryFrom<u8> for SourceType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SourceType::Account),
            1 => Ok(SourceType::Iban),
            2 => Ok(SourceType::System),
            other => Err(format!("invalid source type: {other}")),
        }
    }
}

impl From<SourceType> for u8 {
    fn from(value: SourceType) -> Self {
        value as u8
    }
}

/// Where the money goes.
///
/// 0 = ACCOUNT (internal), 1 = IBAN (external party), 2 = SPEND (money
/// leaving the system as a purchase, with no counterparty account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "u8", into = "u8")]
#[repr(i16)]
pub enum DestinationType {
    Account = 0,
    Iban = 1,
    Spend = 2,
}

impl TryFrom<u8> for DestinationType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DestinationType::Account),
            1 => Ok(DestinationType::Iban),
            2 => Ok(DestinationType::Spend),
            other => Err(format!("invalid destination type: {other}")),
        }
    }
}

impl From<DestinationType> for u8 {
    fn from(value: DestinationType) -> Self {
        value as u8
    }
}

/// Represents a transaction record from the database.
///
/// Only the fields relevant to each side's type are populated: an ACCOUNT
/// side carries the account id, an IBAN side the iban plus optional
/// counterparty name, a SYSTEM/SPEND side at most a name. The
/// balance-before columns are set only for internal (ACCOUNT) sides.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub source_type: SourceType,
    pub source_account_id: Option<Uuid>,
    pub source_iban: Option<String>,
    pub source_name: Option<String>,
    pub destination_type: DestinationType,
    pub destination_account_id: Option<Uuid>,
    pub destination_iban: Option<String>,
    pub destination_name: Option<String>,
    pub amount: Decimal,
    pub description: String,

    /// Logical timestamp of the movement. Defaults to the processing time
    /// but may be supplied by the caller (e.g. back-dated imports).
    pub occurred_at: DateTime<Utc>,

    pub source_account_balance_before: Option<Decimal>,
    pub destination_account_balance_before: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a transaction.
///
/// # JSON Example
///
/// ```json
/// {
///   "sourceType": 0,
///   "sourceAccountId": "550e8400-e29b-41d4-a716-446655440000",
///   "destinationType": 2,
///   "destinationName": "Grocery store",
///   "amount": "12.34",
///   "description": "Weekly groceries"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub source_type: SourceType,
    #[serde(default)]
    pub source_account_id: Option<Uuid>,
    #[serde(default)]
    pub source_iban: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,

    pub destination_type: DestinationType,
    #[serde(default)]
    pub destination_account_id: Option<Uuid>,
    #[serde(default)]
    pub destination_iban: Option<String>,
    #[serde(default)]
    pub destination_name: Option<String>,

    pub amount: Decimal,
    pub description: String,

    /// Optional logical timestamp; defaults to "now" when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Response body for transaction endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    pub source_type: SourceType,
    pub source_account_id: Option<Uuid>,
    pub source_iban: Option<String>,
    pub source_name: Option<String>,
    pub destination_type: DestinationType,
    pub destination_account_id: Option<Uuid>,
    pub destination_iban: Option<String>,
    pub destination_name: Option<String>,
    pub amount: Decimal,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub source_account_balance_before: Option<Decimal>,
    pub destination_account_balance_before: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            source_type: transaction.source_type,
            source_account_id: transaction.source_account_id,
            source_iban: transaction.source_iban,
            source_name: transaction.source_name,
            destination_type: transaction.destination_type,
            destination_account_id: transaction.destination_account_id,
            destination_iban: transaction.destination_iban,
            destination_name: transaction.destination_name,
            amount: transaction.amount,
            description: transaction.description,
            timestamp: transaction.occurred_at,
            source_account_balance_before: transaction.source_account_balance_before,
            destination_account_balance_before: transaction.destination_account_balance_before,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn party_type_integers_follow_wire_contract() {
        assert_eq!(SourceType::try_from(0).unwrap(), SourceType::Account);
        assert_eq!(SourceType::try_from(1).unwrap(), SourceType::Iban);
        assert_eq!(SourceType::try_from(2).unwrap(), SourceType::System);
        assert!(SourceType::try_from(3).is_err());

        assert_eq!(DestinationType::try_from(0).unwrap(), DestinationType::Account);
        assert_eq!(DestinationType::try_from(1).unwrap(), DestinationType::Iban);
        assert_eq!(DestinationType::try_from(2).unwrap(), DestinationType::Spend);
        assert!(DestinationType::try_from(3).is_err());
    }

    #[test]
    fn create_request_parses_camel_case_with_integer_types() {
        let req: CreateTransactionRequest = serde_json::from_str(
            r#"{
                "sourceType": 0,
                "sourceAccountId": "550e8400-e29b-41d4-a716-446655440000",
                "destinationType": 1,
                "destinationIban": "NL91ABNA0417164300",
                "destinationName": "Landlord",
                "amount": "750.00",
                "description": "Rent"
            }"#,
        )
        .unwrap();

        assert_eq!(req.source_type, SourceType::Account);
        assert_eq!(req.destination_type, DestinationType::Iban);
        assert_eq!(req.amount, dec!(750.00));
        assert!(req.timestamp.is_none());
        assert_eq!(req.destination_iban.as_deref(), Some("NL91ABNA0417164300"));
    }

    #[test]
    fn create_request_rejects_unknown_type_integer() {
        let err = serde_json::from_str::<CreateTransactionRequest>(
            r#"{
                "sourceType": 7,
                "destinationType": 2,
                "amount": "1.00",
                "description": "x"
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid source type"));
    }

    #[test]
    fn response_exposes_occurred_at_as_timestamp() {
        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::nil(),
            source_type: SourceType::System,
            source_account_id: None,
            source_iban: None,
            source_name: Some("Promo".into()),
            destination_type: DestinationType::Account,
            destination_account_id: Some(Uuid::nil()),
            destination_iban: None,
            destination_name: None,
            amount: dec!(10.00),
            description: "Signup bonus".into(),
            occurred_at: now,
            source_account_balance_before: None,
            destination_account_balance_before: Some(dec!(0.00)),
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(TransactionResponse::from(tx)).unwrap();
        assert!(value.get("timestamp").is_some());
        assert!(value.get("occurredAt").is_none());
        assert_eq!(value["sourceType"], 2);
        assert_eq!(value["destinationAccountBalanceBefore"], "0.00");
    }
}
