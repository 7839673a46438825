//! Account data models: the account row, its optional 1:1 components, and
//! the deletion policy attached to each component kind.
//!
//! The account itself is just a container. All money lives on the
//! core-details component, whose `balance` column is the authoritative
//! value and is written only by the transaction executor (and once at
//! creation). Balances use `rust_decimal::Decimal` throughout; money never
//! touches a float.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an account record from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,

    /// Owning user. The foreign key is RESTRICT so users are never hard
    /// deleted out from under their accounts.
    pub user_id: Uuid,

    /// At most one non-deleted main account exists per user (enforced by a
    /// partial unique index). Main accounts cannot be edited or deleted.
    pub is_main: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Mandatory 1:1 component: display name and current balance.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CoreDetails {
    pub account_id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Optional 1:1 component: external-facing IBAN identity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActiveDetails {
    pub account_id: Uuid,
    pub iban: String,
    pub activated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Timeframe of a periodic spending cap.
///
/// Serializes as an integer (0=daily, 1=weekly, 2=monthly, 3=yearly) and is
/// stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "u8", into = "u8")]
#[repr(i16)]
pub enum LimitTimeframe {
    Daily = 0,
    Weekly = 1,
    Monthly = 2,
    Yearly = 3,
}

impl LimitTimeframe {
    /// Length of one limit window. Monthly and yearly windows are fixed
    /// 30/365-day durations, not calendar months.
    pub fn period(self) -> chrono::Duration {
        match self {
            LimitTimeframe::Daily => chrono::Duration::days(1),
            LimitTimeframe::Weekly => chrono::Duration::weeks(1),
            LimitTimeframe::Monthly => chrono::Duration::days(30),
            LimitTimeframe::Yearly => chrono::Duration::days(365),
        }
    }
}

impl TryFrom<u8> for LimitTimeframe {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LimitTimeframe::Daily),
            1 => Ok(LimitTimeframe::Weekly),
            2 => Ok(LimitTimeframe::Monthly),
            3 => Ok(LimitTimeframe::Yearly),
            other => Err(format!("invalid timeframe: {other}")),
        }
    }
}

impl From<LimitTimeframe> for u8 {
    fn from(value: LimitTimeframe) -> Self {
        value as u8
    }
}

/// Optional 1:1 component: periodic spending cap with a running total.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpendingLimit {
    pub account_id: Uuid,
    pub limit_amount: Decimal,
    pub timeframe: LimitTimeframe,
    pub current_spent: Decimal,
    pub period_start: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpendingLimit {
    /// True when the current window has elapsed and the running total must
    /// reset before the next spend is counted.
    pub fn window_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.period_start >= self.timeframe.period()
    }
}

/// Optional 1:1 component: informational saving target.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavingGoal {
    pub account_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a component kind is removed when its account is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Flag the row and keep it (history-bearing components).
    Soft,
    /// Drop the row outright (purely configurational components).
    Hard,
}

/// The four optional/mandatory component kinds an account can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    CoreDetails,
    ActiveDetails,
    SpendingLimit,
    SavingGoal,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::CoreDetails,
        ComponentKind::ActiveDetails,
        ComponentKind::SpendingLimit,
        ComponentKind::SavingGoal,
    ];

    /// Table holding this component kind.
    pub fn table(self) -> &'static str {
        match self {
            ComponentKind::CoreDetails => "account_core_details",
            ComponentKind::ActiveDetails => "account_active_details",
            ComponentKind::SpendingLimit => "account_spending_limits",
            ComponentKind::SavingGoal => "account_saving_goals",
        }
    }

    /// Core details and active details carry history (balance snapshots
    /// reference them, IBANs identify past counterparties) and are kept;
    /// limits and goals are configuration and are dropped.
    pub fn deletion_policy(self) -> DeletionPolicy {
        match self {
            ComponentKind::CoreDetails | ComponentKind::ActiveDetails => DeletionPolicy::Soft,
            ComponentKind::SpendingLimit | ComponentKind::SavingGoal => DeletionPolicy::Hard,
        }
    }
}

/// Core-details block of a create request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreDetailsInput {
    pub name: String,

    /// Opening balance. Accepted at creation only; afterwards the balance
    /// changes exclusively through transactions.
    #[serde(default)]
    pub balance: Decimal,
}

/// Active-account block of a create request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDetailsInput {
    pub iban: String,
}

/// Spending-limit block of a create or update request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingLimitInput {
    pub limit_amount: Decimal,
    pub timeframe: LimitTimeframe,
}

/// Saving-goal block of a create or update request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingGoalInput {
    pub name: String,
    pub target_amount: Decimal,
}

/// Request body for creating an account.
///
/// # JSON Example
///
/// ```json
/// {
///   "userId": "550e8400-e29b-41d4-a716-446655440000",
///   "isMain": false,
///   "coreDetails": { "name": "Holiday fund", "balance": "0" },
///   "activeAccount": { "iban": "NL91ABNA0417164300" },
///   "spendingLimit": { "limitAmount": "200.00", "timeframe": 2 },
///   "savingGoal": { "name": "Trip", "targetAmount": "1500.00" }
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub user_id: Uuid,

    #[serde(default)]
    pub is_main: bool,

    pub core_details: CoreDetailsInput,

    #[serde(default)]
    pub active_account: Option<ActiveDetailsInput>,

    #[serde(default)]
    pub spending_limit: Option<SpendingLimitInput>,

    #[serde(default)]
    pub saving_goal: Option<SavingGoalInput>,
}

/// Request body for updating an account.
///
/// Main accounts reject every update. The balance is not updatable here at
/// all; there is deliberately no field for it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub is_main: Option<bool>,

    #[serde(default)]
    pub core_details: Option<CoreDetailsUpdate>,

    #[serde(default)]
    pub spending_limit: Option<SpendingLimitInput>,

    #[serde(default)]
    pub saving_goal: Option<SavingGoalInput>,
}

/// Updatable part of the core details. The balance is absent on purpose.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreDetailsUpdate {
    pub name: String,
}

/// An account with its components resolved, as loaded by the services.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub account: Account,
    pub core_details: Option<CoreDetails>,
    pub active_account: Option<ActiveDetails>,
    pub spending_limit: Option<SpendingLimit>,
    pub saving_goal: Option<SavingGoal>,
}

/// Response body for account endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_main: bool,
    pub core_details: Option<CoreDetailsResponse>,
    pub active_account: Option<ActiveDetailsResponse>,
    pub spending_limit: Option<SpendingLimitResponse>,
    pub saving_goal: Option<SavingGoalResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreDetailsResponse {
    pub name: String,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDetailsResponse {
    pub iban: String,
    pub activated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingLimitResponse {
    pub limit_amount: Decimal,
    pub timeframe: LimitTimeframe,
    pub current_spent: Decimal,
    pub period_start: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingGoalResponse {
    pub name: String,
    pub target_amount: Decimal,
}

impl From<AccountRecord> for AccountResponse {
    fn from(record: AccountRecord) -> Self {
        Self {
            id: record.account.id,
            user_id: record.account.user_id,
            is_main: record.account.is_main,
            core_details: record.core_details.map(|cd| CoreDetailsResponse {
                name: cd.name,
                balance: cd.balance,
            }),
            active_account: record.active_account.map(|aa| ActiveDetailsResponse {
                iban: aa.iban,
                activated_at: aa.activated_at,
            }),
            spending_limit: record.spending_limit.map(|sl| SpendingLimitResponse {
                limit_amount: sl.limit_amount,
                timeframe: sl.timeframe,
                current_spent: sl.current_spent,
                period_start: sl.period_start,
            }),
            saving_goal: record.saving_goal.map(|sg| SavingGoalResponse {
                name: sg.name,
                target_amount: sg.target_amount,
            }),
            created_at: record.account.created_at,
            updated_at: record.account.updated_at,
            is_deleted: record.account.is_deleted,
            deleted_at: record.account.deleted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deletion_policy_is_asymmetric() {
        assert_eq!(
            ComponentKind::CoreDetails.deletion_policy(),
            DeletionPolicy::Soft
        );
        assert_eq!(
            ComponentKind::ActiveDetails.deletion_policy(),
            DeletionPolicy::Soft
        );
        assert_eq!(
            ComponentKind::SpendingLimit.deletion_policy(),
            DeletionPolicy::Hard
        );
        assert_eq!(
            ComponentKind::SavingGoal.deletion_policy(),
            DeletionPolicy::Hard
        );
    }

    #[test]
    fn component_tables_are_distinct() {
        let mut tables: Vec<_> = ComponentKind::ALL.iter().map(|k| k.table()).collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), ComponentKind::ALL.len());
    }

    #[test]
    fn timeframe_wire_codec_round_trips() {
        for (n, tf) in [
            (0u8, LimitTimeframe::Daily),
            (1, LimitTimeframe::Weekly),
            (2, LimitTimeframe::Monthly),
            (3, LimitTimeframe::Yearly),
        ] {
            assert_eq!(LimitTimeframe::try_from(n).unwrap(), tf);
            assert_eq!(u8::from(tf), n);
        }
        assert!(LimitTimeframe::try_from(4).is_err());
    }

    fn limit_starting_at(start: DateTime<Utc>, timeframe: LimitTimeframe) -> SpendingLimit {
        SpendingLimit {
            account_id: Uuid::nil(),
            limit_amount: dec!(100),
            timeframe,
            current_spent: dec!(0),
            period_start: start,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn daily_window_expires_after_one_day() {
        let start = Utc::now();
        let limit = limit_starting_at(start, LimitTimeframe::Daily);
        assert!(!limit.window_expired(start + chrono::Duration::hours(23)));
        assert!(limit.window_expired(start + chrono::Duration::hours(24)));
    }

    #[test]
    fn yearly_window_spans_365_days() {
        let start = Utc::now();
        let limit = limit_starting_at(start, LimitTimeframe::Yearly);
        assert!(!limit.window_expired(start + chrono::Duration::days(364)));
        assert!(limit.window_expired(start + chrono::Duration::days(365)));
    }
}
