//! Transaction service - Core business logic for money movements.
//!
//! This service handles:
//! - Structural validation of transaction requests (pure, no I/O)
//! - Balance validation against locked account rows
//! - Atomic balance updates with balance-before snapshots
//! - Spending-limit enforcement for SPEND transactions
//!
//! # Atomicity Guarantees
//!
//! All balance updates happen within one PostgreSQL transaction. Every
//! internal account touched by a movement is locked `FOR UPDATE`, in
//! ascending id order so two opposite-direction transfers on the same pair
//! of accounts cannot deadlock. A failure at any step rolls the whole unit
//! back: no partial balance update and no orphan transaction row survive.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::account::SpendingLimit,
    models::transaction::{CreateTransactionRequest, DestinationType, SourceType, Transaction},
};

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_IBAN_LEN: usize = 34;
const MAX_NAME_LEN: usize = 255;

/// Structural validation: field presence and bounds per side type, amount
/// positivity, and the self-transfer rule. No I/O; failures here never
/// touch storage.
fn validate_structure(req: &CreateTransactionRequest) -> Result<(), AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    if req.description.is_empty() {
        return Err(AppError::Validation("description is required".to_string()));
    }
    if req.description.len() > MAX_DESCRIPTION_LEN {
        return Err(AppError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    match req.source_type {
        SourceType::Account => {
            if req.source_account_id.is_none() {
                return Err(AppError::Validation(
                    "sourceAccountId is required for an account source".to_string(),
                ));
            }
        }
        SourceType::Iban => {
            let iban = req.source_iban.as_deref().unwrap_or("");
            if iban.is_empty() {
                return Err(AppError::Validation(
                    "sourceIban is required for an IBAN source".to_string(),
                ));
            }
            if iban.len() > MAX_IBAN_LEN {
                return Err(AppError::Validation(format!(
                    "sourceIban must be at most {MAX_IBAN_LEN} characters"
                )));
            }
            check_name(req.source_name.as_deref(), "sourceName")?;
        }
        SourceType::System => check_name(req.source_name.as_deref(), "sourceName")?,
    }

    match req.destination_type {
        DestinationType::Account => {
            if req.destination_account_id.is_none() {
                return Err(AppError::Validation(
                    "destinationAccountId is required for an account destination".to_string(),
                ));
            }
        }
        DestinationType::Iban => {
            let iban = req.destination_iban.as_deref().unwrap_or("");
            if iban.is_empty() {
                return Err(AppError::Validation(
                    "destinationIban is required for an IBAN destination".to_string(),
                ));
            }
            if iban.len() > MAX_IBAN_LEN {
                return Err(AppError::Validation(format!(
                    "destinationIban must be at most {MAX_IBAN_LEN} characters"
                )));
            }
            check_name(req.destination_name.as_deref(), "destinationName")?;
        }
        DestinationType::Spend => check_name(req.destination_name.as_deref(), "destinationName")?,
    }

    if let (Some(source), Some(destination)) = (internal_source(req), internal_destination(req)) {
        if source == destination {
            return Err(AppError::InvariantViolation(
                "source and destination account must differ".to_string(),
            ));
        }
    }

    Ok(())
}

fn check_name(name: Option<&str>, field: &str) -> Result<(), AppError> {
    match name {
        Some(n) if n.len() > MAX_NAME_LEN => Err(AppError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// Internal account id on the source side, if the source is an account.
fn internal_source(req: &CreateTransactionRequest) -> Option<Uuid> {
    match req.source_type {
        SourceType::Account => req.source_account_id,
        _ => None,
    }
}

/// Internal account id on the destination side, if the destination is an
/// account.
fn internal_destination(req: &CreateTransactionRequest) -> Option<Uuid> {
    match req.destination_type {
        DestinationType::Account => req.destination_account_id,
        _ => None,
    }
}

/// Planned balance changes for one movement, computed before anything is
/// written. A `None` side is external (IBAN/SYSTEM/SPEND) and carries no
/// balance.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Movement {
    source_before: Option<Decimal>,
    source_after: Option<Decimal>,
    destination_before: Option<Decimal>,
    destination_after: Option<Decimal>,
}

/// Compute the post-transaction balances. Fails with the available/required
/// pair when the source balance cannot cover the amount, before any
/// mutation is planned.
fn plan_movement(
    source_balance: Option<Decimal>,
    destination_balance: Option<Decimal>,
    amount: Decimal,
) -> Result<Movement, AppError> {
    if let Some(available) = source_balance {
        if available < amount {
            return Err(AppError::InsufficientFunds {
                available,
                required: amount,
            });
        }
    }
    Ok(Movement {
        source_before: source_balance,
        source_after: source_balance.map(|b| b - amount),
        destination_before: destination_balance,
        destination_after: destination_balance.map(|b| b + amount),
    })
}

/// An internal account row held under `FOR UPDATE` for the remainder of the
/// database transaction.
struct LockedAccount {
    id: Uuid,
    balance: Decimal,
}

/// Lock an account row and its core details, returning the current balance.
///
/// `side` labels the error messages ("source"/"destination"). A missing or
/// soft-deleted account and a missing core-details component are both
/// request errors on this path, so they surface as 400s.
async fn lock_account(
    conn: &mut PgConnection,
    account_id: Uuid,
    side: &str,
) -> Result<LockedAccount, AppError> {
    let found: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM accounts WHERE id = $1 AND NOT is_deleted FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut *conn)
            .await?;
    if found.is_none() {
        return Err(AppError::Validation(format!(
            "{side} account {account_id} not found or deleted"
        )));
    }

    let balance: Option<Decimal> = sqlx::query_scalar(
        "SELECT balance FROM account_core_details WHERE account_id = $1 AND NOT is_deleted FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;

    match balance {
        Some(balance) => Ok(LockedAccount {
            id: account_id,
            balance,
        }),
        None => Err(AppError::Validation(format!(
            "{side} account {account_id} has no core details configured"
        ))),
    }
}

/// Enforce the account's spending limit, if one is configured, for a SPEND
/// movement. Rolls the window forward when the period has elapsed and
/// accumulates the running total inside the caller's database transaction.
async fn enforce_spending_limit(
    conn: &mut PgConnection,
    account_id: Uuid,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let limit: Option<SpendingLimit> =
        sqlx::query_as("SELECT * FROM account_spending_limits WHERE account_id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(limit) = limit else {
        return Ok(());
    };

    let expired = limit.window_expired(now);
    let spent_so_far = if expired {
        Decimal::ZERO
    } else {
        limit.current_spent
    };
    let new_spent = spent_so_far + amount;
    if new_spent > limit.limit_amount {
        return Err(AppError::InvariantViolation(format!(
            "spending limit exceeded: this spend would bring the period total to {new_spent} against a limit of {}",
            limit.limit_amount
        )));
    }

    let period_start = if expired { now } else { limit.period_start };
    sqlx::query(
        r#"
        UPDATE account_spending_limits
        SET current_spent = $1,
            period_start = $2,
            updated_at = NOW()
        WHERE account_id = $3
        "#,
    )
    .bind(new_spent)
    .bind(period_start)
    .bind(account_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn write_balance(
    conn: &mut PgConnection,
    account_id: Uuid,
    balance: Decimal,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE account_core_details
        SET balance = $1,
            updated_at = NOW()
        WHERE account_id = $2
        "#,
    )
    .bind(balance)
    .bind(account_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Create a transaction: validate, debit/credit the internal side(s), and
/// persist the audit record — all as one atomic unit.
///
/// # Process
///
/// 1. Structural validation (pure, before any I/O)
/// 2. Start database transaction
/// 3. Lock internal accounts in ascending id order, read balances
/// 4. Plan the movement (funds check, balance-before snapshots)
/// 5. Enforce the spending limit for SPEND destinations
/// 6. Write explicit new balances and insert the transaction row
/// 7. Commit (or roll everything back on error)
///
/// # Errors
///
/// - `Validation`: malformed request, missing/deleted/unconfigured account
/// - `InsufficientFunds`: source balance below amount
/// - `InvariantViolation`: self-transfer, spending limit exceeded
/// - `Database`: storage failure; nothing was persisted
pub async fn create(
    pool: &DbPool,
    req: CreateTransactionRequest,
) -> Result<Transaction, AppError> {
    validate_structure(&req)?;

    let source_id = internal_source(&req);
    let destination_id = internal_destination(&req);

    let mut tx = pool.begin().await?;

    // Stable lock order across concurrent movements on the same accounts.
    let mut to_lock: Vec<(Uuid, &str)> = Vec::new();
    if let Some(id) = source_id {
        to_lock.push((id, "source"));
    }
    if let Some(id) = destination_id {
        to_lock.push((id, "destination"));
    }
    to_lock.sort_by_key(|(id, _)| *id);

    let mut source_account: Option<LockedAccount> = None;
    let mut destination_account: Option<LockedAccount> = None;
    for (id, side) in to_lock {
        let locked = lock_account(&mut tx, id, side).await?;
        if side == "source" {
            source_account = Some(locked);
        } else {
            destination_account = Some(locked);
        }
    }

    let movement = match plan_movement(
        source_account.as_ref().map(|a| a.balance),
        destination_account.as_ref().map(|a| a.balance),
        req.amount,
    ) {
        Ok(movement) => movement,
        Err(err) => {
            tx.rollback().await?;
            return Err(err);
        }
    };

    let now = Utc::now();
    if let Some(source) = &source_account {
        if req.destination_type == DestinationType::Spend {
            enforce_spending_limit(&mut tx, source.id, req.amount, now).await?;
        }
    }

    if let (Some(account), Some(after)) = (&source_account, movement.source_after) {
        write_balance(&mut tx, account.id, after).await?;
    }
    if let (Some(account), Some(after)) = (&destination_account, movement.destination_after) {
        write_balance(&mut tx, account.id, after).await?;
    }

    // Only the fields relevant to each side's type are persisted.
    let (source_iban, source_name) = match req.source_type {
        SourceType::Account => (None, None),
        SourceType::Iban => (req.source_iban.clone(), req.source_name.clone()),
        SourceType::System => (None, req.source_name.clone()),
    };
    let (destination_iban, destination_name) = match req.destination_type {
        DestinationType::Account => (None, None),
        DestinationType::Iban => (req.destination_iban.clone(), req.destination_name.clone()),
        DestinationType::Spend => (None, req.destination_name.clone()),
    };

    let occurred_at = req.timestamp.unwrap_or(now);
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            source_type, source_account_id, source_iban, source_name,
            destination_type, destination_account_id, destination_iban, destination_name,
            amount, description, occurred_at,
            source_account_balance_before, destination_account_balance_before
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(req.source_type)
    .bind(source_id)
    .bind(source_iban)
    .bind(source_name)
    .bind(req.destination_type)
    .bind(destination_id)
    .bind(destination_iban)
    .bind(destination_name)
    .bind(req.amount)
    .bind(&req.description)
    .bind(occurred_at)
    .bind(movement.source_before)
    .bind(movement.destination_before)
    .fetch_one(&mut *tx)
    .await?;

    // Commit all changes atomically. If this fails, everything rolls back.
    tx.commit().await?;

    tracing::info!(
        transaction_id = %transaction.id,
        amount = %transaction.amount,
        "transaction recorded"
    );

    Ok(transaction)
}

/// Get transaction by ID.
pub async fn get_by_id(
    pool: &DbPool,
    transaction_id: Uuid,
) -> Result<Option<Transaction>, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?;
    Ok(transaction)
}

/// List transactions, newest logical timestamp first.
pub async fn list(pool: &DbPool, skip: i64, limit: i64) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        ORDER BY occurred_at DESC, created_at DESC
        OFFSET $1 LIMIT $2
        "#,
    )
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(transactions)
}

/// List transactions touching the given account on either side.
pub async fn list_for_account(
    pool: &DbPool,
    account_id: Uuid,
    skip: i64,
    limit: i64,
) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE source_account_id = $1 OR destination_account_id = $1
        ORDER BY occurred_at DESC, created_at DESC
        OFFSET $2 LIMIT $3
        "#,
    )
    .bind(account_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transfer_request(source: Uuid, destination: Uuid, amount: Decimal) -> CreateTransactionRequest {
        CreateTransactionRequest {
            source_type: SourceType::Account,
            source_account_id: Some(source),
            source_iban: None,
            source_name: None,
            destination_type: DestinationType::Account,
            destination_account_id: Some(destination),
            destination_iban: None,
            destination_name: None,
            amount,
            description: "transfer".to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for amount in [dec!(0), dec!(-1.00)] {
            let err = validate_structure(&transfer_request(a, b, amount)).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(validate_structure(&transfer_request(a, b, dec!(0.01))).is_ok());
    }

    #[test]
    fn rejects_missing_or_oversized_description() {
        let mut req = transfer_request(Uuid::new_v4(), Uuid::new_v4(), dec!(1));
        req.description = String::new();
        assert!(matches!(
            validate_structure(&req),
            Err(AppError::Validation(_))
        ));

        req.description = "x".repeat(501);
        assert!(matches!(
            validate_structure(&req),
            Err(AppError::Validation(_))
        ));

        req.description = "x".repeat(500);
        assert!(validate_structure(&req).is_ok());
    }

    #[test]
    fn account_sides_require_account_ids() {
        let mut req = transfer_request(Uuid::new_v4(), Uuid::new_v4(), dec!(1));
        req.source_account_id = None;
        let err = validate_structure(&req).unwrap_err();
        assert!(err.to_string().contains("sourceAccountId"));

        let mut req = transfer_request(Uuid::new_v4(), Uuid::new_v4(), dec!(1));
        req.destination_account_id = None;
        let err = validate_structure(&req).unwrap_err();
        assert!(err.to_string().contains("destinationAccountId"));
    }

    #[test]
    fn iban_sides_require_bounded_ibans() {
        let mut req = transfer_request(Uuid::new_v4(), Uuid::new_v4(), dec!(1));
        req.destination_type = DestinationType::Iban;
        req.destination_account_id = None;
        let err = validate_structure(&req).unwrap_err();
        assert!(err.to_string().contains("destinationIban"));

        req.destination_iban = Some("X".repeat(35));
        let err = validate_structure(&req).unwrap_err();
        assert!(err.to_string().contains("at most 34"));

        req.destination_iban = Some("NL91ABNA0417164300".to_string());
        assert!(validate_structure(&req).is_ok());
    }

    #[test]
    fn system_to_spend_needs_no_identifiers() {
        let req = CreateTransactionRequest {
            source_type: SourceType::System,
            source_account_id: None,
            source_iban: None,
            source_name: None,
            destination_type: DestinationType::Spend,
            destination_account_id: None,
            destination_iban: None,
            destination_name: None,
            amount: dec!(5.00),
            description: "adjustment".to_string(),
            timestamp: None,
        };
        assert!(validate_structure(&req).is_ok());
    }

    #[test]
    fn counterparty_names_are_bounded() {
        let mut req = transfer_request(Uuid::new_v4(), Uuid::new_v4(), dec!(1));
        req.destination_type = DestinationType::Spend;
        req.destination_account_id = None;
        req.destination_name = Some("n".repeat(256));
        let err = validate_structure(&req).unwrap_err();
        assert!(err.to_string().contains("destinationName"));
    }

    #[test]
    fn self_transfer_is_rejected_regardless_of_amount() {
        let id = Uuid::new_v4();
        for amount in [dec!(0.01), dec!(1000000)] {
            let err = validate_structure(&transfer_request(id, id, amount)).unwrap_err();
            assert!(matches!(err, AppError::InvariantViolation(_)));
        }
    }

    #[test]
    fn transfer_moves_exactly_the_amount() {
        // Scenario A: 100.00 / 0.00, transfer 50.00.
        let movement = plan_movement(Some(dec!(100.00)), Some(dec!(0.00)), dec!(50.00)).unwrap();
        assert_eq!(movement.source_before, Some(dec!(100.00)));
        assert_eq!(movement.source_after, Some(dec!(50.00)));
        assert_eq!(movement.destination_before, Some(dec!(0.00)));
        assert_eq!(movement.destination_after, Some(dec!(50.00)));

        // Conservation: source delta equals destination delta.
        let source_delta = movement.source_before.unwrap() - movement.source_after.unwrap();
        let destination_delta =
            movement.destination_after.unwrap() - movement.destination_before.unwrap();
        assert_eq!(source_delta, destination_delta);
    }

    #[test]
    fn insufficient_funds_carries_both_amounts() {
        // Scenario B: balance 20.00, transfer 50.00.
        let err = plan_movement(Some(dec!(20.00)), Some(dec!(0.00)), dec!(50.00)).unwrap_err();
        match err {
            AppError::InsufficientFunds {
                available,
                required,
            } => {
                assert_eq!(available, dec!(20.00));
                assert_eq!(required, dec!(50.00));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn debit_to_exactly_zero_is_allowed() {
        // Scenario C: spending the full balance leaves exactly zero.
        let movement = plan_movement(Some(dec!(100.00)), None, dec!(100.00)).unwrap();
        assert_eq!(movement.source_after, Some(dec!(0.00)));
        assert_eq!(movement.destination_after, None);
    }

    #[test]
    fn decimal_arithmetic_is_exact_to_the_cent() {
        // Scenario D: no float drift.
        let movement = plan_movement(Some(dec!(100.00)), None, dec!(0.01)).unwrap();
        assert_eq!(movement.source_after, Some(dec!(99.99)));

        let movement = plan_movement(Some(dec!(123.45)), None, dec!(12.34)).unwrap();
        assert_eq!(movement.source_after, Some(dec!(111.11)));
    }

    #[test]
    fn external_source_skips_the_funds_check() {
        // SYSTEM/IBAN sources carry no balance; any amount passes.
        let movement = plan_movement(None, Some(dec!(3.00)), dec!(1000000.00)).unwrap();
        assert_eq!(movement.source_before, None);
        assert_eq!(movement.source_after, None);
        assert_eq!(movement.destination_after, Some(dec!(1000003.00)));
    }

    #[test]
    fn persisted_fields_match_side_type() {
        let mut req = transfer_request(Uuid::new_v4(), Uuid::new_v4(), dec!(1));
        req.source_type = SourceType::Iban;
        req.source_account_id = None;
        req.source_iban = Some("DE89370400440532013000".to_string());
        assert_eq!(internal_source(&req), None);

        req.source_type = SourceType::Account;
        req.source_account_id = Some(Uuid::new_v4());
        assert_eq!(internal_source(&req), req.source_account_id);
        assert_eq!(internal_destination(&req), req.destination_account_id);
    }
}
