//! Account service - creation, update, and deletion lifecycle rules.
//!
//! Deletion is the balance-sensitive path here: an account leaves the
//! system only with an exactly-zero balance, never while it is the user's
//! main account, and its components are removed according to the deletion
//! policy tagged on each component kind. The delete-all-accounts routine is
//! shared with the user-deletion flow and runs on the caller's database
//! transaction, so a partial cascade can never be observed.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::account::{
        Account, AccountRecord, ActiveDetails, ComponentKind, CoreDetails, CreateAccountRequest,
        DeletionPolicy, SavingGoal, SpendingLimit, UpdateAccountRequest,
    },
};

const MAX_NAME_LEN: usize = 255;
const MAX_IBAN_LEN: usize = 34;

/// Structural validation of a create request. No I/O.
fn validate_new_account(req: &CreateAccountRequest) -> Result<(), AppError> {
    if req.core_details.name.is_empty() {
        return Err(AppError::Validation(
            "coreDetails.name is required".to_string(),
        ));
    }
    if req.core_details.name.len() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "coreDetails.name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if req.core_details.balance < Decimal::ZERO {
        return Err(AppError::Validation(
            "opening balance cannot be negative".to_string(),
        ));
    }
    if let Some(active) = &req.active_account {
        if active.iban.is_empty() || active.iban.len() > MAX_IBAN_LEN {
            return Err(AppError::Validation(format!(
                "activeAccount.iban must be between 1 and {MAX_IBAN_LEN} characters"
            )));
        }
    }
    if let Some(limit) = &req.spending_limit {
        if limit.limit_amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "spendingLimit.limitAmount must be greater than zero".to_string(),
            ));
        }
    }
    if let Some(goal) = &req.saving_goal {
        if goal.name.is_empty() || goal.name.len() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "savingGoal.name must be between 1 and {MAX_NAME_LEN} characters"
            )));
        }
        if goal.target_amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "savingGoal.targetAmount must be greater than zero".to_string(),
            ));
        }
    }
    Ok(())
}

/// Create an account with its components.
///
/// The owning user must exist and not be deleted; a second main account for
/// the same user is rejected (also backed by a partial unique index, so a
/// concurrent race surfaces as the same invariant error).
pub async fn create(pool: &DbPool, req: CreateAccountRequest) -> Result<AccountRecord, AppError> {
    validate_new_account(&req)?;

    let mut tx = pool.begin().await?;

    let user: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM users WHERE id = $1 AND NOT is_deleted FOR UPDATE")
            .bind(req.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    if user.is_none() {
        return Err(AppError::Validation(format!(
            "user {} not found or deleted",
            req.user_id
        )));
    }

    if req.is_main {
        let has_main: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE user_id = $1 AND is_main AND NOT is_deleted)",
        )
        .bind(req.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if has_main {
            return Err(AppError::InvariantViolation(
                "user already has a main account".to_string(),
            ));
        }
    }

    let account = sqlx::query_as::<_, Account>(
        "INSERT INTO accounts (user_id, is_main) VALUES ($1, $2) RETURNING *",
    )
    .bind(req.user_id)
    .bind(req.is_main)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::from_db(e, "user already has a main account"))?;

    let core_details = sqlx::query_as::<_, CoreDetails>(
        "INSERT INTO account_core_details (account_id, name, balance) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(account.id)
    .bind(&req.core_details.name)
    .bind(req.core_details.balance)
    .fetch_one(&mut *tx)
    .await?;

    let active_account = match &req.active_account {
        Some(input) => Some(
            sqlx::query_as::<_, ActiveDetails>(
                "INSERT INTO account_active_details (account_id, iban) VALUES ($1, $2) RETURNING *",
            )
            .bind(account.id)
            .bind(&input.iban)
            .fetch_one(&mut *tx)
            .await?,
        ),
        None => None,
    };

    let spending_limit = match &req.spending_limit {
        Some(input) => Some(
            sqlx::query_as::<_, SpendingLimit>(
                r#"
                INSERT INTO account_spending_limits (account_id, limit_amount, timeframe)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(account.id)
            .bind(input.limit_amount)
            .bind(input.timeframe)
            .fetch_one(&mut *tx)
            .await?,
        ),
        None => None,
    };

    let saving_goal = match &req.saving_goal {
        Some(input) => Some(
            sqlx::query_as::<_, SavingGoal>(
                r#"
                INSERT INTO account_saving_goals (account_id, name, target_amount)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(account.id)
            .bind(&input.name)
            .bind(input.target_amount)
            .fetch_one(&mut *tx)
            .await?,
        ),
        None => None,
    };

    tx.commit().await?;

    Ok(AccountRecord {
        account,
        core_details: Some(core_details),
        active_account,
        spending_limit,
        saving_goal,
    })
}

/// Load an account's components. `include_deleted` threads the explicit
/// soft-delete visibility flag through the reads; the hard-deletable
/// components have no flag to filter on.
async fn load_components(
    conn: &mut PgConnection,
    account: Account,
    include_deleted: bool,
) -> Result<AccountRecord, AppError> {
    let core_details: Option<CoreDetails> = sqlx::query_as(
        "SELECT * FROM account_core_details WHERE account_id = $1 AND ($2 OR NOT is_deleted)",
    )
    .bind(account.id)
    .bind(include_deleted)
    .fetch_optional(&mut *conn)
    .await?;

    let active_account: Option<ActiveDetails> = sqlx::query_as(
        "SELECT * FROM account_active_details WHERE account_id = $1 AND ($2 OR NOT is_deleted)",
    )
    .bind(account.id)
    .bind(include_deleted)
    .fetch_optional(&mut *conn)
    .await?;

    let spending_limit: Option<SpendingLimit> =
        sqlx::query_as("SELECT * FROM account_spending_limits WHERE account_id = $1")
            .bind(account.id)
            .fetch_optional(&mut *conn)
            .await?;

    let saving_goal: Option<SavingGoal> =
        sqlx::query_as("SELECT * FROM account_saving_goals WHERE account_id = $1")
            .bind(account.id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(AccountRecord {
        account,
        core_details,
        active_account,
        spending_limit,
        saving_goal,
    })
}

/// Get an account with its components.
pub async fn get_by_id(
    pool: &DbPool,
    account_id: Uuid,
    include_deleted: bool,
) -> Result<Option<AccountRecord>, AppError> {
    let mut conn = pool.acquire().await?;
    let account: Option<Account> =
        sqlx::query_as("SELECT * FROM accounts WHERE id = $1 AND ($2 OR NOT is_deleted)")
            .bind(account_id)
            .bind(include_deleted)
            .fetch_optional(&mut *conn)
            .await?;
    match account {
        Some(account) => Ok(Some(
            load_components(&mut conn, account, include_deleted).await?,
        )),
        None => Ok(None),
    }
}

/// List accounts with their components, newest first.
pub async fn list(pool: &DbPool, include_deleted: bool) -> Result<Vec<AccountRecord>, AppError> {
    let mut conn = pool.acquire().await?;
    let accounts: Vec<Account> =
        sqlx::query_as("SELECT * FROM accounts WHERE $1 OR NOT is_deleted ORDER BY created_at DESC")
            .bind(include_deleted)
            .fetch_all(&mut *conn)
            .await?;

    let mut records = Vec::with_capacity(accounts.len());
    for account in accounts {
        records.push(load_components(&mut conn, account, include_deleted).await?);
    }
    Ok(records)
}

/// Update an account.
///
/// Main accounts are immutable and reject every update. The balance is
/// never updatable here; `isMain` may only be set when the user has no
/// other main account.
pub async fn update(
    pool: &DbPool,
    account_id: Uuid,
    req: UpdateAccountRequest,
) -> Result<AccountRecord, AppError> {
    let mut tx = pool.begin().await?;

    let account: Account =
        sqlx::query_as("SELECT * FROM accounts WHERE id = $1 AND NOT is_deleted FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {account_id} not found")))?;

    if account.is_main {
        return Err(AppError::InvariantViolation(
            "main accounts cannot be edited".to_string(),
        ));
    }

    if req.is_main == Some(true) {
        let has_main: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE user_id = $1 AND is_main AND NOT is_deleted)",
        )
        .bind(account.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if has_main {
            return Err(AppError::InvariantViolation(
                "user already has a main account".to_string(),
            ));
        }
        sqlx::query("UPDATE accounts SET is_main = TRUE WHERE id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_db(e, "user already has a main account"))?;
    }

    if let Some(core) = &req.core_details {
        if core.name.is_empty() || core.name.len() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "coreDetails.name must be between 1 and {MAX_NAME_LEN} characters"
            )));
        }
        sqlx::query(
            r#"
            UPDATE account_core_details
            SET name = $1, updated_at = NOW()
            WHERE account_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(&core.name)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(limit) = &req.spending_limit {
        if limit.limit_amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "spendingLimit.limitAmount must be greater than zero".to_string(),
            ));
        }
        // Replacing a limit restarts its window.
        sqlx::query(
            r#"
            INSERT INTO account_spending_limits (account_id, limit_amount, timeframe)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id) DO UPDATE
            SET limit_amount = EXCLUDED.limit_amount,
                timeframe = EXCLUDED.timeframe,
                current_spent = 0,
                period_start = NOW(),
                updated_at = NOW()
            "#,
        )
        .bind(account_id)
        .bind(limit.limit_amount)
        .bind(limit.timeframe)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(goal) = &req.saving_goal {
        if goal.name.is_empty() || goal.target_amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "savingGoal requires a name and a positive targetAmount".to_string(),
            ));
        }
        sqlx::query(
            r#"
            INSERT INTO account_saving_goals (account_id, name, target_amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id) DO UPDATE
            SET name = EXCLUDED.name,
                target_amount = EXCLUDED.target_amount,
                updated_at = NOW()
            "#,
        )
        .bind(account_id)
        .bind(&goal.name)
        .bind(goal.target_amount)
        .execute(&mut *tx)
        .await?;
    }

    let account: Account = sqlx::query_as(
        "UPDATE accounts SET updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(account_id)
    .fetch_one(&mut *tx)
    .await?;

    let record = load_components(&mut tx, account, false).await?;
    tx.commit().await?;
    Ok(record)
}

/// Remove an account's components according to each kind's deletion policy.
///
/// Runs on the caller's connection so the cascade shares the caller's
/// database transaction.
async fn remove_components(conn: &mut PgConnection, account_id: Uuid) -> Result<(), AppError> {
    for kind in ComponentKind::ALL {
        let sql = match kind.deletion_policy() {
            DeletionPolicy::Soft => format!(
                "UPDATE {} SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
                 WHERE account_id = $1 AND NOT is_deleted",
                kind.table()
            ),
            DeletionPolicy::Hard => format!("DELETE FROM {} WHERE account_id = $1", kind.table()),
        };
        sqlx::query(&sql).bind(account_id).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Soft-delete a single account.
///
/// Rejected for main accounts and for any balance other than exactly zero.
/// An already-deleted account is a 404.
pub async fn delete(pool: &DbPool, account_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let account: Account = sqlx::query_as("SELECT * FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {account_id} not found")))?;

    if account.is_deleted {
        return Err(AppError::NotFound(format!(
            "account {account_id} already deleted"
        )));
    }
    if account.is_main {
        return Err(AppError::InvariantViolation(
            "main account cannot be deleted".to_string(),
        ));
    }

    let balance: Option<Decimal> = sqlx::query_scalar(
        "SELECT balance FROM account_core_details WHERE account_id = $1 AND NOT is_deleted FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(balance) = balance {
        if balance != Decimal::ZERO {
            return Err(AppError::InvariantViolation(format!(
                "account balance must be exactly zero to delete, current balance is {balance}"
            )));
        }
    }

    remove_components(&mut tx, account_id).await?;
    sqlx::query(
        "UPDATE accounts SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(account_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(%account_id, "account deleted");
    Ok(())
}

/// Soft-delete every active account of a user, components included, on the
/// caller's database transaction.
///
/// Invoked by the user-deletion flow; balance checks are the caller's
/// responsibility. Fails when the user has no active accounts, which keeps
/// a cascading user delete honest about what it removed.
pub async fn delete_all_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<(), AppError> {
    let account_ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM accounts WHERE user_id = $1 AND NOT is_deleted ORDER BY id FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    if account_ids.is_empty() {
        return Err(AppError::InvariantViolation(
            "user has no active accounts".to_string(),
        ));
    }

    for account_id in &account_ids {
        remove_components(&mut *conn, *account_id).await?;
    }

    sqlx::query(
        r#"
        UPDATE accounts
        SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
        WHERE user_id = $1 AND NOT is_deleted
        "#,
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::{CoreDetailsInput, LimitTimeframe, SpendingLimitInput};
    use rust_decimal_macros::dec;

    fn minimal_request() -> CreateAccountRequest {
        CreateAccountRequest {
            user_id: Uuid::new_v4(),
            is_main: false,
            core_details: CoreDetailsInput {
                name: "Everyday".to_string(),
                balance: dec!(0),
            },
            active_account: None,
            spending_limit: None,
            saving_goal: None,
        }
    }

    #[test]
    fn accepts_minimal_account() {
        assert!(validate_new_account(&minimal_request()).is_ok());
    }

    #[test]
    fn rejects_negative_opening_balance() {
        let mut req = minimal_request();
        req.core_details.balance = dec!(-0.01);
        assert!(matches!(
            validate_new_account(&req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_empty_or_oversized_core_name() {
        let mut req = minimal_request();
        req.core_details.name = String::new();
        assert!(validate_new_account(&req).is_err());

        req.core_details.name = "n".repeat(256);
        assert!(validate_new_account(&req).is_err());
    }

    #[test]
    fn rejects_non_positive_spending_limit() {
        let mut req = minimal_request();
        req.spending_limit = Some(SpendingLimitInput {
            limit_amount: dec!(0),
            timeframe: LimitTimeframe::Monthly,
        });
        assert!(matches!(
            validate_new_account(&req),
            Err(AppError::Validation(_))
        ));
    }
}
