//! User service - registration and cascading deletion.
//!
//! Registration creates the user row and their main account in one atomic
//! unit. Deletion is the other balance-sensitive path: a user leaves the
//! system only when their active accounts sum to exactly zero, and the
//! account cascade and the user soft-delete commit together or not at all.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::user::{CreateUserRequest, User},
    services::account_service,
};

const MAX_FIELD_LEN: usize = 255;

fn validate_new_user(req: &CreateUserRequest) -> Result<(), AppError> {
    for (value, field) in [
        (&req.username, "username"),
        (&req.email, "email"),
        (&req.password, "password"),
        (&req.main_account_name, "mainAccountName"),
    ] {
        if value.is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }
        if value.len() > MAX_FIELD_LEN {
            return Err(AppError::Validation(format!(
                "{field} must be at most {MAX_FIELD_LEN} characters"
            )));
        }
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    Ok(())
}

/// Register a user together with their main account.
///
/// A duplicate username or email surfaces as a `Conflict`; the credential
/// is stored opaquely and never returned.
pub async fn create(pool: &DbPool, req: CreateUserRequest) -> Result<User, AppError> {
    validate_new_user(&req)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, password) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&req.username)
    .bind(&req.email)
    .bind(&req.password)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::from_db(e, "username or email already taken"))?;

    let account_id: Uuid = sqlx::query_scalar(
        "INSERT INTO accounts (user_id, is_main) VALUES ($1, TRUE) RETURNING id",
    )
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO account_core_details (account_id, name, balance) VALUES ($1, $2, 0)",
    )
    .bind(account_id)
    .bind(&req.main_account_name)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, main_account_id = %account_id, "user registered");
    Ok(user)
}

/// Get a user by id.
pub async fn get_by_id(
    pool: &DbPool,
    user_id: Uuid,
    include_deleted: bool,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND ($2 OR NOT is_deleted)",
    )
    .bind(user_id)
    .bind(include_deleted)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// List users, newest first.
pub async fn list(pool: &DbPool, include_deleted: bool) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE $1 OR NOT is_deleted ORDER BY created_at DESC",
    )
    .bind(include_deleted)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Soft-delete a user, cascading through all of their accounts.
///
/// Rejected when the user has no active accounts or when the sum of active
/// account balances is not exactly zero. Account rows are locked before the
/// sum is read so a concurrent transaction cannot slip a balance change in
/// between the check and the cascade.
pub async fn delete(pool: &DbPool, user_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let user: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM users WHERE id = $1 AND NOT is_deleted FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    if user.is_none() {
        return Err(AppError::NotFound(format!("user {user_id} not found")));
    }

    let account_ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM accounts WHERE user_id = $1 AND NOT is_deleted ORDER BY id FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;
    if account_ids.is_empty() {
        return Err(AppError::InvariantViolation(
            "user has no active accounts".to_string(),
        ));
    }

    let total: Option<Decimal> = sqlx::query_scalar(
        r#"
        SELECT SUM(cd.balance)
        FROM accounts a
        JOIN account_core_details cd ON cd.account_id = a.id AND NOT cd.is_deleted
        WHERE a.user_id = $1 AND NOT a.is_deleted
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    if let Some(total) = total {
        if total != Decimal::ZERO {
            return Err(AppError::InvariantViolation(format!(
                "user accounts hold a non-zero total balance of {total}"
            )));
        }
    }

    account_service::delete_all_for_user(&mut tx, user_id).await?;

    sqlx::query(
        "UPDATE users SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(%user_id, accounts = account_ids.len(), "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
            main_account_name: "Main Account".to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_registration() {
        assert!(validate_new_user(&request()).is_ok());
    }

    #[test]
    fn rejects_blank_required_fields() {
        for field in ["username", "email", "password"] {
            let mut req = request();
            match field {
                "username" => req.username = String::new(),
                "email" => req.email = String::new(),
                _ => req.password = String::new(),
            }
            let err = validate_new_user(&req).unwrap_err();
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn rejects_malformed_email() {
        let mut req = request();
        req.email = "not-an-email".to_string();
        assert!(matches!(
            validate_new_user(&req),
            Err(AppError::Validation(_))
        ));
    }
}
