//! Account management HTTP handlers.
//!
//! - POST /account - Create an account with its components
//! - GET /account - List accounts (optional `include_deleted`)
//! - GET /account/{id} - Get one account
//! - PUT /account/{id} - Update (rejected for main accounts)
//! - DELETE /account/{id} - Soft-delete (zero balance, non-main only)

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    handlers::Visibility,
    models::account::{AccountResponse, CreateAccountRequest, UpdateAccountRequest},
    services::account_service,
};

/// Create a new account.
///
/// 400 when the owning user is missing or deleted, or when a second main
/// account is requested.
pub async fn create_account(
    State(pool): State<DbPool>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let record = account_service::create(&pool, request).await?;
    Ok(Json(record.into()))
}

/// List accounts with their components, newest first.
pub async fn list_accounts(
    State(pool): State<DbPool>,
    Query(visibility): Query<Visibility>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let records = account_service::list(&pool, visibility.include_deleted).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Get a specific account by ID.
pub async fn get_account(
    State(pool): State<DbPool>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let record = account_service::get_by_id(&pool, account_id, false)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {account_id} not found")))?;
    Ok(Json(record.into()))
}

/// Update an account. Main accounts are immutable; the balance is never
/// updatable through this endpoint.
pub async fn update_account(
    State(pool): State<DbPool>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let record = account_service::update(&pool, account_id, request).await?;
    Ok(Json(record.into()))
}

/// Soft-delete an account.
///
/// 400 for main accounts or a non-zero balance; 404 when the account does
/// not exist or is already deleted.
pub async fn delete_account(
    State(pool): State<DbPool>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    account_service::delete(&pool, account_id).await?;
    Ok(Json(serde_json::json!({ "deleted": account_id })))
}
