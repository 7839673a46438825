//! Transaction HTTP handlers.
//!
//! - POST /transaction - Create (validate + execute) a money movement
//! - GET /transaction - List transactions (paginated)
//! - GET /transaction/{id} - Get transaction details
//! - GET /transaction/account/{accountId} - List an account's transactions

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    handlers::Page,
    models::transaction::{CreateTransactionRequest, TransactionResponse},
    services::{account_service, transaction_service},
};

/// Create a transaction.
///
/// Returns the fully hydrated record, including the balance-before
/// snapshots for any internal side. All validator failures (malformed
/// fields, unknown accounts, insufficient funds, self-transfer) are 400s;
/// nothing is persisted on failure.
pub async fn create_transaction(
    State(pool): State<DbPool>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = transaction_service::create(&pool, request).await?;
    Ok(Json(transaction.into()))
}

/// List transactions, newest first. Supports `skip` and `limit`.
pub async fn list_transactions(
    State(pool): State<DbPool>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let (skip, limit) = page.clamped();
    let transactions = transaction_service::list(&pool, skip, limit).await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

/// Get transaction by ID. 404 when unknown.
pub async fn get_transaction(
    State(pool): State<DbPool>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = transaction_service::get_by_id(&pool, transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {transaction_id} not found")))?;
    Ok(Json(transaction.into()))
}

/// List the transactions touching one account, as source or destination.
///
/// 404 when the account itself is unknown; soft-deleted accounts still
/// resolve here because their history must stay readable.
pub async fn list_account_transactions(
    State(pool): State<DbPool>,
    Path(account_id): Path<Uuid>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    if account_service::get_by_id(&pool, account_id, true).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "account {account_id} not found"
        )));
    }

    let (skip, limit) = page.clamped();
    let transactions =
        transaction_service::list_for_account(&pool, account_id, skip, limit).await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}
