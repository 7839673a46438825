//! User HTTP handlers.
//!
//! - POST /user - Register a user (creates their main account)
//! - GET /user - List users (optional `include_deleted`)
//! - GET /user/{id} - Get one user
//! - DELETE /user/{id} - Cascading soft-delete

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    handlers::Visibility,
    models::user::{CreateUserRequest, UserResponse},
    services::user_service,
};

/// Register a new user. 409 on a duplicate username or email.
pub async fn create_user(
    State(pool): State<DbPool>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::create(&pool, request).await?;
    Ok(Json(user.into()))
}

/// List users, newest first.
pub async fn list_users(
    State(pool): State<DbPool>,
    Query(visibility): Query<Visibility>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = user_service::list(&pool, visibility.include_deleted).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Get a specific user by ID.
pub async fn get_user(
    State(pool): State<DbPool>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::get_by_id(&pool, user_id, false)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))?;
    Ok(Json(user.into()))
}

/// Soft-delete a user and all of their accounts.
///
/// 400 when the user has no active accounts or their balances do not sum
/// to exactly zero; the cascade and the user delete commit together.
pub async fn delete_user(
    State(pool): State<DbPool>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    user_service::delete(&pool, user_id).await?;
    Ok(Json(serde_json::json!({ "deleted": user_id })))
}
