//! User data models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a user record from the database.
///
/// Users are soft-deleted: the row stays in place with `is_deleted` set so
/// owned accounts and transaction history keep resolving.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,

    /// Opaque credential. Hashing and verification are handled outside the
    /// wallet core; this value is never serialized into a response.
    pub password: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Request body for registering a new user.
///
/// Registration always creates the user's main account alongside the user
/// row, in one atomic unit.
///
/// # JSON Example
///
/// ```json
/// {
///   "username": "alice",
///   "email": "alice@example.com",
///   "password": "…",
///   "mainAccountName": "Main Account"
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,

    /// Display name for the automatically created main account.
    #[serde(default = "default_main_account_name")]
    pub main_account_name: String,
}

fn default_main_account_name() -> String {
    "Main Account".to_string()
}

/// Response body for user endpoints. Strips the credential.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
            is_deleted: user.is_deleted,
            deleted_at: user.deleted_at,
        }
    }
}
