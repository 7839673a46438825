//! Administrative database utilities.
//!
//! These bypass the soft-delete model entirely: reset hard-deletes every
//! row in dependency order. Intended for development and test environments.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::{db::DbPool, error::AppError};

/// Child tables first so the RESTRICT foreign keys never fire.
const RESET_ORDER: [&str; 7] = [
    "transactions",
    "account_saving_goals",
    "account_spending_limits",
    "account_active_details",
    "account_core_details",
    "accounts",
    "users",
];

/// Per-table row counts.
#[derive(Debug, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Hard-delete all rows from all tables, in dependency order, as one
/// transaction. Returns how many rows each table lost.
pub async fn reset_database(
    State(pool): State<DbPool>,
) -> Result<Json<Vec<TableCount>>, AppError> {
    let mut tx = pool.begin().await?;

    let mut deleted = Vec::with_capacity(RESET_ORDER.len());
    for table in RESET_ORDER {
        let rows = sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        deleted.push(TableCount {
            table: table.to_string(),
            rows: rows as i64,
        });
    }

    tx.commit().await?;
    tracing::warn!("database reset: all rows deleted");
    Ok(Json(deleted))
}

/// Report current row counts per table, soft-deleted rows included.
pub async fn database_status(
    State(pool): State<DbPool>,
) -> Result<Json<Vec<TableCount>>, AppError> {
    let mut counts = Vec::with_capacity(RESET_ORDER.len());
    for table in RESET_ORDER {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await?;
        counts.push(TableCount {
            table: table.to_string(),
            rows,
        });
    }
    Ok(Json(counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_order_deletes_children_before_parents() {
        let position = |t: &str| RESET_ORDER.iter().position(|x| *x == t).unwrap();
        assert!(position("transactions") < position("account_core_details"));
        assert!(position("account_core_details") < position("accounts"));
        assert!(position("accounts") < position("users"));
        assert!(position("account_saving_goals") < position("accounts"));
        assert!(position("account_spending_limits") < position("accounts"));
        assert!(position("account_active_details") < position("accounts"));
    }
}
