//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that extracts request data (JSON
//! body, path/query parameters), delegates to a service, and returns a
//! JSON response. All business rules live in the services.

/// Account management endpoints
pub mod accounts;
/// Database reset/status utilities
pub mod database;
/// Liveness endpoint
pub mod health;
/// Transaction endpoints
pub mod transactions;
/// User endpoints
pub mod users;

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// `skip`/`limit` query parameters for paginated lists.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: i64,

    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Page {
    /// Clamp to sane bounds; a negative skip reads from the start and the
    /// limit is capped.
    pub fn clamped(self) -> (i64, i64) {
        (self.skip.max(0), self.limit.clamp(1, MAX_LIMIT))
    }
}

/// Explicit soft-delete visibility flag for list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Visibility {
    #[serde(default)]
    pub include_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_out_of_range_values() {
        assert_eq!(Page { skip: -5, limit: 0 }.clamped(), (0, 1));
        assert_eq!(Page { skip: 10, limit: 500 }.clamped(), (10, MAX_LIMIT));
        assert_eq!(Page { skip: 0, limit: 50 }.clamped(), (0, 50));
    }

    #[test]
    fn page_defaults_apply_when_params_absent() {
        let page: Page = serde_json::from_str("{}").unwrap();
        assert_eq!(page.skip, 0);
        assert_eq!(page.limit, DEFAULT_LIMIT);
    }
}
