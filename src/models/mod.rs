//! Data models representing database entities and API request/response types.

/// Account and its optional sub-components
pub mod account;
/// Immutable transaction records
pub mod transaction;
/// Wallet holder model
pub mod user;
