//! Business logic services.
//!
//! Services contain the core rules separated from HTTP handlers: the
//! transaction validator/executor and the account and user lifecycle
//! guards. The balance-mutating paths all run inside database transactions
//! held by these modules.

pub mod account_service;
pub mod transaction_service;
pub mod user_service;
