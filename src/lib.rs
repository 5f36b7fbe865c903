//! simplebank library
//!
//! Re-exports modules for the server binary, tools and integration tests.

pub mod api;
pub mod domain;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorResponse};
pub use domain::{Amount, AmountError, Currency};
pub use ledger::{Ledger, LedgerError};
