//! Command Handlers module
//!
//! Handlers validate commands, run one ledger workflow and issue any
//! post-commit work.

mod commands;
mod transfer_handler;
mod user_handler;
mod verify_email_handler;


pub use commands::*;
pub use transfer_handler::TransferHandler;
pub use user_handler::{CreateUserHandler, CreateUserResult};
pub use verify_email_handler::VerifyEmailHandler;
