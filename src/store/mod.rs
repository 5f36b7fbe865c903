//! Ledger Store
//!
//! Single-row data access for accounts, entries, transfers, users,
//! verification records and sessions.
//!
//! `Store` is the capability every workflow is written against. A backend
//! implements it twice: once for the ambient handle (each call on its own
//! connection) and once for a transaction handle returned by
//! [`Transactional::begin`]. Only the transaction runner ever sees the latter
//! as anything but a `&dyn Store`.

mod memory;
mod models;
mod postgres;

pub use memory::{MemoryStore, MemoryTx};
pub use models::*;
pub use postgres::{PgStore, PgTx};

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

use crate::ledger::LedgerError;

/// Future returned by a unit of work borrowing a transaction-bound store
pub type StoreFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 's>>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError>;
    async fn get_account(&self, id: i64) -> Result<Account, LedgerError>;
    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError>;

    /// Add `arg.amount` to the balance in a single conditionless update and
    /// return the new row. Takes the row lock until the transaction ends.
    async fn add_account_balance(
        &self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError>;

    async fn create_entry(&self, arg: CreateEntryParams) -> Result<Entry, LedgerError>;
    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, LedgerError>;

    async fn create_transfer(&self, arg: CreateTransferParams) -> Result<Transfer, LedgerError>;
    async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError>;

    /// Transfers touching `account_id` on either side, oldest first
    async fn list_transfers(&self, account_id: i64) -> Result<Vec<Transfer>, LedgerError>;

    /// Fails with `LedgerError::Conflict` on duplicate username or email.
    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError>;
    async fn get_user(&self, username: &str) -> Result<User, LedgerError>;
    async fn set_user_email_verified(&self, username: &str) -> Result<User, LedgerError>;

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError>;
    async fn get_verify_email(&self, id: i64) -> Result<VerifyEmail, LedgerError>;

    /// Flip `is_used` from false to true. Returns false if the record was
    /// already used, so two racing verifiers cannot both claim it.
    async fn mark_verify_email_used(&self, id: i64) -> Result<bool, LedgerError>;

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError>;
    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError>;
}

/// A store bound to one open transaction
#[async_trait]
pub trait TxStore: Store + Sized + 'static {
    async fn commit(self) -> Result<(), LedgerError>;
    async fn rollback(self) -> Result<(), LedgerError>;
}

/// A backend that can open transactions
#[async_trait]
pub trait Transactional: Store + Clone + 'static {
    type Tx: TxStore;

    async fn begin(&self) -> Result<Self::Tx, LedgerError>;
}
