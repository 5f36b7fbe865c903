//! Ledger module
//!
//! Multi-statement workflows (transfer, user creation, email verification)
//! built on the transaction runner. Every workflow opens exactly one runner
//! scope and executes its steps sequentially on the transaction-bound store.

mod error;
pub mod runner;
mod transfer;
mod user;
mod verify_email;

pub use error::LedgerError;
pub use runner::exec_tx;
pub use transfer::{TransferTxParams, TransferTxResult};
pub use user::{AfterCreate, CreateUserTxParams, CreateUserTxResult, IssueVerifyEmail, OnCreate};
pub use verify_email::{VerifyEmailTxParams, VerifyEmailTxResult};

use crate::domain::Currency;
use crate::store::{Account, CreateAccountParams, Store, StoreFuture, Transactional};

/// Entry point for ledger workflows over one storage backend
#[derive(Debug, Clone)]
pub struct Ledger<B> {
    backend: B,
}

impl<B: Transactional> Ledger<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Ambient (non-transactional) store for single-row reads
    pub fn store(&self) -> &B {
        &self.backend
    }

    /// Run an arbitrary unit of work in one transaction
    pub async fn exec_tx<T, F>(&self, unit: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'s> FnOnce(&'s dyn Store) -> StoreFuture<'s, T> + Send,
    {
        runner::exec_tx(&self.backend, unit).await
    }

    /// Open a zero-balance account for an existing user
    pub async fn open_account(&self, owner: &str, currency: Currency) -> Result<Account, LedgerError> {
        let account = self
            .backend
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance: 0,
                currency: currency.code().to_string(),
            })
            .await?;

        tracing::info!(
            account_id = account.id,
            owner = %account.owner,
            currency = %account.currency,
            "Account opened"
        );

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CreateUserParams, MemoryStore};

    #[tokio::test]
    async fn test_open_account_one_per_currency() {
        let ledger = Ledger::new(MemoryStore::new());
        ledger
            .store()
            .create_user(CreateUserParams {
                username: "owner".to_string(),
                hashed_password: "hashed".to_string(),
                full_name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
            })
            .await
            .unwrap();

        let usd = ledger.open_account("owner", Currency::Usd).await.unwrap();
        assert_eq!(usd.balance, 0);
        assert_eq!(usd.currency, "USD");

        ledger.open_account("owner", Currency::Eur).await.unwrap();

        let again = ledger.open_account("owner", Currency::Usd).await;
        assert!(matches!(again, Err(LedgerError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_open_account_unknown_owner() {
        let ledger = Ledger::new(MemoryStore::new());
        let result = ledger.open_account("nobody", Currency::Cad).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }
}
