//! Transaction Runner
//!
//! Scoped unit of work: open a transaction, hand the unit a transaction-bound
//! `&dyn Store`, then commit on success or roll back on failure.

use crate::store::{Store, StoreFuture, Transactional, TxStore};

use super::LedgerError;

/// Run `unit` inside one transaction on `backend`.
///
/// The commit is issued from a spawned task, so once the unit has succeeded
/// the commit completes even if the caller stops polling. Dropping the
/// returned future while the unit is still running drops the transaction,
/// which rolls it back.
pub async fn exec_tx<B, T, F>(backend: &B, unit: F) -> Result<T, LedgerError>
where
    B: Transactional,
    T: Send,
    F: for<'s> FnOnce(&'s dyn Store) -> StoreFuture<'s, T> + Send,
{
    let tx = backend.begin().await?;

    let outcome = {
        let store: &dyn Store = &tx;
        unit(store).await
    };

    match outcome {
        Ok(value) => {
            let commit = tokio::spawn(async move { tx.commit().await });
            match commit.await {
                Ok(Ok(())) => Ok(value),
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "Transaction commit failed");
                    Err(LedgerError::Commit(Box::new(err)))
                }
                Err(join_err) => Err(LedgerError::Internal(format!(
                    "commit task aborted: {join_err}"
                ))),
            }
        }
        Err(err) => {
            tracing::debug!(error = %err, "Rolling back transaction");
            match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => {
                    tracing::error!(
                        error = %err,
                        rollback_error = %rollback,
                        "Transaction rollback failed"
                    );
                    Err(LedgerError::Rollback {
                        source: Box::new(err),
                        rollback: Box::new(rollback),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CreateUserParams, MemoryStore, User};

    fn params(name: &str) -> CreateUserParams {
        CreateUserParams {
            username: name.to_string(),
            hashed_password: "hashed".to_string(),
            full_name: "Runner Test".to_string(),
            email: format!("{name}@example.com"),
        }
    }

    async fn create_then_fail(store: &dyn Store, arg: CreateUserParams) -> Result<User, LedgerError> {
        store.create_user(arg).await?;
        Err(LedgerError::validation("hook refused"))
    }

    async fn create_then_hang(store: &dyn Store, arg: CreateUserParams) -> Result<(), LedgerError> {
        store.create_user(arg).await?;
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn create(store: &dyn Store, arg: CreateUserParams) -> Result<User, LedgerError> {
        store.create_user(arg).await
    }

    #[tokio::test]
    async fn test_success_commits() {
        let store = MemoryStore::new();
        let user = exec_tx(&store, move |s| Box::pin(create(s, params("alice"))))
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(store.count_users().await, 1);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_returns_original_error() {
        let store = MemoryStore::new();
        let result = exec_tx(&store, move |s| Box::pin(create_then_fail(s, params("bob")))).await;

        assert!(matches!(result, Err(LedgerError::Validation(m)) if m == "hook refused"));
        assert_eq!(store.count_users().await, 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let store = MemoryStore::new();
        store.fail_next_commit();
        let result = exec_tx(&store, move |s| Box::pin(create(s, params("carol")))).await;

        assert!(matches!(result, Err(LedgerError::Commit(_))));
        assert_eq!(store.count_users().await, 0);
    }

    #[tokio::test]
    async fn test_rollback_failure_carries_both_errors() {
        let store = MemoryStore::new();
        store.fail_next_rollback();
        let result = exec_tx(&store, move |s| Box::pin(create_then_fail(s, params("dave")))).await;

        match result {
            Err(err @ LedgerError::Rollback { .. }) => {
                let message = err.to_string();
                assert!(message.contains("hook refused"));
                assert!(message.contains("rollback refused"));
            }
            other => panic!("expected compound rollback error, got {other:?}"),
        }
        assert_eq!(store.count_users().await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_unit_rolls_back() {
        let store = MemoryStore::new();
        let unit = exec_tx(&store, move |s| Box::pin(create_then_hang(s, params("erin"))));

        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), unit).await;
        assert!(timed_out.is_err());
        assert_eq!(store.count_users().await, 0);
    }
}
