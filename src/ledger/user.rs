//! User creation workflow
//!
//! Creates a user and runs a caller-supplied hook in the same transaction.
//! If the hook fails the user row is rolled back with it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::random_secret_code;
use crate::store::{CreateUserParams, CreateVerifyEmailParams, Store, Transactional, User, VerifyEmail};

use super::{Ledger, LedgerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserTxParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

impl From<CreateUserTxParams> for CreateUserParams {
    fn from(arg: CreateUserTxParams) -> Self {
        CreateUserParams {
            username: arg.username,
            hashed_password: arg.hashed_password,
            full_name: arg.full_name,
            email: arg.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateUserTxResult<O> {
    pub user: User,
    pub output: O,
}

/// Step run right after the user row is inserted, on the same transaction
#[async_trait]
pub trait AfterCreate: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn after_create(&self, store: &dyn Store, user: &User)
        -> Result<Self::Output, LedgerError>;
}

/// Issue a single-use verification record with a fresh secret code
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueVerifyEmail;

#[async_trait]
impl AfterCreate for IssueVerifyEmail {
    type Output = VerifyEmail;

    async fn after_create(&self, store: &dyn Store, user: &User) -> Result<VerifyEmail, LedgerError> {
        store
            .create_verify_email(CreateVerifyEmailParams {
                username: user.username.clone(),
                email: user.email.clone(),
                secret_code: random_secret_code(),
            })
            .await
    }
}

/// Plain synchronous hook
pub struct OnCreate<F>(pub F);

#[async_trait]
impl<F> AfterCreate for OnCreate<F>
where
    F: Fn(&User) -> Result<(), LedgerError> + Send + Sync + 'static,
{
    type Output = ();

    async fn after_create(&self, _store: &dyn Store, user: &User) -> Result<(), LedgerError> {
        (self.0)(user)
    }
}

impl<B: Transactional> Ledger<B> {
    /// Create a user, then run `hook` before committing
    pub async fn create_user_tx<H: AfterCreate>(
        &self,
        arg: CreateUserTxParams,
        hook: H,
    ) -> Result<CreateUserTxResult<H::Output>, LedgerError> {
        let result = self
            .exec_tx(move |store| Box::pin(create_user_steps(store, arg, hook)))
            .await?;

        tracing::info!(username = %result.user.username, "User created");
        Ok(result)
    }
}

async fn create_user_steps<H: AfterCreate>(
    store: &dyn Store,
    arg: CreateUserTxParams,
    hook: H,
) -> Result<CreateUserTxResult<H::Output>, LedgerError> {
    let user = store.create_user(arg.into()).await?;
    let output = hook.after_create(store, &user).await?;
    Ok(CreateUserTxResult { user, output })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SECRET_CODE_LEN;
    use crate::store::MemoryStore;

    fn params(name: &str) -> CreateUserTxParams {
        CreateUserTxParams {
            username: name.to_string(),
            hashed_password: "hashed".to_string(),
            full_name: "Jane Doe".to_string(),
            email: format!("{name}@example.com"),
        }
    }

    #[tokio::test]
    async fn test_issue_verify_email_in_same_transaction() {
        let ledger = Ledger::new(MemoryStore::new());
        let result = ledger
            .create_user_tx(params("jane"), IssueVerifyEmail)
            .await
            .unwrap();

        assert!(!result.user.is_email_verified);
        assert_eq!(result.output.username, "jane");
        assert_eq!(result.output.secret_code.len(), SECRET_CODE_LEN);

        let stored = ledger.store().get_verify_email(result.output.id).await.unwrap();
        assert_eq!(stored, result.output);
    }

    #[tokio::test]
    async fn test_hook_failure_rolls_back_user() {
        let ledger = Ledger::new(MemoryStore::new());
        let hook = OnCreate(|_: &User| -> Result<(), LedgerError> {
            Err(LedgerError::Internal("mail queue down".to_string()))
        });

        let result = ledger.create_user_tx(params("ghost"), hook).await;
        assert!(matches!(result, Err(LedgerError::Internal(_))));

        let lookup = ledger.store().get_user("ghost").await;
        assert!(matches!(lookup, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_hook_sees_created_user() {
        let ledger = Ledger::new(MemoryStore::new());
        let hook = OnCreate(|user: &User| -> Result<(), LedgerError> {
            if user.username == "seen" {
                Ok(())
            } else {
                Err(LedgerError::validation("wrong user"))
            }
        });

        ledger.create_user_tx(params("seen"), hook).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let ledger = Ledger::new(MemoryStore::new());
        ledger
            .create_user_tx(params("dup"), IssueVerifyEmail)
            .await
            .unwrap();

        let mut second = params("dup");
        second.email = "other@example.com".to_string();
        let result = ledger.create_user_tx(second, IssueVerifyEmail).await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
        assert_eq!(ledger.store().count_users().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let ledger = Ledger::new(MemoryStore::new());
        ledger
            .create_user_tx(params("first"), IssueVerifyEmail)
            .await
            .unwrap();

        let mut second = params("second");
        second.email = "first@example.com".to_string();
        let result = ledger.create_user_tx(second, IssueVerifyEmail).await;
        assert!(matches!(result, Err(LedgerError::Conflict(c)) if c == "users_email_key"));
        assert_eq!(ledger.store().count_users().await, 1);
        assert!(matches!(
            ledger.store().get_user("second").await,
            Err(LedgerError::NotFound(_))
        ));
    }
}
