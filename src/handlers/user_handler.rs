//! User Handler
//!
//! Registration: user row plus verification record in one transaction, then
//! a best-effort verification email.

use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::jobs::{SendVerifyEmail, TaskDispatcher};
use crate::ledger::{CreateUserTxParams, IssueVerifyEmail, Ledger};
use crate::store::{Transactional, User};

use super::CreateUserCommand;

// =========================================================================
// CreateUserHandler
// =========================================================================

/// Result of a successful registration
#[derive(Debug)]
pub struct CreateUserResult {
    pub user: User,
    pub verify_email_id: i64,
    /// Handle of the detached email job; dropping it does not cancel the job
    pub dispatch: JoinHandle<()>,
}

/// Handler for user registration
pub struct CreateUserHandler<B> {
    ledger: Ledger<B>,
    dispatcher: TaskDispatcher,
}

impl<B: Transactional> CreateUserHandler<B> {
    pub fn new(ledger: Ledger<B>, dispatcher: TaskDispatcher) -> Self {
        Self { ledger, dispatcher }
    }

    /// Execute the create user command
    pub async fn execute(&self, command: CreateUserCommand) -> Result<CreateUserResult, AppError> {
        command.validate()?;

        let result = self
            .ledger
            .create_user_tx(
                CreateUserTxParams {
                    username: command.username,
                    hashed_password: command.hashed_password,
                    full_name: command.full_name,
                    email: command.email,
                },
                IssueVerifyEmail,
            )
            .await?;

        // Committed: from here on the email is best-effort
        let task = SendVerifyEmail::new(&result.user, &result.output);
        let dispatch = self.dispatcher.dispatch_send_verify_email(task);

        Ok(CreateUserResult {
            verify_email_id: result.output.id,
            user: result.user,
            dispatch,
        })
    }
}
