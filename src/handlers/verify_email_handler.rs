//! Verify Email Handler

use crate::error::AppError;
use crate::ledger::{Ledger, VerifyEmailTxParams};
use crate::store::Transactional;

use super::{VerifyEmailCommand, VerifyEmailResult};

/// Handler for email verification links
pub struct VerifyEmailHandler<B> {
    ledger: Ledger<B>,
}

impl<B: Transactional> VerifyEmailHandler<B> {
    pub fn new(ledger: Ledger<B>) -> Self {
        Self { ledger }
    }

    pub async fn execute(&self, command: VerifyEmailCommand) -> Result<VerifyEmailResult, AppError> {
        command.validate()?;

        let result = self
            .ledger
            .verify_email_tx(VerifyEmailTxParams {
                email_id: command.email_id,
                secret_code: command.secret_code,
            })
            .await?;

        Ok(VerifyEmailResult::from(&result.user))
    }
}
