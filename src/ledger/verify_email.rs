//! Email verification workflow
//!
//! Consumes a single-use verification record and marks the user's email as
//! verified.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::store::{Store, Transactional, User, VerifyEmail};

use super::{Ledger, LedgerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyEmailTxParams {
    pub email_id: i64,
    pub secret_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyEmailTxResult {
    pub user: User,
    pub verify_email: VerifyEmail,
}

impl<B: Transactional> Ledger<B> {
    pub async fn verify_email_tx(
        &self,
        arg: VerifyEmailTxParams,
    ) -> Result<VerifyEmailTxResult, LedgerError> {
        let result = self
            .exec_tx(move |store| Box::pin(verify_email_steps(store, arg)))
            .await?;

        tracing::info!(
            username = %result.user.username,
            email_id = result.verify_email.id,
            "Email verified"
        );
        Ok(result)
    }
}

async fn verify_email_steps(
    store: &dyn Store,
    arg: VerifyEmailTxParams,
) -> Result<VerifyEmailTxResult, LedgerError> {
    let record = store.get_verify_email(arg.email_id).await?;

    if record.secret_code != arg.secret_code {
        return Err(LedgerError::validation("invalid secret code"));
    }
    if record.is_used {
        return Err(LedgerError::validation("verification code already used"));
    }
    if record.is_expired_at(Utc::now()) {
        return Err(LedgerError::validation("verification code expired"));
    }

    // Conditional update: a racing verifier that read is_used = false too
    // loses here instead of verifying twice.
    if !store.mark_verify_email_used(record.id).await? {
        return Err(LedgerError::validation("verification code already used"));
    }

    let user = store.set_user_email_verified(&record.username).await?;
    let verify_email = VerifyEmail {
        is_used: true,
        ..record
    };

    Ok(VerifyEmailTxResult { user, verify_email })
}
