//! Ledger Errors
//!
//! Error taxonomy shared by the store, the transaction runner and the
//! workflows. The HTTP layer maps these onto status codes.

/// Postgres SQLSTATE codes the ledger classifies
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can occur while running a ledger operation
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Referenced account, user or verification record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation (duplicate username or email)
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Malformed or semantically invalid input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Connection, lock or query failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The unit of work succeeded but the commit did not
    #[error("Commit failed: {0}")]
    Commit(Box<LedgerError>),

    /// The unit of work failed and so did the rollback
    #[error("{source}; rollback also failed: {rollback}")]
    Rollback {
        source: Box<LedgerError>,
        rollback: Box<LedgerError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Check if re-running the whole workflow may succeed.
    ///
    /// Deadlock-detector aborts, serialization failures and connection level
    /// errors qualify. A compound rollback failure never does, since the
    /// connection state is unknown.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Database(err) => match err {
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
                sqlx::Error::Database(db_err) => matches!(
                    db_err.code().as_deref(),
                    Some(DEADLOCK_DETECTED) | Some(SERIALIZATION_FAILURE)
                ),
                _ => false,
            },
            LedgerError::Commit(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Check if this is the caller's fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LedgerError::NotFound(_) | LedgerError::Conflict(_) | LedgerError::Validation(_)
        )
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return LedgerError::NotFound("record".to_string());
        }

        if let Some(db_err) = err.as_database_error() {
            let code = db_err.code().map(|c| c.into_owned());
            let detail = db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string());

            match code.as_deref() {
                Some(UNIQUE_VIOLATION) => return LedgerError::Conflict(detail),
                Some(FOREIGN_KEY_VIOLATION) => return LedgerError::NotFound(detail),
                Some(CHECK_VIOLATION) | Some(NUMERIC_VALUE_OUT_OF_RANGE) => {
                    return LedgerError::Validation(detail)
                }
                _ => {}
            }
        }

        LedgerError::Database(err)
    }
}

impl From<crate::domain::AmountError> for LedgerError {
    fn from(err: crate::domain::AmountError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}
