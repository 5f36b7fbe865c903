//! Command definitions
//!
//! Commands carry caller input into the handlers and validate its shape
//! before any transaction is opened.

use serde::{Deserialize, Serialize};

use crate::domain::{Amount, Currency, SECRET_CODE_LEN};
use crate::ledger::LedgerError;
use crate::store::{ListAccountsParams, User};

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 100;
const PAGE_SIZE_MIN: i32 = 5;
const PAGE_SIZE_MAX: i32 = 10;

// =========================================================================
// CreateUserCommand
// =========================================================================

/// Command to register a user. The password arrives already hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

impl CreateUserCommand {
    pub fn new(username: String, hashed_password: String, full_name: String, email: String) -> Self {
        Self {
            username,
            hashed_password,
            full_name,
            email,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        let len = self.username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(LedgerError::validation(format!(
                "username must contain from {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
            )));
        }
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(LedgerError::validation(
                "username must contain only lowercase letters, digits, or underscore",
            ));
        }
        if self.full_name.trim().is_empty() {
            return Err(LedgerError::validation("full_name must not be empty"));
        }
        if !self.email.contains('@') {
            return Err(LedgerError::validation("email is not a valid email address"));
        }
        if self.hashed_password.is_empty() {
            return Err(LedgerError::validation("hashed_password must not be empty"));
        }
        Ok(())
    }
}

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move money between two accounts of the same currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Amount in minor currency units
    pub amount: i64,
    /// Currency code both accounts must hold
    pub currency: String,
}

impl TransferCommand {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64, currency: impl Into<String>) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
            currency: currency.into(),
        }
    }

    /// Check shape and return the parsed amount and currency
    pub fn validate(&self) -> Result<(Amount, Currency), LedgerError> {
        if self.from_account_id < 1 || self.to_account_id < 1 {
            return Err(LedgerError::validation("account ids must be positive"));
        }
        if self.from_account_id == self.to_account_id {
            return Err(LedgerError::validation("cannot transfer to the same account"));
        }
        let amount = Amount::new(self.amount)?;
        let currency = self
            .currency
            .parse::<Currency>()
            .map_err(|e| LedgerError::validation(e.to_string()))?;
        Ok((amount, currency))
    }
}

// =========================================================================
// VerifyEmailCommand
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailCommand {
    pub email_id: i64,
    pub secret_code: String,
}

impl VerifyEmailCommand {
    pub fn new(email_id: i64, secret_code: impl Into<String>) -> Self {
        Self {
            email_id,
            secret_code: secret_code.into(),
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.email_id < 1 {
            return Err(LedgerError::validation("email_id must be a positive integer"));
        }
        if self.secret_code.chars().count() != SECRET_CODE_LEN {
            return Err(LedgerError::validation(format!(
                "secret_code must contain {SECRET_CODE_LEN} characters"
            )));
        }
        Ok(())
    }
}

// =========================================================================
// ListAccountsCommand
// =========================================================================

/// One page of an owner's accounts. Pages are numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAccountsCommand {
    pub owner: String,
    pub page_id: i32,
    pub page_size: i32,
}

impl ListAccountsCommand {
    pub fn new(owner: impl Into<String>, page_id: i32, page_size: i32) -> Self {
        Self {
            owner: owner.into(),
            page_id,
            page_size,
        }
    }

    pub fn validate(&self) -> Result<ListAccountsParams, LedgerError> {
        if self.owner.is_empty() {
            return Err(LedgerError::validation("owner must not be empty"));
        }
        if self.page_id < 1 {
            return Err(LedgerError::validation("page_id must be at least 1"));
        }
        if !(PAGE_SIZE_MIN..=PAGE_SIZE_MAX).contains(&self.page_size) {
            return Err(LedgerError::validation(format!(
                "page_size must be between {PAGE_SIZE_MIN} and {PAGE_SIZE_MAX}"
            )));
        }

        let limit = i64::from(self.page_size);
        Ok(ListAccountsParams {
            owner: self.owner.clone(),
            limit,
            offset: (i64::from(self.page_id) - 1) * limit,
        })
    }
}

// =========================================================================
// Results
// =========================================================================

/// Result of a successful email verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyEmailResult {
    pub username: String,
    pub is_email_verified: bool,
}

impl From<&User> for VerifyEmailResult {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            is_email_verified: user.is_email_verified,
        }
    }
}
