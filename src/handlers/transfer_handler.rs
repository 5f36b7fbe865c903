//! Transfer Handler
//!
//! Validates a transfer request against both accounts, then runs the
//! transfer workflow.

use crate::domain::Currency;
use crate::error::AppError;
use crate::ledger::{Ledger, LedgerError, TransferTxParams, TransferTxResult};
use crate::store::{Account, Store, Transactional};

use super::TransferCommand;

/// Handler for money transfers
pub struct TransferHandler<B> {
    ledger: Ledger<B>,
}

impl<B: Transactional> TransferHandler<B> {
    pub fn new(ledger: Ledger<B>) -> Self {
        Self { ledger }
    }

    /// Execute the transfer command
    pub async fn execute(&self, command: TransferCommand) -> Result<TransferTxResult, AppError> {
        let (amount, currency) = command.validate()?;

        // Both accounts must exist and hold the requested currency
        self.valid_account(command.from_account_id, currency).await?;
        self.valid_account(command.to_account_id, currency).await?;

        let result = self
            .ledger
            .transfer_tx(TransferTxParams::new(
                command.from_account_id,
                command.to_account_id,
                amount,
            ))
            .await?;

        Ok(result)
    }

    async fn valid_account(&self, account_id: i64, currency: Currency) -> Result<Account, AppError> {
        let account = self.ledger.store().get_account(account_id).await?;

        if account.currency != currency.code() {
            return Err(LedgerError::validation(format!(
                "account [{}] currency mismatch: {} vs {}",
                account.id, account.currency, currency
            ))
            .into());
        }

        Ok(account)
    }
}
