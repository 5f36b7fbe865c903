//! Transfer workflow
//!
//! Moves money between two accounts: one transfer row, a debit/credit entry
//! pair and both balance updates, all in one transaction.

use serde::{Deserialize, Serialize};

use crate::domain::Amount;
use crate::store::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, Store,
    Transactional, Transfer,
};

use super::{Ledger, LedgerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Amount,
}

impl TransferTxParams {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: Amount) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if self.from_account_id == self.to_account_id {
            return Err(LedgerError::validation(format!(
                "cannot transfer from account {} to itself",
                self.from_account_id
            )));
        }
        Ok(())
    }
}

/// Everything written by one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl<B: Transactional> Ledger<B> {
    /// Transfer `arg.amount` from one account to another.
    ///
    /// Balance rows are always locked in ascending account id order, so two
    /// opposite transfers between the same pair cannot deadlock.
    pub async fn transfer_tx(&self, arg: TransferTxParams) -> Result<TransferTxResult, LedgerError> {
        arg.validate()?;

        let result = self
            .exec_tx(move |store| Box::pin(transfer_steps(store, arg)))
            .await?;

        tracing::info!(
            transfer_id = result.transfer.id,
            from_account_id = arg.from_account_id,
            to_account_id = arg.to_account_id,
            amount = %arg.amount,
            "Transfer completed"
        );

        Ok(result)
    }
}

async fn transfer_steps(
    store: &dyn Store,
    arg: TransferTxParams,
) -> Result<TransferTxResult, LedgerError> {
    let transfer = store
        .create_transfer(CreateTransferParams {
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount.value(),
        })
        .await?;

    let from_entry = store
        .create_entry(CreateEntryParams {
            account_id: arg.from_account_id,
            amount: arg.amount.negated(),
        })
        .await?;

    let to_entry = store
        .create_entry(CreateEntryParams {
            account_id: arg.to_account_id,
            amount: arg.amount.value(),
        })
        .await?;

    let (from_account, to_account) = if arg.from_account_id < arg.to_account_id {
        add_money(
            store,
            arg.from_account_id,
            arg.amount.negated(),
            arg.to_account_id,
            arg.amount.value(),
        )
        .await?
    } else {
        let (to_account, from_account) = add_money(
            store,
            arg.to_account_id,
            arg.amount.value(),
            arg.from_account_id,
            arg.amount.negated(),
        )
        .await?;
        (from_account, to_account)
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Apply two balance deltas in the given order
async fn add_money(
    store: &dyn Store,
    first_id: i64,
    first_amount: i64,
    second_id: i64,
    second_amount: i64,
) -> Result<(Account, Account), LedgerError> {
    let first = store
        .add_account_balance(AddAccountBalanceParams {
            id: first_id,
            amount: first_amount,
        })
        .await?;

    let second = store
        .add_account_balance(AddAccountBalanceParams {
            id: second_id,
            amount: second_amount,
        })
        .await?;

    Ok((first, second))
}
