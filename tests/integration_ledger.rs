//! Ledger Integration Tests against PostgreSQL
//!
//! Skipped when DATABASE_URL is not set.

use simplebank::ledger::{
    CreateUserTxParams, IssueVerifyEmail, OnCreate, TransferTxParams, VerifyEmailTxParams,
};
use simplebank::store::{PgStore, Store, User};
use simplebank::{Amount, Ledger, LedgerError};

mod common;

async fn pg_ledger() -> Option<Ledger<PgStore>> {
    let pool = common::setup_test_db().await?;
    Some(Ledger::new(PgStore::new(pool)))
}

fn user_tx_params(username: &str) -> CreateUserTxParams {
    CreateUserTxParams {
        username: username.to_string(),
        hashed_password: "$2a$10$test".to_string(),
        full_name: "Integration User".to_string(),
        email: format!("{}@example.com", username),
    }
}

// =========================================================================
// Transfers
// =========================================================================

#[tokio::test]
async fn test_transfer_conserves_balance_and_pairs_entries() {
    let Some(ledger) = pg_ledger().await else { return };
    let a = common::funded_account(&ledger, 1000).await;
    let b = common::funded_account(&ledger, 1000).await;

    let (a_id, b_id) = (a.id, b.id);
    let mut handles = Vec::new();
    for _ in 0..5 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .transfer_tx(TransferTxParams::new(a_id, b_id, Amount::new(10).unwrap()))
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.transfer.from_account_id, a.id);
        assert_eq!(result.transfer.to_account_id, b.id);
        assert_eq!(result.from_entry.amount, -10);
        assert_eq!(result.to_entry.amount, 10);

        let diff_from = a.balance - result.from_account.balance;
        let diff_to = result.to_account.balance - b.balance;
        assert_eq!(diff_from, diff_to);
        assert!(diff_from > 0 && diff_from % 10 == 0);
    }

    let store = ledger.store();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 950);
    assert_eq!(store.get_account(b.id).await.unwrap().balance, 1050);

    let entries_a: i64 = store
        .list_entries(a.id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.amount)
        .sum();
    assert_eq!(entries_a, -50);
}

#[tokio::test]
async fn test_opposite_transfers_do_not_deadlock() {
    let Some(ledger) = pg_ledger().await else { return };
    let a = common::funded_account(&ledger, 1000).await;
    let b = common::funded_account(&ledger, 1000).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = ledger.clone();
        let (from, to) = if i % 2 == 1 { (b.id, a.id) } else { (a.id, b.id) };
        handles.push(tokio::spawn(async move {
            ledger
                .transfer_tx(TransferTxParams::new(from, to, Amount::new(10).unwrap()))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let store = ledger.store();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 1000);
    assert_eq!(store.get_account(b.id).await.unwrap().balance, 1000);
    assert_eq!(store.list_transfers(a.id).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_transfer_to_missing_account_rolls_back() {
    let Some(ledger) = pg_ledger().await else { return };
    let a = common::funded_account(&ledger, 100).await;

    let result = ledger
        .transfer_tx(TransferTxParams::new(a.id, i64::MAX, Amount::new(5).unwrap()))
        .await;
    assert!(matches!(result, Err(LedgerError::NotFound(_))));

    let store = ledger.store();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
    assert!(store.list_entries(a.id).await.unwrap().is_empty());
    assert!(store.list_transfers(a.id).await.unwrap().is_empty());
}

// =========================================================================
// Users and verification
// =========================================================================

#[tokio::test]
async fn test_hook_failure_leaves_no_user() {
    let Some(ledger) = pg_ledger().await else { return };
    let username = common::unique_name("atomic");

    let hook = OnCreate(|_: &User| -> Result<(), LedgerError> {
        Err(LedgerError::Internal("queue unavailable".to_string()))
    });
    let result = ledger.create_user_tx(user_tx_params(&username), hook).await;
    assert!(matches!(result, Err(LedgerError::Internal(_))));

    let lookup = ledger.store().get_user(&username).await;
    assert!(matches!(lookup, Err(LedgerError::NotFound(_))));
}

#[tokio::test]
async fn test_duplicate_user_rejected() {
    let Some(ledger) = pg_ledger().await else { return };
    let username = common::unique_name("dup");

    ledger
        .create_user_tx(user_tx_params(&username), IssueVerifyEmail)
        .await
        .unwrap();

    let mut same_name = user_tx_params(&username);
    same_name.email = format!("{}@other.example.com", username);
    let result = ledger.create_user_tx(same_name, IssueVerifyEmail).await;
    assert!(matches!(result, Err(LedgerError::Conflict(_))));

    let mut same_email = user_tx_params(&common::unique_name("dup"));
    same_email.email = format!("{}@example.com", username);
    let result = ledger.create_user_tx(same_email, IssueVerifyEmail).await;
    assert!(matches!(result, Err(LedgerError::Conflict(_))));
}

#[tokio::test]
async fn test_verification_is_single_use() {
    let Some(ledger) = pg_ledger().await else { return };
    let username = common::unique_name("verify");

    let created = ledger
        .create_user_tx(user_tx_params(&username), IssueVerifyEmail)
        .await
        .unwrap();
    let record = created.output;
    assert!(!created.user.is_email_verified);

    // Wrong code leaves everything untouched
    let wrong = ledger
        .verify_email_tx(VerifyEmailTxParams {
            email_id: record.id,
            secret_code: "z".repeat(32),
        })
        .await;
    assert!(matches!(wrong, Err(LedgerError::Validation(_))));
    assert!(!ledger.store().get_verify_email(record.id).await.unwrap().is_used);

    let arg = VerifyEmailTxParams {
        email_id: record.id,
        secret_code: record.secret_code.clone(),
    };

    // Two racing verifiers: exactly one wins
    let (first, second) = tokio::join!(
        ledger.verify_email_tx(arg.clone()),
        ledger.verify_email_tx(arg.clone())
    );
    let wins = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1);

    let user = ledger.store().get_user(&username).await.unwrap();
    assert!(user.is_email_verified);

    let again = ledger.verify_email_tx(arg).await;
    assert!(matches!(again, Err(LedgerError::Validation(_))));
}
