//! Common test utilities

#![allow(dead_code)]

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use simplebank::store::{
    Account, AddAccountBalanceParams, CreateUserParams, Store, Transactional, User,
};
use simplebank::{Currency, Ledger};

/// Connect and migrate the test database, or `None` when `DATABASE_URL` is
/// unset so Postgres-backed tests can skip.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping Postgres test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    simplebank::db::migrate(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// Unique lowercase name so tests can share one database without truncating
pub fn unique_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &suffix[..12])
}

pub fn user_params(username: &str) -> CreateUserParams {
    CreateUserParams {
        username: username.to_string(),
        hashed_password: "$2a$10$test".to_string(),
        full_name: "Test User".to_string(),
        email: format!("{}@example.com", username),
    }
}

pub async fn create_user<S: Store>(store: &S, prefix: &str) -> User {
    store
        .create_user(user_params(&unique_name(prefix)))
        .await
        .expect("Failed to create user")
}

/// New user with one account holding `balance`
pub async fn funded_account<B: Transactional>(ledger: &Ledger<B>, balance: i64) -> Account {
    let user = create_user(ledger.store(), "owner").await;
    let account = ledger
        .open_account(&user.username, Currency::Usd)
        .await
        .expect("Failed to open account");

    if balance == 0 {
        return account;
    }

    ledger
        .store()
        .add_account_balance(AddAccountBalanceParams {
            id: account.id,
            amount: balance,
        })
        .await
        .expect("Failed to fund account")
}
