//! PostgreSQL store
//!
//! `PgStore` runs each call on a pooled connection. `PgTx` runs every call on
//! the one connection owned by its open transaction. Both delegate to the
//! query functions at the bottom of this file.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ledger::LedgerError;

use super::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateSessionParams, CreateTransferParams, CreateUserParams, CreateVerifyEmailParams, Entry,
    ListAccountsParams, Session, Store, Transactional, Transfer, TxStore, User, VerifyEmail,
};

/// Store bound to the connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Store bound to an open transaction
pub struct PgTx {
    tx: Mutex<sqlx::Transaction<'static, Postgres>>,
}

#[async_trait]
impl Transactional for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx: Mutex::new(tx) })
    }
}

#[async_trait]
impl TxStore for PgTx {
    async fn commit(self) -> Result<(), LedgerError> {
        self.tx.into_inner().commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.tx.into_inner().rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        create_account(&mut conn, &arg).await
    }

    async fn get_account(&self, id: i64) -> Result<Account, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        get_account(&mut conn, id).await
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        list_accounts(&mut conn, &arg).await
    }

    async fn add_account_balance(
        &self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        add_account_balance(&mut conn, arg).await
    }

    async fn create_entry(&self, arg: CreateEntryParams) -> Result<Entry, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        create_entry(&mut conn, arg).await
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        list_entries(&mut conn, account_id).await
    }

    async fn create_transfer(&self, arg: CreateTransferParams) -> Result<Transfer, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        create_transfer(&mut conn, arg).await
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        get_transfer(&mut conn, id).await
    }

    async fn list_transfers(&self, account_id: i64) -> Result<Vec<Transfer>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        list_transfers(&mut conn, account_id).await
    }

    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        create_user(&mut conn, &arg).await
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        get_user(&mut conn, username).await
    }

    async fn set_user_email_verified(&self, username: &str) -> Result<User, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        set_user_email_verified(&mut conn, username).await
    }

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        create_verify_email(&mut conn, &arg).await
    }

    async fn get_verify_email(&self, id: i64) -> Result<VerifyEmail, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        get_verify_email(&mut conn, id).await
    }

    async fn mark_verify_email_used(&self, id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        mark_verify_email_used(&mut conn, id).await
    }

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        create_session(&mut conn, &arg).await
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        get_session(&mut conn, id).await
    }
}

#[async_trait]
impl Store for PgTx {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError> {
        let mut tx = self.tx.lock().await;
        create_account(&mut tx, &arg).await
    }

    async fn get_account(&self, id: i64) -> Result<Account, LedgerError> {
        let mut tx = self.tx.lock().await;
        get_account(&mut tx, id).await
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        let mut tx = self.tx.lock().await;
        list_accounts(&mut tx, &arg).await
    }

    async fn add_account_balance(
        &self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        let mut tx = self.tx.lock().await;
        add_account_balance(&mut tx, arg).await
    }

    async fn create_entry(&self, arg: CreateEntryParams) -> Result<Entry, LedgerError> {
        let mut tx = self.tx.lock().await;
        create_entry(&mut tx, arg).await
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, LedgerError> {
        let mut tx = self.tx.lock().await;
        list_entries(&mut tx, account_id).await
    }

    async fn create_transfer(&self, arg: CreateTransferParams) -> Result<Transfer, LedgerError> {
        let mut tx = self.tx.lock().await;
        create_transfer(&mut tx, arg).await
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        let mut tx = self.tx.lock().await;
        get_transfer(&mut tx, id).await
    }

    async fn list_transfers(&self, account_id: i64) -> Result<Vec<Transfer>, LedgerError> {
        let mut tx = self.tx.lock().await;
        list_transfers(&mut tx, account_id).await
    }

    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError> {
        let mut tx = self.tx.lock().await;
        create_user(&mut tx, &arg).await
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        let mut tx = self.tx.lock().await;
        get_user(&mut tx, username).await
    }

    async fn set_user_email_verified(&self, username: &str) -> Result<User, LedgerError> {
        let mut tx = self.tx.lock().await;
        set_user_email_verified(&mut tx, username).await
    }

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError> {
        let mut tx = self.tx.lock().await;
        create_verify_email(&mut tx, &arg).await
    }

    async fn get_verify_email(&self, id: i64) -> Result<VerifyEmail, LedgerError> {
        let mut tx = self.tx.lock().await;
        get_verify_email(&mut tx, id).await
    }

    async fn mark_verify_email_used(&self, id: i64) -> Result<bool, LedgerError> {
        let mut tx = self.tx.lock().await;
        mark_verify_email_used(&mut tx, id).await
    }

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError> {
        let mut tx = self.tx.lock().await;
        create_session(&mut tx, &arg).await
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError> {
        let mut tx = self.tx.lock().await;
        get_session(&mut tx, id).await
    }
}

// =========================================================================
// Queries
// =========================================================================

async fn create_account(
    conn: &mut PgConnection,
    arg: &CreateAccountParams,
) -> Result<Account, LedgerError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (owner, balance, currency)
        VALUES ($1, $2, $3)
        RETURNING id, owner, balance, currency, created_at
        "#,
    )
    .bind(&arg.owner)
    .bind(arg.balance)
    .bind(&arg.currency)
    .fetch_one(conn)
    .await?;

    Ok(account)
}

async fn get_account(conn: &mut PgConnection, id: i64) -> Result<Account, LedgerError> {
    sqlx::query_as::<_, Account>(
        r#"
        SELECT id, owner, balance, currency, created_at
        FROM accounts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(format!("account {id}")))
}

async fn list_accounts(
    conn: &mut PgConnection,
    arg: &ListAccountsParams,
) -> Result<Vec<Account>, LedgerError> {
    let accounts = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, owner, balance, currency, created_at
        FROM accounts
        WHERE owner = $1
        ORDER BY id ASC
        LIMIT $2
        OFFSET $3
        "#,
    )
    .bind(&arg.owner)
    .bind(arg.limit)
    .bind(arg.offset)
    .fetch_all(conn)
    .await?;

    Ok(accounts)
}

async fn add_account_balance(
    conn: &mut PgConnection,
    arg: AddAccountBalanceParams,
) -> Result<Account, LedgerError> {
    sqlx::query_as::<_, Account>(
        r#"
        UPDATE accounts
        SET balance = balance + $2
        WHERE id = $1
        RETURNING id, owner, balance, currency, created_at
        "#,
    )
    .bind(arg.id)
    .bind(arg.amount)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(format!("account {}", arg.id)))
}

async fn create_entry(
    conn: &mut PgConnection,
    arg: CreateEntryParams,
) -> Result<Entry, LedgerError> {
    let entry = sqlx::query_as::<_, Entry>(
        r#"
        INSERT INTO entries (account_id, amount)
        VALUES ($1, $2)
        RETURNING id, account_id, amount, created_at
        "#,
    )
    .bind(arg.account_id)
    .bind(arg.amount)
    .fetch_one(conn)
    .await?;

    Ok(entry)
}

async fn list_entries(conn: &mut PgConnection, account_id: i64) -> Result<Vec<Entry>, LedgerError> {
    let entries = sqlx::query_as::<_, Entry>(
        r#"
        SELECT id, account_id, amount, created_at
        FROM entries
        WHERE account_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    Ok(entries)
}

async fn create_transfer(
    conn: &mut PgConnection,
    arg: CreateTransferParams,
) -> Result<Transfer, LedgerError> {
    let transfer = sqlx::query_as::<_, Transfer>(
        r#"
        INSERT INTO transfers (from_account_id, to_account_id, amount)
        VALUES ($1, $2, $3)
        RETURNING id, from_account_id, to_account_id, amount, created_at
        "#,
    )
    .bind(arg.from_account_id)
    .bind(arg.to_account_id)
    .bind(arg.amount)
    .fetch_one(conn)
    .await?;

    Ok(transfer)
}

async fn get_transfer(conn: &mut PgConnection, id: i64) -> Result<Transfer, LedgerError> {
    sqlx::query_as::<_, Transfer>(
        r#"
        SELECT id, from_account_id, to_account_id, amount, created_at
        FROM transfers
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(format!("transfer {id}")))
}

async fn list_transfers(
    conn: &mut PgConnection,
    account_id: i64,
) -> Result<Vec<Transfer>, LedgerError> {
    let transfers = sqlx::query_as::<_, Transfer>(
        r#"
        SELECT id, from_account_id, to_account_id, amount, created_at
        FROM transfers
        WHERE from_account_id = $1 OR to_account_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    Ok(transfers)
}

async fn create_user(conn: &mut PgConnection, arg: &CreateUserParams) -> Result<User, LedgerError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, hashed_password, full_name, email)
        VALUES ($1, $2, $3, $4)
        RETURNING username, hashed_password, full_name, email,
                  is_email_verified, password_changed_at, created_at
        "#,
    )
    .bind(&arg.username)
    .bind(&arg.hashed_password)
    .bind(&arg.full_name)
    .bind(&arg.email)
    .fetch_one(conn)
    .await?;

    Ok(user)
}

async fn get_user(conn: &mut PgConnection, username: &str) -> Result<User, LedgerError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT username, hashed_password, full_name, email,
               is_email_verified, password_changed_at, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(format!("user {username}")))
}

async fn set_user_email_verified(
    conn: &mut PgConnection,
    username: &str,
) -> Result<User, LedgerError> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET is_email_verified = TRUE
        WHERE username = $1
        RETURNING username, hashed_password, full_name, email,
                  is_email_verified, password_changed_at, created_at
        "#,
    )
    .bind(username)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(format!("user {username}")))
}

async fn create_verify_email(
    conn: &mut PgConnection,
    arg: &CreateVerifyEmailParams,
) -> Result<VerifyEmail, LedgerError> {
    let record = sqlx::query_as::<_, VerifyEmail>(
        r#"
        INSERT INTO verify_emails (username, email, secret_code)
        VALUES ($1, $2, $3)
        RETURNING id, username, email, secret_code, is_used, created_at, expires_at
        "#,
    )
    .bind(&arg.username)
    .bind(&arg.email)
    .bind(&arg.secret_code)
    .fetch_one(conn)
    .await?;

    Ok(record)
}

async fn get_verify_email(conn: &mut PgConnection, id: i64) -> Result<VerifyEmail, LedgerError> {
    sqlx::query_as::<_, VerifyEmail>(
        r#"
        SELECT id, username, email, secret_code, is_used, created_at, expires_at
        FROM verify_emails
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(format!("verify email {id}")))
}

async fn mark_verify_email_used(conn: &mut PgConnection, id: i64) -> Result<bool, LedgerError> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE verify_emails
        SET is_used = TRUE
        WHERE id = $1 AND is_used = FALSE
        "#,
    )
    .bind(id)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows_affected == 1)
}

async fn create_session(
    conn: &mut PgConnection,
    arg: &CreateSessionParams,
) -> Result<Session, LedgerError> {
    let session = sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, username, refresh_token, user_agent, client_ip, is_blocked, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, username, refresh_token, user_agent, client_ip, is_blocked, expires_at, created_at
        "#,
    )
    .bind(arg.id)
    .bind(&arg.username)
    .bind(&arg.refresh_token)
    .bind(&arg.user_agent)
    .bind(&arg.client_ip)
    .bind(arg.is_blocked)
    .bind(arg.expires_at)
    .fetch_one(conn)
    .await?;

    Ok(session)
}

async fn get_session(conn: &mut PgConnection, id: Uuid) -> Result<Session, LedgerError> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, username, refresh_token, user_agent, client_ip, is_blocked, expires_at, created_at
        FROM sessions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| LedgerError::not_found(format!("session {id}")))
}
