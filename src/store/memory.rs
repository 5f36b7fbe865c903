//! In-memory store
//!
//! Tables behind one `tokio::sync::Mutex`. A transaction takes the owned guard
//! for its whole lifetime and works on a staged copy, so transactions are
//! serialised and a rollback is just dropping the copy. Used by tests and for
//! running the service without PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::ledger::LedgerError;

use super::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateSessionParams, CreateTransferParams, CreateUserParams, CreateVerifyEmailParams, Entry,
    ListAccountsParams, Session, Store, Transactional, Transfer, TxStore, User, VerifyEmail,
};

/// Verification records stay valid for this long, matching the SQL default
const VERIFY_EMAIL_TTL_MINUTES: i64 = 15;

/// Seconds from the Unix epoch back to 0001-01-01T00:00:00Z
const YEAR_ONE_TIMESTAMP: i64 = -62_135_596_800;

fn password_never_changed() -> DateTime<Utc> {
    DateTime::from_timestamp(YEAR_ONE_TIMESTAMP, 0).unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    users: BTreeMap<String, User>,
    verify_emails: BTreeMap<i64, VerifyEmail>,
    sessions: HashMap<Uuid, Session>,
    last_id: i64,
    /// Account ids in the order their balances were updated
    balance_updates: Vec<i64>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

/// Ambient in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

/// In-memory transaction: holds the table lock until commit or rollback
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Mutex<Tables>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail and discard its changes
    pub fn fail_next_commit(&self) {
        self.faults.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Make the next rollback report a failure
    pub fn fail_next_rollback(&self) {
        self.faults.fail_rollback.store(true, Ordering::SeqCst);
    }

    /// Committed balance updates, as account ids in issue order
    pub async fn balance_update_log(&self) -> Vec<i64> {
        self.tables.lock().await.balance_updates.clone()
    }

    /// Sum of every account balance
    pub async fn total_balance(&self) -> i64 {
        self.tables.lock().await.accounts.values().map(|a| a.balance).sum()
    }

    pub async fn count_users(&self) -> usize {
        self.tables.lock().await.users.len()
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, LedgerError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = Mutex::new((*guard).clone());
        Ok(MemoryTx {
            guard,
            staged,
            faults: self.faults.clone(),
        })
    }
}

#[async_trait]
impl TxStore for MemoryTx {
    async fn commit(self) -> Result<(), LedgerError> {
        if self.faults.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Internal("commit refused".to_string()));
        }
        let MemoryTx {
            mut guard, staged, ..
        } = self;
        *guard = staged.into_inner();
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        if self.faults.fail_rollback.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Internal("rollback refused".to_string()));
        }
        Ok(())
    }
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn require_user(&self, username: &str, constraint: &str) -> Result<(), LedgerError> {
        if self.users.contains_key(username) {
            Ok(())
        } else {
            Err(LedgerError::not_found(constraint))
        }
    }

    fn require_account(&self, id: i64, constraint: &str) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(LedgerError::not_found(constraint))
        }
    }

    fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, LedgerError> {
        self.require_user(&arg.owner, "accounts_owner_fkey")?;
        if self
            .accounts
            .values()
            .any(|a| a.owner == arg.owner && a.currency == arg.currency)
        {
            return Err(LedgerError::Conflict("owner_currency_key".to_string()));
        }

        let account = Account {
            id: self.next_id(),
            owner: arg.owner,
            balance: arg.balance,
            currency: arg.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn get_account(&self, id: i64) -> Result<Account, LedgerError> {
        self.accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("account {id}")))
    }

    fn list_accounts(&self, arg: &ListAccountsParams) -> Vec<Account> {
        let offset = usize::try_from(arg.offset).unwrap_or(0);
        let limit = usize::try_from(arg.limit).unwrap_or(0);
        self.accounts
            .values()
            .filter(|a| a.owner == arg.owner)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn add_account_balance(&mut self, arg: AddAccountBalanceParams) -> Result<Account, LedgerError> {
        let account = self
            .accounts
            .get_mut(&arg.id)
            .ok_or_else(|| LedgerError::not_found(format!("account {}", arg.id)))?;
        account.balance = account
            .balance
            .checked_add(arg.amount)
            .ok_or_else(|| LedgerError::validation("bigint out of range"))?;
        let account = account.clone();
        self.balance_updates.push(arg.id);
        Ok(account)
    }

    fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, LedgerError> {
        self.require_account(arg.account_id, "entries_account_id_fkey")?;
        let entry = Entry {
            id: self.next_id(),
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn list_entries(&self, account_id: i64) -> Vec<Entry> {
        self.entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect()
    }

    fn create_transfer(&mut self, arg: CreateTransferParams) -> Result<Transfer, LedgerError> {
        if arg.amount <= 0 {
            return Err(LedgerError::validation("transfers_amount_check"));
        }
        self.require_account(arg.from_account_id, "transfers_from_account_id_fkey")?;
        self.require_account(arg.to_account_id, "transfers_to_account_id_fkey")?;

        let transfer = Transfer {
            id: self.next_id(),
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        self.transfers
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("transfer {id}")))
    }

    fn list_transfers(&self, account_id: i64) -> Vec<Transfer> {
        self.transfers
            .iter()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .cloned()
            .collect()
    }

    fn create_user(&mut self, arg: CreateUserParams) -> Result<User, LedgerError> {
        if self.users.contains_key(&arg.username) {
            return Err(LedgerError::Conflict("users_pkey".to_string()));
        }
        if self.users.values().any(|u| u.email == arg.email) {
            return Err(LedgerError::Conflict("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            username: arg.username,
            hashed_password: arg.hashed_password,
            full_name: arg.full_name,
            email: arg.email,
            is_email_verified: false,
            password_changed_at: password_never_changed(),
            created_at: now,
        };
        self.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        self.users
            .get(username)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("user {username}")))
    }

    fn set_user_email_verified(&mut self, username: &str) -> Result<User, LedgerError> {
        let user = self
            .users
            .get_mut(username)
            .ok_or_else(|| LedgerError::not_found(format!("user {username}")))?;
        user.is_email_verified = true;
        Ok(user.clone())
    }

    fn create_verify_email(
        &mut self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError> {
        self.require_user(&arg.username, "verify_emails_username_fkey")?;
        let now = Utc::now();
        let record = VerifyEmail {
            id: self.next_id(),
            username: arg.username,
            email: arg.email,
            secret_code: arg.secret_code,
            is_used: false,
            created_at: now,
            expires_at: now + Duration::minutes(VERIFY_EMAIL_TTL_MINUTES),
        };
        self.verify_emails.insert(record.id, record.clone());
        Ok(record)
    }

    fn get_verify_email(&self, id: i64) -> Result<VerifyEmail, LedgerError> {
        self.verify_emails
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("verify email {id}")))
    }

    fn mark_verify_email_used(&mut self, id: i64) -> bool {
        match self.verify_emails.get_mut(&id) {
            Some(record) if !record.is_used => {
                record.is_used = true;
                true
            }
            _ => false,
        }
    }

    fn create_session(&mut self, arg: CreateSessionParams) -> Result<Session, LedgerError> {
        self.require_user(&arg.username, "sessions_username_fkey")?;
        if self.sessions.contains_key(&arg.id) {
            return Err(LedgerError::Conflict("sessions_pkey".to_string()));
        }
        let session = Session {
            id: arg.id,
            username: arg.username,
            refresh_token: arg.refresh_token,
            user_agent: arg.user_agent,
            client_ip: arg.client_ip,
            is_blocked: arg.is_blocked,
            expires_at: arg.expires_at,
            created_at: Utc::now(),
        };
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn get_session(&self, id: Uuid) -> Result<Session, LedgerError> {
        self.sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("session {id}")))
    }

    #[cfg(test)]
    fn set_verify_email_expiry(&mut self, id: i64, expires_at: DateTime<Utc>) {
        if let Some(record) = self.verify_emails.get_mut(&id) {
            record.expires_at = expires_at;
        }
    }
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) async fn expire_verify_email(&self, id: i64) {
        let past = Utc::now() - Duration::minutes(1);
        self.tables.lock().await.set_verify_email_expiry(id, past);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError> {
        self.tables.lock().await.create_account(arg)
    }

    async fn get_account(&self, id: i64) -> Result<Account, LedgerError> {
        self.tables.lock().await.get_account(id)
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        Ok(self.tables.lock().await.list_accounts(&arg))
    }

    async fn add_account_balance(
        &self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        self.tables.lock().await.add_account_balance(arg)
    }

    async fn create_entry(&self, arg: CreateEntryParams) -> Result<Entry, LedgerError> {
        self.tables.lock().await.create_entry(arg)
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, LedgerError> {
        Ok(self.tables.lock().await.list_entries(account_id))
    }

    async fn create_transfer(&self, arg: CreateTransferParams) -> Result<Transfer, LedgerError> {
        self.tables.lock().await.create_transfer(arg)
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        self.tables.lock().await.get_transfer(id)
    }

    async fn list_transfers(&self, account_id: i64) -> Result<Vec<Transfer>, LedgerError> {
        Ok(self.tables.lock().await.list_transfers(account_id))
    }

    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError> {
        self.tables.lock().await.create_user(arg)
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        self.tables.lock().await.get_user(username)
    }

    async fn set_user_email_verified(&self, username: &str) -> Result<User, LedgerError> {
        self.tables.lock().await.set_user_email_verified(username)
    }

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError> {
        self.tables.lock().await.create_verify_email(arg)
    }

    async fn get_verify_email(&self, id: i64) -> Result<VerifyEmail, LedgerError> {
        self.tables.lock().await.get_verify_email(id)
    }

    async fn mark_verify_email_used(&self, id: i64) -> Result<bool, LedgerError> {
        Ok(self.tables.lock().await.mark_verify_email_used(id))
    }

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError> {
        self.tables.lock().await.create_session(arg)
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError> {
        self.tables.lock().await.get_session(id)
    }
}

#[async_trait]
impl Store for MemoryTx {
    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError> {
        self.staged.lock().await.create_account(arg)
    }

    async fn get_account(&self, id: i64) -> Result<Account, LedgerError> {
        self.staged.lock().await.get_account(id)
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        Ok(self.staged.lock().await.list_accounts(&arg))
    }

    async fn add_account_balance(
        &self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, LedgerError> {
        self.staged.lock().await.add_account_balance(arg)
    }

    async fn create_entry(&self, arg: CreateEntryParams) -> Result<Entry, LedgerError> {
        self.staged.lock().await.create_entry(arg)
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, LedgerError> {
        Ok(self.staged.lock().await.list_entries(account_id))
    }

    async fn create_transfer(&self, arg: CreateTransferParams) -> Result<Transfer, LedgerError> {
        self.staged.lock().await.create_transfer(arg)
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        self.staged.lock().await.get_transfer(id)
    }

    async fn list_transfers(&self, account_id: i64) -> Result<Vec<Transfer>, LedgerError> {
        Ok(self.staged.lock().await.list_transfers(account_id))
    }

    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError> {
        self.staged.lock().await.create_user(arg)
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        self.staged.lock().await.get_user(username)
    }

    async fn set_user_email_verified(&self, username: &str) -> Result<User, LedgerError> {
        self.staged.lock().await.set_user_email_verified(username)
    }

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError> {
        self.staged.lock().await.create_verify_email(arg)
    }

    async fn get_verify_email(&self, id: i64) -> Result<VerifyEmail, LedgerError> {
        self.staged.lock().await.get_verify_email(id)
    }

    async fn mark_verify_email_used(&self, id: i64) -> Result<bool, LedgerError> {
        Ok(self.staged.lock().await.mark_verify_email_used(id))
    }

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError> {
        self.staged.lock().await.create_session(arg)
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError> {
        self.staged.lock().await.get_session(id)
    }
}
