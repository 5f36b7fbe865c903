//! Background Jobs
//!
//! Best-effort work submitted after a transaction has committed. Jobs run on
//! detached tokio tasks with their own timeout, so a cancelled request never
//! cancels them and a failed job never reaches the original caller.

mod mail;

pub use mail::{EmailMessage, EmailSender, LogEmailSender, MailError};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::{User, VerifyEmail};

// =========================================================================
// Send Verify Email
// =========================================================================

/// Payload of the "send verification email" job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendVerifyEmail {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub email_id: i64,
    pub secret_code: String,
}

impl SendVerifyEmail {
    pub fn new(user: &User, record: &VerifyEmail) -> Self {
        Self {
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            email: record.email.clone(),
            email_id: record.id,
            secret_code: record.secret_code.clone(),
        }
    }

    /// Link the user follows to verify their address
    pub fn verify_url(&self, frontend_base_url: &str) -> String {
        format!(
            "{}/users/verify_email?email_id={}&secret_code={}",
            frontend_base_url.trim_end_matches('/'),
            self.email_id,
            self.secret_code
        )
    }

    fn message(&self, frontend_base_url: &str) -> EmailMessage {
        EmailMessage {
            to: self.email.clone(),
            subject: "Welcome to Simple Bank".to_string(),
            content: format!(
                "Hello {},<br/>Thank you for registering with us!<br/>\
                 Please <a href=\"{}\">click here</a> to verify your email address.<br/>",
                self.full_name,
                self.verify_url(frontend_base_url)
            ),
        }
    }
}

// =========================================================================
// Task Dispatcher
// =========================================================================

/// Configuration for the task dispatcher
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Bound on a single delivery attempt (default: 10 seconds)
    pub timeout: Duration,
    /// Attempts before giving up (default: 3)
    pub max_attempts: u32,
    /// Delay before attempt n+1 is `backoff * n` (default: 200ms)
    pub backoff: Duration,
    /// Base URL used to build verification links
    pub frontend_base_url: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff: Duration::from_millis(200),
            frontend_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Delivery counters since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Runs post-commit jobs on detached tasks
#[derive(Clone)]
pub struct TaskDispatcher {
    sender: Arc<dyn EmailSender>,
    config: Arc<DispatchConfig>,
    counters: Arc<Counters>,
}

impl TaskDispatcher {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self::with_config(sender, DispatchConfig::default())
    }

    pub fn with_config(sender: Arc<dyn EmailSender>, config: DispatchConfig) -> Self {
        Self {
            sender,
            config: Arc::new(config),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Submit a verification email. The returned handle may be dropped.
    pub fn dispatch_send_verify_email(&self, task: SendVerifyEmail) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            match dispatcher.send_verify_email(&task).await {
                Ok(attempts) => {
                    dispatcher.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        username = %task.username,
                        email_id = task.email_id,
                        attempts = attempts,
                        "Verification email sent"
                    );
                }
                Err(e) => {
                    dispatcher.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        username = %task.username,
                        email_id = task.email_id,
                        error = %e,
                        "Verification email failed"
                    );
                }
            }
        })
    }

    /// Deliver with retries; returns the number of attempts used
    async fn send_verify_email(&self, task: &SendVerifyEmail) -> Result<u32, JobError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let message = task.message(&self.config.frontend_base_url);

            let result = match tokio::time::timeout(
                self.config.timeout,
                self.sender.send_email(message),
            )
            .await
            {
                Ok(sent) => sent.map_err(JobError::from),
                Err(_) => Err(JobError::Timeout(self.config.timeout)),
            };

            match result {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        email_id = task.email_id,
                        attempt = attempt,
                        error = %e,
                        "Verification email attempt failed, retrying"
                    );
                    tokio::time::sleep(self.config.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Mail(#[from] MailError),
}

// =========================================================================
// Tests
// =========================================================================
