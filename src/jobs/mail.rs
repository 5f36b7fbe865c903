//! Outbound email
//!
//! The mailer is a collaborator: the service only needs something that can
//! accept a message. `LogEmailSender` stands in for a real provider.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// HTML body
    pub content: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MailError {
    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Mail provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone)]
pub struct LogEmailSender {
    from_name: String,
    from_address: String,
}

impl LogEmailSender {
    pub fn new(from_name: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            from_name: from_name.into(),
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::Rejected(format!("bad recipient {}", message.to)));
        }

        tracing::info!(
            from = %format!("{} <{}>", self.from_name, self.from_address),
            to = %message.to,
            subject = %message.subject,
            "Email sent"
        );
        tracing::debug!(content = %message.content, "Email content");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sender_rejects_bad_recipient() {
        let sender = LogEmailSender::new("Simple Bank", "no-reply@simplebank.local");
        let message = EmailMessage {
            to: "nobody".to_string(),
            subject: "Hi".to_string(),
            content: "<p>Hi</p>".to_string(),
        };

        assert!(matches!(
            sender.send_email(message).await,
            Err(MailError::Rejected(_))
        ));
    }
}
