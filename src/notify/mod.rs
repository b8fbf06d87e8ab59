//! Outbound email notifications.

use async_trait::async_trait;

use crate::error::AppError;

pub mod smtp;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn csv(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Attachment {
            filename: filename.into(),
            content_type: "text/csv".to_string(),
            bytes,
        }
    }
}

/// Plain-text email with zero or more attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Used when no SMTP server is configured; every send fails loudly.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        tracing::warn!(subject = %notification.subject, "Email requested but SMTP is not configured");
        Err(AppError::external("smtp", "SMTP is not configured"))
    }
}
