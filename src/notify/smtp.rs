use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use super::{Notification, Notifier};
use crate::config::SmtpConfig;
use crate::error::AppError;

const SERVICE: &str = "smtp";

fn smtp_err(e: impl std::fmt::Display) -> AppError {
    AppError::external(SERVICE, e)
}

/// Sends notifications through an authenticated SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn from_config(config: &SmtpConfig, timeout: Duration) -> Result<Self, AppError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        // 465 is implicit TLS, anything else negotiates STARTTLS
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(smtp_err)?;

        let transport = builder
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(timeout))
            .build();

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::validation(format!("invalid EMAIL_FROM '{}': {}", config.from, e)))?;

        Ok(Self { transport, from })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, AppError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.clone());
        for recipient in &notification.recipients {
            let mailbox = recipient
                .parse::<Mailbox>()
                .map_err(|e| AppError::validation(format!("invalid recipient '{}': {}", recipient, e)))?;
            builder = builder.to(mailbox);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(notification.body.clone()));
        for attachment in &notification.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(smtp_err)?;
            parts = parts.singlepart(
                MailAttachment::new(attachment.filename.clone()).body(attachment.bytes.clone(), content_type),
            );
        }

        builder.multipart(parts).map_err(smtp_err)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        if notification.recipients.is_empty() {
            return Err(AppError::validation("email has no recipients"));
        }

        let message = self.build_message(notification)?;
        match self.transport.send(message).await {
            Ok(_) => {
                info!(
                    subject = %notification.subject,
                    recipients = notification.recipients.len(),
                    attachments = notification.attachments.len(),
                    "Email sent"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, subject = %notification.subject, "Email send failed");
                Err(smtp_err(e))
            }
        }
    }
}
