//! Email sender that only logs, for development.

use async_trait::async_trait;
use tracing::info;

use crate::domain::services::{EmailError, EmailMessage, EmailSender};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if !message.to.contains('@') {
            return Err(EmailError::InvalidAddress(message.to.clone()));
        }
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text_body,
            "Email (log only)"
        );
        Ok(())
    }
}
