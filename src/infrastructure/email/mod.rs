//! Email Senders
//!
//! `EmailSender` implementations selected by `email.provider`.

mod log;
mod smtp;

pub use log::LogEmailSender;
pub use smtp::SmtpEmailSender;

use std::sync::Arc;

use crate::config::EmailSettings;
use crate::domain::services::{EmailError, EmailSender};

/// Build the configured sender.
pub fn build_sender(settings: &EmailSettings) -> Result<Arc<dyn EmailSender>, EmailError> {
    match settings.provider.as_str() {
        "smtp" => {
            let host = settings
                .smtp_host
                .as_deref()
                .ok_or_else(|| EmailError::Transport("email.smtp_host is not set".into()))?;
            let credentials = settings
                .smtp_username
                .clone()
                .zip(settings.smtp_password.clone());
            Ok(Arc::new(SmtpEmailSender::new(
                host,
                settings.smtp_port,
                credentials,
                &settings.from_address,
                &settings.from_name,
            )?))
        }
        _ => Ok(Arc::new(LogEmailSender)),
    }
}
