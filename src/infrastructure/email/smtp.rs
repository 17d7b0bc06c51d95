//! SMTP email sender using Lettre.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use crate::domain::services::{EmailError, EmailMessage, EmailSender};

/// Sends mail through an SMTP relay upgraded with STARTTLS.
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from_address: &str,
        from_name: &str,
    ) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| EmailError::Transport(format!("SMTP relay error: {}", e)))?
            .port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from: mailbox(Some(from_name), from_address)?,
        })
    }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, EmailError> {
    let address = address
        .parse()
        .map_err(|_| EmailError::InvalidAddress(address.to_string()))?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

/// Assemble a multipart/alternative message with plain text and HTML parts.
pub(crate) fn build_message(from: &Mailbox, message: &EmailMessage) -> Result<Message, EmailError> {
    Message::builder()
        .from(from.clone())
        .to(mailbox(None, &message.to)?)
        .subject(message.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            message.text_body.clone(),
            message.html_body.clone(),
        ))
        .map_err(|e| EmailError::Transport(format!("Failed to build email: {}", e)))
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let email = build_message(&self.from, message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        debug!("Email sent");
        Ok(())
    }
}
