use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::PipelineError;

pub const SMTP_SERVER: &str = "smtp.gmail.com";

/// Sends one multipart digest email. Enables fakes in scheduler tests.
pub trait DigestMailer: Send + Sync {
    fn send(&self, subject: &str, plain_body: &str, html_body: &str)
        -> Result<(), PipelineError>;
}

/// Gmail SMTP transport. Each send opens a fresh session; the STARTTLS
/// upgrade completes before AUTH, so credentials never travel in plaintext.
pub struct SmtpMailer {
    user: String,
    app_password: String,
    recipient: String,
}

impl SmtpMailer {
    pub fn new(user: String, app_password: String, recipient: String) -> Self {
        Self {
            user,
            app_password,
            recipient,
        }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

impl DigestMailer for SmtpMailer {
    fn send(
        &self,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), PipelineError> {
        let from = self
            .user
            .parse()
            .map_err(|e| PipelineError::Mail(format!("invalid sender '{}': {}", self.user, e)))?;
        let to = self.recipient.parse().map_err(|e| {
            PipelineError::Mail(format!("invalid recipient '{}': {}", self.recipient, e))
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                plain_body.to_string(),
                html_body.to_string(),
            ))
            .map_err(|e| PipelineError::Mail(format!("failed to build message: {}", e)))?;

        let transport = SmtpTransport::starttls_relay(SMTP_SERVER)
            .map_err(|e| PipelineError::Mail(e.to_string()))?
            .credentials(Credentials::new(
                self.user.clone(),
                self.app_password.clone(),
            ))
            .build();

        transport
            .send(&message)
            .map_err(|e| PipelineError::Mail(e.to_string()))?;

        Ok(())
    }
}
