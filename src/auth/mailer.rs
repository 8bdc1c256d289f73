// src/auth/mailer.rs — Outbound email over SMTP

use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::infra::config::EmailConfig;
use crate::infra::errors::RengloError;

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> Result<Self, RengloError> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| RengloError::Config(format!("invalid sender address: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| RengloError::Config(format!("SMTP relay setup failed: {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, sender })
    }

    /// Send an email with both a plain-text and an HTML body.
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body_text: &str,
        body_html: &str,
    ) -> Result<(), RengloError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| RengloError::Config(format!("invalid recipient address: {e}")))?;

        let email = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(body_text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(body_html.to_string()),
                    ),
            )
            .map_err(|e| RengloError::Config(format!("could not build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| RengloError::Other(anyhow::anyhow!("SMTP send failed: {e}")))?;

        tracing::info!("Email sent to {recipient}");
        Ok(())
    }
}
