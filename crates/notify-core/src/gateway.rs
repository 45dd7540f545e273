/// Email gateway (C3)
use crate::error::ProcessingError;
use crate::event::Recipient;
use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(
        &self,
        to: &Recipient,
        subject: &str,
        html_body: &str,
        correlation_id: &str,
    ) -> Result<(), ProcessingError>;
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub use_implicit_tls: bool,
}

/// Sends notification emails over SMTP using a connection opened per send
/// attempt. Every failure — missing configuration, connect, handshake,
/// authenticate, or transmit — is reported as `ProcessingError::Transient`,
/// matching the original gateway's uniform handling of `SMTPException`.
pub struct SmtpEmailGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailGateway {
    pub fn new(config: SmtpConfig) -> Result<Self, ProcessingError> {
        if config.host.is_empty() || config.login.is_empty() || config.password.is_empty() {
            return Err(ProcessingError::Config(
                "SMTP configuration incomplete: host, login, and password are required".into(),
            ));
        }

        let creds = Credentials::new(config.login.clone(), config.password.clone());

        let transport = if config.use_implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| ProcessingError::Config(format!("invalid SMTP host: {e}")))?
        .port(config.port)
        .credentials(creds)
        .build();

        let from = Mailbox::new(
            Some(config.from_name.clone()),
            config
                .from_email
                .parse()
                .map_err(|e| ProcessingError::Config(format!("invalid SMTP_FROM_EMAIL: {e}")))?,
        );

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailGateway for SmtpEmailGateway {
    async fn send(
        &self,
        to: &Recipient,
        subject: &str,
        html_body: &str,
        correlation_id: &str,
    ) -> Result<(), ProcessingError> {
        let to_mailbox = Mailbox::new(Some(to.name.clone()), to.email.parse().map_err(|e| {
            ProcessingError::Transient(format!("invalid recipient mailbox: {e}"))
        })?);

        let alternative = MultiPart::alternative()
            .singlepart(SinglePart::plain(
                "Please enable HTML to view this message correctly.".to_string(),
            ))
            .singlepart(SinglePart::html(html_body.to_string()));

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .multipart(alternative)
            .map_err(|e| ProcessingError::Transient(format!("failed to build message: {e}")))?;

        tracing::debug!(
            correlation_id = correlation_id,
            to = %to.email,
            "sending email via SMTP"
        );

        self.transport
            .send(message)
            .await
            .map_err(|e| ProcessingError::Transient(format!("SMTP send failed: {e}")))?;

        Ok(())
    }
}
