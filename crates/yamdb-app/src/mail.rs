//! Delivery of confirmation codes.
//!
//! With an SMTP host configured mails go through STARTTLS relay, otherwise
//! each message is written as an `.eml` file into the mail directory.

use std::path::PathBuf;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const CONFIRMATION_SUBJECT: &str = "YaMDb confirmation code";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("File transport error: {0}")]
    File(#[from] lettre::transport::file::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),

    #[error("Mail directory error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    /// Used when no SMTP host is set
    pub mail_dir: PathBuf,
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

pub struct Mailer {
    from: Mailbox,
    transport: Transport,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.from_address.parse()?;
        let transport = match config.smtp_host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)?
                    .port(config.smtp_port);
                if let (Some(user), Some(password)) = (config.smtp_user, config.smtp_password) {
                    builder = builder.credentials(Credentials::new(user, password));
                }
                info!("Mails will be sent via SMTP server {host}");
                Transport::Smtp(builder.build())
            }
            None => {
                std::fs::create_dir_all(&config.mail_dir)?;
                info!("Mails will be stored in {:?}", config.mail_dir);
                Transport::File(AsyncFileTransport::<Tokio1Executor>::new(config.mail_dir))
            }
        };
        Ok(Mailer { from, transport })
    }

    pub async fn send_confirmation_code(
        &self,
        to_email: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "Hello {username},\n\nuse this code to obtain your access token.\n\nConfirmation code: {code}\n"
        );
        let email = Message::builder()
            .from(self.from.clone())
            .to(to_email.parse()?)
            .subject(CONFIRMATION_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        match &self.transport {
            Transport::Smtp(smtp) => {
                smtp.send(email).await?;
            }
            Transport::File(file) => {
                file.send(email).await?;
            }
        }
        info!(to = to_email, "Confirmation code sent");
        Ok(())
    }
}
