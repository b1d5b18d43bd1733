use std::{path::PathBuf, time::Duration};

pub use clap::Parser;
use yamdb_app::{
    mail::{MailConfig, DEFAULT_SMTP_PORT},
    state::AppConfig,
};
use yamdb_types::config::BackendConfig;

use crate::error::Result;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "YAMDB_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "YAMDB_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[command(flatten)]
    pub backend: BackendConfig,

    #[arg(
        long,
        env = "YAMDB_TOKEN_VALIDITY",
        default_value = "1 day",
        help = "Access token validity in human friendly format (e.g. 1d, 1h, 1m, 1s - or combined)",
        value_parser = humantime::parse_duration
    )]
    pub token_validity: Duration,

    #[arg(
        long,
        env = "YAMDB_CODE_VALIDITY",
        default_value = "1 day",
        help = "How long a confirmation code can be exchanged for a token",
        value_parser = humantime::parse_duration
    )]
    pub confirmation_code_validity: Duration,

    #[arg(
        long,
        env = "YAMDB_DEFAULT_PAGE_SIZE",
        default_value = "10",
        value_parser = clap::value_parser!(u32).range(1..=1000),
        help = "Default page size"
    )]
    pub default_page_size: u32,

    #[arg(long, env = "YAMDB_CORS", help = "Enable permissive CORS")]
    pub cors: bool,

    #[arg(
        long,
        env = "YAMDB_SMTP_HOST",
        help = "SMTP relay for outgoing mail, if not set mails are written to --mail-dir"
    )]
    pub smtp_host: Option<String>,

    #[arg(long, env = "YAMDB_SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,

    #[arg(long, env = "YAMDB_SMTP_USER")]
    pub smtp_user: Option<String>,

    #[arg(long, env = "YAMDB_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    #[arg(
        long,
        env = "YAMDB_MAIL_FROM",
        default_value = "YaMDb <noreply@yamdb.local>",
        help = "Sender of confirmation emails"
    )]
    pub mail_from: String,

    #[arg(
        long,
        env = "YAMDB_MAIL_DIR",
        help = "Directory for outgoing mails when no SMTP host is set, default data_dir/sent_emails"
    )]
    mail_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.backend.data_dir()
    }

    pub fn database_url(&self) -> String {
        self.backend.database_url()
    }

    pub fn mail_dir(&self) -> PathBuf {
        self.mail_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("sent_emails"))
    }

    pub fn mail_config(&self) -> MailConfig {
        MailConfig {
            smtp_host: self.smtp_host.clone(),
            smtp_port: self.smtp_port,
            smtp_user: self.smtp_user.clone(),
            smtp_password: self.smtp_password.clone(),
            from_address: self.mail_from.clone(),
            mail_dir: self.mail_dir(),
        }
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(value: &ServerConfig) -> Self {
        AppConfig {
            default_page_size: value.default_page_size,
            code_validity: value.confirmation_code_validity,
        }
    }
}
