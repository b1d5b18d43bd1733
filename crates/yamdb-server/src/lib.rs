pub mod config;
pub mod error;
pub mod run;

use std::path::Path;

use config::ServerConfig;
pub use error::{Error, Result};
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::info;
use yamdb_app::{
    mail::Mailer,
    state::{AppConfig, AppState},
};

const SECRET_LEN: usize = 32;

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    // Its OK here to block, as it's short and called only on init
    let data_dir = config.backend.ensure_data_dir()?;
    let app_config: AppConfig = config.into();

    let pool = yamdb_dal::new_pool(&config.database_url()).await?;
    yamdb_dal::migrate(&pool).await?;
    info!("Database ready");

    let secret = read_secret(&data_dir).await?;
    if secret.len() < SECRET_LEN {
        anyhow::bail!("Secret file in {data_dir:?} is too short");
    }
    let tokens = yamdb_auth::token::TokenManager::new(&secret, config.token_validity);
    let mailer = Mailer::new(config.mail_config())?;
    Ok(AppState::new(app_config, pool, tokens, mailer))
}

async fn read_secret(data_dir: &Path) -> Result<Vec<u8>, std::io::Error> {
    let secret_file = data_dir.join("secret");

    let secret = if fs::try_exists(&secret_file).await? {
        fs::read(&secret_file).await?
    } else {
        let random_bytes = rand::random::<[u8; SECRET_LEN]>();
        #[cfg(unix)]
        let mut file = {
            use std::fs::OpenOptions;
            use std::os::unix::fs::OpenOptionsExt;
            {
                // Make sure the file is only accessible by the current user
                let _f = OpenOptions::new()
                    .mode(0o600)
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&secret_file)?;
            }
            fs::File::options().write(true).open(&secret_file).await?
        };
        #[cfg(not(unix))]
        let mut file = fs::File::create(&secret_file).await?;

        file.write_all(&random_bytes).await?;
        info!("Generated new secret in {secret_file:?}");
        random_bytes.to_vec()
    };
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_secret_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let first = read_secret(dir.path()).await.unwrap();
        assert_eq!(first.len(), SECRET_LEN);
        let second = read_secret(dir.path()).await.unwrap();
        assert_eq!(first, second);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let meta = std::fs::metadata(dir.path().join("secret")).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }
    }
}
