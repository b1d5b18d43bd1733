use std::{path::Path, time::Duration};

use anyhow::{anyhow, Result};
use rand::Rng as _;
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use tempfile::TempDir;
use tracing::debug;
use yamdb_dal::user::{CreateUser, User, UserRepository};
use yamdb_server::config::{Parser, ServerConfig};
use yamdb_types::claim::Role;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str, base_dir: &Path) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix_in(format!("{}_", test_name), base_dir)?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?.to_string();
    let args = &[
        "yamdb-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--default-page-size",
        "10",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

/// Config with fresh data directory and migrated database
pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let base_dir = std::env::temp_dir();
    let (config, guard) = test_config(test_name, &base_dir)?;
    config.backend.ensure_data_dir()?;
    let pool = yamdb_dal::new_pool(&config.database_url()).await?;
    yamdb_dal::migrate(&pool).await?;
    pool.close().await;
    Ok((config, guard))
}

pub fn base_url(config: &ServerConfig) -> Result<Url> {
    Url::parse(&format!("http://127.0.0.1:{}/api/v1/", config.port)).map_err(|e| e.into())
}

pub async fn spawn_server(config: ServerConfig) -> Result<()> {
    let port = config.port;
    let state = yamdb_server::build_state(&config).await?;
    tokio::spawn(async move {
        let res = yamdb_server::run::run_graceful_with_state(
            config,
            state,
            futures::future::pending(),
        )
        .await;
        if let Err(e) = res {
            tracing::error!("Server failed: {e}");
        }
    });

    let health_url = format!("http://127.0.0.1:{port}/health");
    let client = reqwest::Client::new();
    for _ in 0..50 {
        match client.get(&health_url).send().await {
            Ok(response) if response.status() == StatusCode::OK => return Ok(()),
            Ok(response) => debug!("Server not ready: {}", response.status()),
            Err(e) => debug!("Server not ready: {e}"),
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(anyhow!("Server did not start"))
}

pub async fn user_repository(config: &ServerConfig) -> Result<UserRepository> {
    let pool = yamdb_dal::new_pool(&config.database_url()).await?;
    Ok(UserRepository::new(pool))
}

pub async fn create_user(
    config: &ServerConfig,
    username: &str,
    role: Role,
    superuser: bool,
) -> Result<User> {
    let repository = user_repository(config).await?;
    let user = repository
        .create(CreateUser {
            username: username.parse()?,
            email: format!("{username}@example.com").parse()?,
            first_name: None,
            last_name: None,
            bio: None,
            role,
        })
        .await?;
    if superuser {
        repository.set_superuser(user.id, true).await?;
    }
    Ok(user)
}

/// Issues a confirmation code directly in database and exchanges it for an access token
pub async fn obtain_token(config: &ServerConfig, user: &User) -> Result<String> {
    let repository = user_repository(config).await?;
    let code = format!("code-for-{}", user.username);
    repository.issue_code(user.id, &code).await?;

    let response = reqwest::Client::new()
        .post(base_url(config)?.join("auth/token")?)
        .json(&json!({"username": user.username, "confirmation_code": code}))
        .send()
        .await?;
    if response.status() != StatusCode::OK {
        return Err(anyhow!("Token request failed: {}", response.status()));
    }
    let body: Value = response.json().await?;
    body["access"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("No access token in response"))
}

/// User with a valid token, ready for API calls
pub async fn logged_user(config: &ServerConfig, username: &str, role: Role) -> Result<(User, String)> {
    let user = create_user(config, username, role, false).await?;
    let token = obtain_token(config, &user).await?;
    Ok((user, token))
}

/// Confirmation codes from all mails written for the recipient
pub fn read_sent_codes(mail_dir: &Path, email: &str) -> Result<Vec<String>> {
    let recipient = format!("To: {email}");
    let mut codes = Vec::new();
    for entry in std::fs::read_dir(mail_dir)? {
        let path = entry?.path();
        if !path.extension().map(|e| e == "eml").unwrap_or(false) {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        if !content.lines().any(|l| l == recipient) {
            continue;
        }
        if let Some(code) = content
            .lines()
            .find_map(|l| l.strip_prefix("Confirmation code: "))
        {
            codes.push(code.trim().to_string());
        }
    }
    Ok(codes)
}

pub fn auth(token: &str) -> String {
    format!("Bearer {token}")
}
