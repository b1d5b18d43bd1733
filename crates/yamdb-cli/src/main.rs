use clap::Parser;
use tracing_subscriber::EnvFilter;
use yamdb_cli::{config::CliConfig, run::run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let config = CliConfig::parse();

    run(config).await
}
