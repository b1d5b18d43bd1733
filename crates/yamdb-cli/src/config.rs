use clap::{Parser, Subcommand};

use crate::commands::{create_user::CreateUserCmd, load_csv::LoadCsvCmd};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "CLI for yamdb - administration commands working directly with the database."
)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bulk load of initial data from CSV files
    LoadCsv(LoadCsvCmd),
    CreateUser(CreateUserCmd),
}

impl crate::commands::Executor for Command {
    async fn run(self) -> anyhow::Result<()> {
        match self {
            Command::LoadCsv(cmd) => cmd.run().await,
            Command::CreateUser(cmd) => cmd.run().await,
        }
    }
}
