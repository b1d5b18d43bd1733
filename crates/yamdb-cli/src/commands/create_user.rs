use clap::Parser;
use tracing::info;
use yamdb_dal::user::{CreateUser, UserRepository};
use yamdb_types::{
    claim::Role,
    config::BackendConfig,
    general::{ValidEmail, ValidUsername},
};

use crate::commands::Executor;

#[derive(Parser, Debug)]
pub struct CreateUserCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(short, long, help = "Username, must not be \"me\"")]
    username: ValidUsername,
    #[arg(short, long, help = "User email")]
    pub email: ValidEmail,
    #[arg(short, long, default_value = "user", help = "Role of the user: user, moderator or admin")]
    pub role: Role,
    #[arg(long, help = "Superuser has all rights regardless of role")]
    pub superuser: bool,
}

impl Executor for CreateUserCmd {
    async fn run(self) -> anyhow::Result<()> {
        self.backend.ensure_data_dir()?;
        let pool = yamdb_dal::new_pool(&self.backend.database_url()).await?;
        yamdb_dal::migrate(&pool).await?;
        let repository = UserRepository::new(pool);
        let new_user = CreateUser {
            username: self.username,
            email: self.email,
            first_name: None,
            last_name: None,
            bio: None,
            role: self.role,
        };
        let user = repository.create(new_user).await?;
        if self.superuser {
            repository.set_superuser(user.id, true).await?;
        }
        info!(
            "Created user {} with role {}{}",
            user.username,
            user.role,
            if self.superuser { " (superuser)" } else { "" }
        );

        Ok(())
    }
}
