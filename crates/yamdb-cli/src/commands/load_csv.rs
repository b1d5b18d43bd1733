use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;
use yamdb_dal::import::CsvLoader;
use yamdb_types::config::BackendConfig;

use crate::commands::Executor;

#[derive(Parser, Debug)]
pub struct LoadCsvCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(
        long,
        env = "YAMDB_CSV_DIR",
        help = "Directory with genre.csv, category.csv, titles.csv, genre_title.csv, users.csv, review.csv and comments.csv, default data_dir/static/data"
    )]
    csv_dir: Option<PathBuf>,
}

impl LoadCsvCmd {
    fn csv_dir(&self) -> PathBuf {
        self.csv_dir
            .clone()
            .unwrap_or_else(|| self.backend.data_dir().join("static").join("data"))
    }
}

impl Executor for LoadCsvCmd {
    async fn run(self) -> anyhow::Result<()> {
        self.backend.ensure_data_dir()?;
        let pool = yamdb_dal::new_pool(&self.backend.database_url()).await?;
        yamdb_dal::migrate(&pool).await?;

        let loader = CsvLoader::new(self.csv_dir());
        let stats = loader
            .load(&pool)
            .await
            .with_context(|| format!("Loading CSV files from {:?} failed", loader.dir()))?;
        info!("Import finished: {stats:?}");
        Ok(())
    }
}
