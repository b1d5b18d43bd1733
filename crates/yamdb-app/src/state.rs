use std::{sync::Arc, time::Duration};

use yamdb_auth::token::TokenManager;
use yamdb_dal::Pool;

use crate::mail::Mailer;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool, tokens: TokenManager, mailer: Mailer) -> Self {
        AppState {
            state: Arc::new(AppStateInner {
                pool,
                tokens,
                mailer,
                app_config,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.state.tokens
    }

    pub fn mailer(&self) -> &Mailer {
        &self.state.mailer
    }
}

struct AppStateInner {
    pool: Pool,
    tokens: TokenManager,
    mailer: Mailer,
    app_config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_page_size: u32,
    /// How long an issued confirmation code can be exchanged for a token
    pub code_validity: Duration,
}
