//! Command implementations.

pub mod migrate;
pub mod search;
pub mod seed;
pub mod users;

use sqlx::PgPool;
use thiserror::Error;

use emporium_api::config::{ApiConfig, ConfigError};
use emporium_api::db;
use emporium_api::error::AppError;
use emporium_api::search::{SearchClient, SearchError};
use emporium_api::services::auth::AuthError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    App(#[from] AppError),

    #[error("Invalid seed data: {0}")]
    Seed(String),
}

/// Configuration and connections shared by every command.
pub struct Context {
    pub config: ApiConfig,
    pub pool: PgPool,
}

impl Context {
    /// Read the server environment and open a pool.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` for missing variables and
    /// `CliError::Database` when Postgres is unreachable.
    pub async fn load() -> Result<Self, CliError> {
        let config = ApiConfig::from_env()?;
        tracing::info!("Connecting to database...");
        let pool = db::create_pool(&config.database_url).await?;
        Ok(Self { config, pool })
    }

    /// # Errors
    ///
    /// Returns `CliError::Search` if the configured URL is unusable.
    pub fn search(&self) -> Result<SearchClient, CliError> {
        Ok(SearchClient::from_config(self.config.search.as_ref())?)
    }
}
