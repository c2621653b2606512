//! CLI subcommand implementations.

pub mod migrate;
pub mod order;

use bullet_cloud_api::config::DatabasePoolConfig;
use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by every database-backed command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The order operation was rejected.
    #[error(transparent)]
    Order(#[from] bullet_cloud_api::services::ServiceError),
}

/// Connect using `API_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("API_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("API_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool =
        bullet_cloud_api::db::create_pool(&database_url, DatabasePoolConfig::default()).await?;
    Ok(pool)
}
