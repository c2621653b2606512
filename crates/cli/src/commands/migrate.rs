//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! bc-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/api/migrations/` and are embedded in the
//! API crate as `bullet_cloud_api::db::MIGRATOR`.

use bullet_cloud_api::db::MIGRATOR;

use super::{CommandError, connect};

/// Run all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!(available = MIGRATOR.iter().count(), "Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
