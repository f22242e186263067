//! Database migrations.
//!
//! Migrations live in `crates/api/migrations/` and are embedded into the
//! API crate at build time.

use emporium_api::db::MIGRATOR;

use super::{CliError, Context};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CliError::Migrate` if a migration fails or the recorded
/// history diverges from the embedded files.
pub async fn run(ctx: &Context) -> Result<(), CliError> {
    tracing::info!(available = MIGRATOR.iter().count(), "Running migrations...");
    MIGRATOR.run(&ctx.pool).await?;
    tracing::info!("Migrations complete!");
    Ok(())
}
