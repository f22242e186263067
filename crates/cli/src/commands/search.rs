//! Search index maintenance.

use emporium_api::services::products::ProductService;

use super::{CliError, Context};

/// Create the index if needed and push every active product into it.
///
/// # Errors
///
/// Returns `CliError::Search` if Elasticsearch is not configured or
/// rejects the request.
pub async fn reindex(ctx: &Context) -> Result<(), CliError> {
    let search = ctx.search()?;
    if !search.is_enabled() {
        tracing::warn!("ELASTICSEARCH_URL is not set; nothing to index");
        return Ok(());
    }

    let result = ProductService::new(&ctx.pool, &search).reindex().await?;
    tracing::info!(indexed = result.indexed, "Reindex complete!");
    Ok(())
}
