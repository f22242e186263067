//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::scraper::{PriceScraper, ScrapeError};
use crate::search::{SearchClient, SearchError};
use crate::services::auth::JwtKeys;
use crate::services::uploads::UploadService;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("search client: {0}")]
    Search(#[from] SearchError),
    #[error("price scraper: {0}")]
    Scraper(#[from] ScrapeError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    jwt: JwtKeys,
    search: SearchClient,
    scraper: PriceScraper,
    uploads: UploadService,
}

impl AppState {
    /// Create the state. Search availability is not probed here; see
    /// [`SearchClient::probe`].
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let jwt = JwtKeys::new(&config.jwt);
        let search = SearchClient::from_config(config.search.as_ref())?;
        let scraper = PriceScraper::new(&config.scraper)?;
        let uploads = UploadService::new(&config.uploads);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                jwt,
                search,
                scraper,
                uploads,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }

    #[must_use]
    pub fn search(&self) -> &SearchClient {
        &self.inner.search
    }

    #[must_use]
    pub fn scraper(&self) -> &PriceScraper {
        &self.inner.scraper
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadService {
        &self.inner.uploads
    }
}
