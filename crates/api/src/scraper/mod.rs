//! Competitor price scraper.
//!
//! Fetches a product page and pulls the price out of it (see [`extract`]).
//! Results are cached per URL for ten minutes so repeated comparisons don't
//! hammer the remote site.

pub mod extract;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use emporium_core::{Money, ProductId};

use crate::config::ScraperConfig;
use crate::error::AppError;
use crate::models::product::Product;

pub use extract::{ExtractedPrice, PriceSource, extract_price};

const CACHE_TTL: Duration = Duration::from_secs(600);
const CACHE_CAPACITY: u64 = 1000;
const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("only http and https urls can be checked, got '{0}'")]
    UnsupportedScheme(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote site answered with status {0}")]
    Status(u16),

    #[error("page is larger than {MAX_PAGE_BYTES} bytes")]
    TooLarge,

    #[error("price not found")]
    PriceNotFound,
}

impl From<ScrapeError> for AppError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::InvalidUrl(_)
            | ScrapeError::UnsupportedScheme(_)
            | ScrapeError::PriceNotFound => Self::BadRequest(err.to_string()),
            ScrapeError::Http(_) | ScrapeError::Status(_) | ScrapeError::TooLarge => {
                Self::Upstream(err.to_string())
            }
        }
    }
}

/// A price found on a remote page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedPrice {
    pub url: String,
    pub price: Money,
    pub currency: Option<String>,
    pub source: PriceSource,
    pub fetched_at: DateTime<Utc>,
}

/// Our price next to a competitor's.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparison {
    pub product_id: ProductId,
    pub product_name: String,
    pub our_price: Money,
    pub their_price: Money,
    /// `our_price - their_price`; positive when we are more expensive.
    pub difference: Decimal,
    /// Difference relative to their price, rounded to one decimal place.
    pub difference_percent: Option<Decimal>,
    pub scraped: ScrapedPrice,
}

impl PriceComparison {
    #[must_use]
    pub fn new(product: &Product, scraped: ScrapedPrice) -> Self {
        let ours = product.price.amount();
        let theirs = scraped.price.amount();
        let difference = ours - theirs;
        let difference_percent = (!theirs.is_zero())
            .then(|| (difference * Decimal::ONE_HUNDRED / theirs).round_dp(1));
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            our_price: product.price,
            their_price: scraped.price,
            difference,
            difference_percent,
            scraped,
        }
    }
}

/// HTTP client plus per-URL result cache.
#[derive(Clone)]
pub struct PriceScraper {
    inner: Arc<PriceScraperInner>,
}

struct PriceScraperInner {
    client: reqwest::Client,
    cache: Cache<String, ScrapedPrice>,
}

impl PriceScraper {
    /// Build the scraper.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(PriceScraperInner { client, cache }),
        })
    }

    /// Fetch `url` and extract its price.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] for bad URLs, transport failures, non-2xx
    /// responses, and pages without a recognisable price.
    #[instrument(skip(self))]
    pub async fn check(&self, url: &str) -> Result<ScrapedPrice, ScrapeError> {
        let url = parse_target(url)?;
        let key = url.to_string();

        if let Some(cached) = self.inner.cache.get(&key).await {
            tracing::debug!("Price cache hit");
            return Ok(cached);
        }

        let html = self.fetch(url).await?;
        let found = extract_price(&html).ok_or(ScrapeError::PriceNotFound)?;
        let scraped = ScrapedPrice {
            url: key.clone(),
            price: found.price,
            currency: found.currency,
            source: found.source,
            fetched_at: Utc::now(),
        };

        tracing::info!(price = %scraped.price, source = ?scraped.source, "Scraped price");
        self.inner.cache.insert(key, scraped.clone()).await;
        Ok(scraped)
    }

    async fn fetch(&self, url: Url) -> Result<String, ScrapeError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Remote page request failed");
            return Err(ScrapeError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_PAGE_BYTES as u64)
        {
            return Err(ScrapeError::TooLarge);
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_PAGE_BYTES {
            return Err(ScrapeError::TooLarge);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn parse_target(raw: &str) -> Result<Url, ScrapeError> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ScrapeError::UnsupportedScheme(other.to_owned())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_http_schemes() {
        assert!(parse_target("https://shop.example/item/1").is_ok());
        assert!(parse_target(" http://shop.example ").is_ok());
        assert!(matches!(
            parse_target("file:///etc/passwd"),
            Err(ScrapeError::UnsupportedScheme(s)) if s == "file"
        ));
        assert!(matches!(
            parse_target("not a url"),
            Err(ScrapeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_error_statuses() {
        use axum::http::StatusCode;

        let err: AppError = ScrapeError::Status(404).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err: AppError = ScrapeError::PriceNotFound.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "price not found");
    }

    #[tokio::test]
    async fn test_rejected_url_never_fetched() {
        let scraper = PriceScraper::new(&ScraperConfig::default()).unwrap();
        let err = scraper.check("ftp://example.com/price").await.unwrap_err();
        assert!(matches!(err, ScrapeError::UnsupportedScheme(_)));
    }
}
