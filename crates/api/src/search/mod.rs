//! Product search backed by Elasticsearch.
//!
//! Search is optional. Without `ELASTICSEARCH_URL` the client is disabled;
//! with it, availability is probed at start-up and re-checked whenever a call
//! fails. While unavailable, indexing calls are no-ops and queries return
//! `None` so callers can fall back to the database.

mod document;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use emporium_core::ProductId;

pub use document::ProductDocument;

use crate::config::SearchConfig;
use crate::models::product::Product;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the Elasticsearch HTTP API.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Elasticsearch answered with an error status.
    #[error("Elasticsearch error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Search is not configured or not reachable.
    #[error("search is unavailable")]
    Unavailable,
}

struct Backend {
    client: reqwest::Client,
    base_url: String,
    index: String,
    available: AtomicBool,
}

/// Elasticsearch client. Cheap to clone.
#[derive(Clone, Default)]
pub struct SearchClient {
    backend: Option<Arc<Backend>>,
}

impl std::fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("enabled", &self.backend.is_some())
            .field("available", &self.is_available())
            .finish()
    }
}

impl SearchClient {
    /// A client that never reaches Elasticsearch.
    #[must_use]
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Build a client for the configured cluster. Call [`Self::probe`] before
    /// relying on [`Self::is_available`].
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Http` if the HTTP client fails to build.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            backend: Some(Arc::new(Backend {
                client,
                base_url: config.url.clone(),
                index: config.index.clone(),
                available: AtomicBool::new(false),
            })),
        })
    }

    /// Build from optional configuration.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Http` if the HTTP client fails to build.
    pub fn from_config(config: Option<&SearchConfig>) -> Result<Self, SearchError> {
        config.map_or_else(|| Ok(Self::disabled()), Self::new)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|b| b.available.load(Ordering::Relaxed))
    }

    fn mark(&self, available: bool) {
        if let Some(backend) = &self.backend {
            let was = backend.available.swap(available, Ordering::Relaxed);
            if was && !available {
                tracing::warn!("Elasticsearch marked unavailable");
            } else if !was && available {
                tracing::info!(index = %backend.index, "Elasticsearch available");
            }
        }
    }

    /// Ping the cluster and record whether it answered.
    pub async fn probe(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        let ok = match backend.client.get(&backend.base_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Elasticsearch probe failed");
                false
            }
        };
        self.mark(ok);
        ok
    }

    /// Backend to use for a call, re-probing once if it was marked down.
    async fn ready(&self) -> Option<&Backend> {
        let backend = self.backend.as_deref()?;
        if backend.available.load(Ordering::Relaxed) || self.probe().await {
            Some(backend)
        } else {
            None
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, SearchError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.mark(false);
                return Err(e.into());
            }
        };
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Create the index with its mapping unless it exists.
    ///
    /// # Errors
    ///
    /// Returns `SearchError` if Elasticsearch rejects the request.
    #[instrument(skip(self))]
    pub async fn ensure_index(&self) -> Result<(), SearchError> {
        let backend = self.ready().await.ok_or(SearchError::Unavailable)?;
        let url = format!("{}/{}", backend.base_url, backend.index);

        let exists = backend
            .client
            .head(&url)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success());
        if exists {
            return Ok(());
        }

        self.send(backend.client.put(&url).json(&document::index_mapping()))
            .await?;
        tracing::info!(index = %backend.index, "Created search index");
        Ok(())
    }

    /// Index or replace one product. Failures are logged, not returned.
    pub async fn index_product(&self, product: &Product) {
        let Some(backend) = self.ready().await else {
            return;
        };
        let url = format!(
            "{}/{}/_doc/{}",
            backend.base_url, backend.index, product.id
        );
        let doc = ProductDocument::from(product);
        if let Err(e) = self.send(backend.client.put(&url).json(&doc)).await {
            tracing::warn!(product_id = %product.id, error = %e, "Failed to index product");
        }
    }

    /// Remove one product. Failures are logged, not returned.
    pub async fn remove_product(&self, id: ProductId) {
        let Some(backend) = self.ready().await else {
            return;
        };
        let url = format!("{}/{}/_doc/{id}", backend.base_url, backend.index);
        match self.send(backend.client.delete(&url)).await {
            Ok(_) | Err(SearchError::Api { status: 404, .. }) => {}
            Err(e) => tracing::warn!(product_id = %id, error = %e, "Failed to remove product"),
        }
    }

    /// Replace the index contents with `products` in one `_bulk` request.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Unavailable` when search is off, or the
    /// Elasticsearch error.
    #[instrument(skip(self, products), fields(count = products.len()))]
    pub async fn bulk_index(&self, products: &[Product]) -> Result<usize, SearchError> {
        self.ensure_index().await?;
        let backend = self.ready().await.ok_or(SearchError::Unavailable)?;

        if products.is_empty() {
            return Ok(0);
        }

        let body = document::bulk_body(&backend.index, products);
        let url = format!("{}/_bulk?refresh=true", backend.base_url);
        let result = self
            .send(
                backend
                    .client
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                    .body(body),
            )
            .await?;

        if result["errors"].as_bool().unwrap_or(false) {
            tracing::warn!("Bulk index reported item errors");
        }
        Ok(products.len())
    }

    /// Ranked product ids for `query`, or `None` when search is unavailable
    /// or the query failed.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: u32) -> Option<Vec<ProductId>> {
        let backend = self.ready().await?;
        let url = format!("{}/{}/_search", backend.base_url, backend.index);
        match self
            .send(backend.client.post(&url).json(&search_body(query, limit)))
            .await
        {
            Ok(body) => Some(hit_ids(&body)),
            Err(e) => {
                tracing::warn!(error = %e, "Search query failed; falling back");
                None
            }
        }
    }
}

/// `multi_match` over name, SKU, description and category.
fn search_body(query: &str, limit: u32) -> Value {
    json!({
        "size": limit,
        "_source": false,
        "query": {
            "bool": {
                "must": {
                    "multi_match": {
                        "query": query,
                        "fields": ["name^3", "sku^2", "description", "category"],
                        "fuzziness": "AUTO"
                    }
                },
                "filter": { "term": { "isActive": true } }
            }
        }
    })
}

/// Product ids of the hits, in rank order.
fn hit_ids(body: &Value) -> Vec<ProductId> {
    body["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit["_id"].as_str()?.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_weights_fields() {
        let body = search_body("kettle", 10);
        assert_eq!(body["size"], 10);
        let fields = &body["query"]["bool"]["must"]["multi_match"]["fields"];
        assert_eq!(fields[0], "name^3");
        assert_eq!(body["query"]["bool"]["must"]["multi_match"]["fuzziness"], "AUTO");
    }

    #[test]
    fn test_hit_ids_keeps_rank_order() {
        let body = json!({"hits": {"hits": [{"_id": "9"}, {"_id": "2"}, {"_id": "x"}, {"_id": "5"}]}});
        let ids: Vec<i32> = hit_ids(&body).into_iter().map(|id| id.as_i32()).collect();
        assert_eq!(ids, vec![9, 2, 5]);
    }

    #[test]
    fn test_hit_ids_tolerates_missing_hits() {
        assert!(hit_ids(&json!({"error": "boom"})).is_empty());
    }

    #[tokio::test]
    async fn test_disabled_client_is_inert() {
        let client = SearchClient::disabled();
        assert!(!client.is_enabled());
        assert!(!client.probe().await);
        assert!(client.search("kettle", 5).await.is_none());
        assert!(matches!(
            client.bulk_index(&[]).await,
            Err(SearchError::Unavailable)
        ));
    }
}
