//! Hosted object storage client.
//!
//! Talks to the storage REST API of the hosted backend: listing objects under
//! a prefix, removing objects, and building public URLs.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::StorageConfig;

/// Objects requested per list call.
const LIST_PAGE_SIZE: usize = 1000;

/// Errors that can occur when interacting with object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// An object found by [`StorageClient::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Full path inside the bucket.
    pub path: String,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
}

#[derive(Deserialize)]
struct ListEntry {
    name: String,
    /// Folders come back without an id.
    id: Option<String>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    prefixes: &'a [String],
}

/// Object storage client.
#[derive(Clone)]
pub struct StorageClient {
    inner: Arc<StorageClientInner>,
}

struct StorageClientInner {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl StorageClient {
    /// Create a new storage client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let key = config.service_key.expose_secret();
        let mut headers = HeaderMap::new();

        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| StorageError::Parse(format!("Invalid service key format: {e}")))?,
        );
        headers.insert(
            "apikey",
            HeaderValue::from_str(key)
                .map_err(|e| StorageError::Parse(format!("Invalid service key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(StorageClientInner {
                client,
                base_url: config.url.trim_end_matches('/').to_owned(),
                bucket: config.bucket.clone(),
            }),
        })
    }

    /// Public URL of an object in the bucket.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.inner.base_url,
            self.inner.bucket,
            path.trim_start_matches('/')
        )
    }

    /// List every object directly under `prefix` (a folder path ending in `/`).
    ///
    /// # Errors
    ///
    /// Returns error if a request fails or the listing can't be parsed.
    #[instrument(skip(self))]
    pub async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.inner.base_url, self.inner.bucket
        );
        let mut objects = Vec::new();
        let mut offset = 0;

        loop {
            let body = ListRequest {
                prefix,
                limit: LIST_PAGE_SIZE,
                offset,
            };
            let response = self.inner.client.post(&url).json(&body).send().await?;
            let entries: Vec<ListEntry> = self.handle_response(response).await?;
            let count = entries.len();

            objects.extend(
                entries
                    .into_iter()
                    .filter(|entry| entry.id.is_some())
                    .map(|entry| StoredObject {
                        path: join_path(prefix, &entry.name),
                    }),
            );

            if count < LIST_PAGE_SIZE {
                break;
            }
            offset += count;
        }

        debug!(count = objects.len(), "Listed storage objects");
        Ok(objects)
    }

    /// Remove objects by path. Missing objects are not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub async fn delete(&self, paths: &[String]) -> Result<(), StorageError> {
        if paths.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/storage/v1/object/{}",
            self.inner.base_url, self.inner.bucket
        );
        let response = self
            .inner
            .client
            .delete(&url)
            .json(&DeleteRequest { prefixes: paths })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StorageError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StorageError::Parse(format!("Failed to parse response: {e}")));
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("base_url", &self.inner.base_url)
            .field("bucket", &self.inner.bucket)
            .finish_non_exhaustive()
    }
}

/// Storage folder holding a product's uploads.
#[must_use]
pub fn product_prefix(product_id: impl std::fmt::Display) -> String {
    format!("products/{product_id}/")
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client() -> StorageClient {
        StorageClient::new(&StorageConfig {
            url: "https://project.storage.example/".to_string(),
            service_key: SecretString::from("service-role-key"),
            bucket: "product-images".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            client().public_url("products/abc/front.jpg"),
            "https://project.storage.example/storage/v1/object/public/product-images/products/abc/front.jpg"
        );
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("products/a/", "x.jpg"), "products/a/x.jpg");
        assert_eq!(join_path("products/a", "x.jpg"), "products/a/x.jpg");
        assert_eq!(join_path("", "x.jpg"), "x.jpg");
    }

    #[test]
    fn test_product_prefix() {
        assert_eq!(product_prefix("42"), "products/42/");
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("service-role-key"));
    }
}
