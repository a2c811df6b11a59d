//! GCP Client
//!
//! Combines a token source with the HTTP client and knows the REST
//! endpoints used for counting.

use super::auth::{AccessToken, GcpCredentials};
use super::http::{GcpHttpClient, HttpError};
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

pub const RESOURCE_MANAGER_BASE: &str = "https://cloudresourcemanager.googleapis.com";
pub const CLOUD_ASSET_BASE: &str = "https://cloudasset.googleapis.com";

/// Base URLs of the APIs, overridable for emulators and tests
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub resource_manager: String,
    pub cloud_asset: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            resource_manager: RESOURCE_MANAGER_BASE.to_string(),
            cloud_asset: CLOUD_ASSET_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Point both APIs at the same base URL
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            resource_manager: base.clone(),
            cloud_asset: base,
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    token: Arc<dyn AccessToken>,
    http: GcpHttpClient,
    endpoints: Endpoints,
}

impl GcpClient {
    /// Create a client using Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;
        Self::with_token(Arc::new(credentials), Endpoints::default())
    }

    pub fn with_token(token: Arc<dyn AccessToken>, endpoints: Endpoints) -> Result<Self> {
        Ok(Self {
            token,
            http: GcpHttpClient::new()?,
            endpoints,
        })
    }

    /// Make an authenticated GET request
    pub async fn get(&self, url: &str) -> Result<Value, HttpError> {
        let token = self
            .token
            .token()
            .await
            .map_err(|e| HttpError::Auth(format!("{:#}", e)))?;
        self.http.get(url, &token).await
    }

    /// Follow `nextPageToken` and collect the `items_key` arrays of every page
    pub async fn get_all_pages(&self, url: &str, items_key: &str) -> Result<Vec<Value>, HttpError> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_url = match &page_token {
                Some(token) => with_query(url, "pageToken", token),
                None => url.to_string(),
            };
            let response = self.get(&page_url).await?;

            if let Some(items) = response.get(items_key).and_then(|v| v.as_array()) {
                all_items.extend(items.iter().cloned());
            }

            page_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            if page_token.is_none() {
                break;
            }
        }

        Ok(all_items)
    }

    /// Build Resource Manager API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.resource_manager, path)
    }

    /// Build Cloud Asset API URL
    pub fn cloudasset_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.cloud_asset, path)
    }
}

/// Append one encoded query parameter
pub fn with_query(url: &str, key: &str, value: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, sep, key, urlencoding::encode(value))
}
