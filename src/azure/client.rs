//! Azure client
//!
//! Main client for Resource Manager calls, combining authentication, the
//! HTTP layer, and the per-endpoint api-version table. Also owns pagination
//! over ARM list responses.

use anyhow::Result;
use serde_json::Value;

use super::auth::Credentials;
use super::http::{interpret, AzureHttpClient, Method, RequestBody};
use crate::config::ApiVersions;

/// Resource Manager endpoint
pub const MANAGEMENT_BASE_URL: &str = "https://management.azure.com";

/// Main Azure client
#[derive(Clone)]
pub struct AzureClient {
    pub credentials: Credentials,
    pub http: AzureHttpClient,
    pub versions: ApiVersions,
    base_url: String,
}

impl AzureClient {
    /// Create a new client against the public management endpoint
    pub fn new(versions: ApiVersions) -> Result<Self> {
        Self::with_base_url(versions, MANAGEMENT_BASE_URL)
    }

    /// Create a client against an explicit endpoint (tests point this at a
    /// mock server)
    pub fn with_base_url(versions: ApiVersions, base_url: &str) -> Result<Self> {
        Ok(Self {
            credentials: Credentials::new(),
            http: AzureHttpClient::new()?,
            versions,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET an ARM path relative to the management endpoint
    pub async fn get(&self, path: &str, api_version: &str, api_name: &str) -> Result<Value> {
        let token = self.credentials.token().await?;
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .request(
                Method::Get,
                &url,
                &[("api-version", api_version)],
                &token,
                RequestBody::None,
                None,
            )
            .await?;
        Ok(interpret(api_name, response)?)
    }

    /// GET an absolute URL. Used for `nextLink` continuations, which already
    /// embed every required query parameter including the api-version.
    pub async fn get_absolute(&self, url: &str, api_name: &str) -> Result<Value> {
        let token = self.credentials.token().await?;
        let response = self
            .http
            .request(Method::Get, url, &[], &token, RequestBody::None, None)
            .await?;
        Ok(interpret(api_name, response)?)
    }

    /// POST an empty-body "list" action. Azure requires POST for the
    /// connection-string and app-setting reads.
    pub async fn post_action(
        &self,
        path: &str,
        api_version: &str,
        api_name: &str,
    ) -> Result<Value> {
        let token = self.credentials.token().await?;
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .request(
                Method::Post,
                &url,
                &[("api-version", api_version)],
                &token,
                RequestBody::None,
                None,
            )
            .await?;
        Ok(interpret(api_name, response)?)
    }

    /// GET a list endpoint and follow its `nextLink` chain until exhausted,
    /// concatenating every page's `value` items in order.
    ///
    /// No cycle detection: a server that keeps returning the same link loops
    /// forever.
    pub async fn get_paged(
        &self,
        path: &str,
        api_version: &str,
        api_name: &str,
    ) -> Result<Vec<Value>> {
        let mut page = self.get(path, api_version, api_name).await?;
        let mut items = page_items(&page);

        while let Some(link) = next_link(&page) {
            page = self.get_absolute(&link, api_name).await?;
            items.extend(page_items(&page));
        }

        Ok(items)
    }
}

fn page_items(page: &Value) -> Vec<Value> {
    page.get("value")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn next_link(page: &Value) -> Option<String> {
    page.get("nextLink")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
