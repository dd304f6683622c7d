//! HTTP client for the commerce Admin GraphQL API.

use super::CommerceApiError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Header carrying the per-store access token.
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Transport seam for the commerce API: run one GraphQL document against one store.
///
/// Implementations return the full response body (`data` and, if present,
/// `errors`). GraphQL-level errors are not transport errors; interpreting them
/// is up to the caller.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    async fn execute(
        &self,
        store_id: &str,
        token: &str,
        query: &str,
        variables: &Value,
    ) -> Result<Value, CommerceApiError>;
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "is_empty_object")]
    variables: &'a Value,
}

fn is_empty_object(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// reqwest-backed [`CommerceApi`].
pub struct GraphqlCommerceClient {
    client: reqwest::Client,
    endpoint_template: String,
}

impl GraphqlCommerceClient {
    /// Default endpoint. `{store}` is the store's domain, `{version}` the API version.
    pub const DEFAULT_ENDPOINT: &'static str = "https://{store}/admin/api/{version}/graphql.json";

    /// Create a client for the given API version (e.g. "2024-01").
    pub fn new(api_version: &str, timeout: Duration) -> Result<Self> {
        Self::with_endpoint(Self::DEFAULT_ENDPOINT, api_version, timeout)
    }

    /// Create a client against a custom endpoint template, e.g. a local stub
    /// `http://127.0.0.1:8080/{store}/graphql`.
    pub fn with_endpoint(template: &str, api_version: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint_template: template.replace("{version}", api_version),
        })
    }

    pub fn endpoint_for(&self, store_id: &str) -> String {
        self.endpoint_template.replace("{store}", store_id)
    }
}

#[async_trait]
impl CommerceApi for GraphqlCommerceClient {
    async fn execute(
        &self,
        store_id: &str,
        token: &str,
        query: &str,
        variables: &Value,
    ) -> Result<Value, CommerceApiError> {
        let url = self.endpoint_for(store_id);
        debug!(store_id, %url, "Sending GraphQL request");

        let response = self
            .client
            .post(&url)
            .header(ACCESS_TOKEN_HEADER, token)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CommerceApiError::Timeout
                } else {
                    CommerceApiError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommerceApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CommerceApiError::InvalidResponse(e.to_string()))
    }
}
