//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Liveness
    // ========================================================================

    pub async fn health(&self) -> Response {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .expect("Health request failed")
    }

    // ========================================================================
    // Questions
    // ========================================================================

    /// Asks a question about the fixture store
    pub async fn ask(&self, question: &str) -> Response {
        self.post_ask(json!({
            "store_id": STORE_ID,
            "question": question,
            "shopify_token": STORE_TOKEN,
        }))
        .await
    }

    /// Posts an arbitrary body to the ask endpoint
    pub async fn post_ask(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/v1/ask", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Ask request failed")
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Runs a full sync of the fixture store
    pub async fn ingest(&self, since_days: Option<u32>) -> Response {
        let mut body = json!({
            "store_id": STORE_ID,
            "shopify_token": STORE_TOKEN,
        });
        if let Some(days) = since_days {
            body["since_days"] = json!(days);
        }
        self.post_ingest(body).await
    }

    /// Posts an arbitrary body to the ingest endpoint
    pub async fn post_ingest(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/v1/ingest", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Ingest request failed")
    }
}
