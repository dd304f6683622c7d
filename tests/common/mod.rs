//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, SHIRTS_SQL};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_ask() {
//!     let server = TestServer::spawn(&[SHIRTS_SQL, "You have 12 shirts."]).await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.ask("how many shirts do I have?").await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fakes;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
#[allow(unused_imports)]
pub use fakes::{ScriptedLlm, StubCommerceApi};
pub use server::TestServer;
