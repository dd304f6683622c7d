//! Commerce Admin API seam.
//!
//! The rest of the crate only needs "run this GraphQL document for this
//! store"; pagination, normalization and persistence live in [`crate::mirror`].

mod client;
pub mod models;
pub mod queries;

pub use client::{CommerceApi, GraphqlCommerceClient};

use thiserror::Error;

/// Errors raised by the commerce API transport.
#[derive(Debug, Error)]
pub enum CommerceApiError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Commerce API error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
