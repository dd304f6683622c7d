//! Commerce Analytics Server Library
//!
//! Mirrors a merchant's commerce data into SQLite and answers plain-language
//! questions about it. This library exposes the internal modules for testing
//! and potential reuse.

pub mod commerce_api;
pub mod config;
pub mod llm;
pub mod mirror;
pub mod query;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use mirror::{SqliteMirrorStore, StalenessCache, SyncOrchestrator};
pub use query::QueryOrchestrator;
pub use server::{run_server, RequestsLoggingLevel};
