//! Local relational mirror of a merchant's commerce data.
//!
//! Remote API → [`fetcher`] → [`normalize`] → [`store`]; [`sync`] ties the
//! three together and [`staleness`] decides when a sync is due.

pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod schema;
pub mod staleness;
pub mod store;
pub mod sync;

pub use fetcher::{fetch_all, FetchError, FetchOutcome, PaginationPolicy, Truncation};
pub use staleness::{StalenessCache, SyncAttempt};
pub use store::{MirrorStore, Row, SqliteMirrorStore};
pub use sync::{
    Collection, CollectionReport, CollectionStatus, SyncError, SyncOrchestrator, SyncReport,
    SyncSettings,
};
