//! Brings one store's mirror up to date.
//!
//! Orders, products and shop are processed in that order, one after the
//! other. Each collection is isolated: a failure in one is recorded in the
//! [`SyncReport`] and the next collection still runs.

use super::fetcher::{fetch_all, FetchError, PaginationPolicy, Truncation};
use super::normalize::{normalize_orders, normalize_products, normalize_shop};
use super::store::MirrorStore;
use crate::commerce_api::queries::{
    orders_since_filter, ORDERS_PATH, ORDERS_QUERY, PRODUCTS_PATH, PRODUCTS_QUERY, SHOP_QUERY,
};
use crate::commerce_api::{CommerceApi, CommerceApiError};
use crate::server::metrics;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Orders,
    Products,
    Shop,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Products => "products",
            Collection::Shop => "shop",
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Commerce API request failed: {0}")]
    Upstream(#[from] CommerceApiError),

    #[error("Failed to persist {table}: {source}")]
    Persist {
        table: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionStatus {
    Complete,
    /// Some data was written, but pagination stopped early.
    Truncated { reason: Truncation },
    Failed { error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct CollectionReport {
    pub collection: Collection,
    #[serde(flatten)]
    pub status: CollectionStatus,
    pub pages: usize,
    /// Rows written per table.
    pub written: BTreeMap<&'static str, usize>,
}

impl CollectionReport {
    fn outcome_label(&self) -> &'static str {
        match self.status {
            CollectionStatus::Complete => "complete",
            CollectionStatus::Truncated { .. } => "truncated",
            CollectionStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub store_id: String,
    pub collections: Vec<CollectionReport>,
    pub duration_ms: u64,
}

impl SyncReport {
    /// True only when every collection was fetched to the end and persisted.
    pub fn is_complete(&self) -> bool {
        self.collections
            .iter()
            .all(|c| c.status == CollectionStatus::Complete)
    }

    /// True when every collection got an answer from the upstream and was
    /// persisted. An `errors` payload, a missing key or a stalled cursor
    /// still settles: the data is partial but retrying right away would
    /// return the same thing.
    pub fn is_settled(&self) -> bool {
        self.collections.iter().all(|c| {
            !matches!(
                c.status,
                CollectionStatus::Failed { .. }
                    | CollectionStatus::Truncated {
                        reason: Truncation::Transport(_)
                    }
            )
        })
    }
}

#[derive(Clone, Debug)]
pub struct SyncSettings {
    pub page_size: u32,
    pub pagination_policy: PaginationPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            pagination_policy: PaginationPolicy::FailOpen,
        }
    }
}

/// Fetched-and-written bookkeeping for one collection, kept when it fails.
#[derive(Default)]
struct Progress {
    pages: usize,
    truncation: Option<Truncation>,
    written: BTreeMap<&'static str, usize>,
}

pub struct SyncOrchestrator {
    api: Arc<dyn CommerceApi>,
    store: Arc<dyn MirrorStore>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(api: Arc<dyn CommerceApi>, store: Arc<dyn MirrorStore>, settings: SyncSettings) -> Self {
        Self {
            api,
            store,
            settings,
        }
    }

    /// Fetch, normalize and persist every collection of `store_id`.
    ///
    /// `since` restricts orders to those created at or after that instant.
    /// Never fails as a whole; per-collection failures are in the report.
    pub async fn ingest(
        &self,
        store_id: &str,
        token: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncReport {
        let start = Instant::now();
        info!(store_id, since = ?since, "Starting sync");

        let mut collections = Vec::with_capacity(3);
        for collection in [Collection::Orders, Collection::Products, Collection::Shop] {
            let mut progress = Progress::default();
            let result = match collection {
                Collection::Orders => self.sync_orders(store_id, token, since, &mut progress).await,
                Collection::Products => self.sync_products(store_id, token, &mut progress).await,
                Collection::Shop => self.sync_shop(store_id, token, &mut progress).await,
            };

            let status = match result {
                Ok(()) => match progress.truncation.take() {
                    None => CollectionStatus::Complete,
                    Some(reason) => CollectionStatus::Truncated { reason },
                },
                Err(e) => {
                    warn!(
                        store_id,
                        collection = collection.as_str(),
                        pages = progress.pages,
                        error = %e,
                        "Collection sync failed"
                    );
                    CollectionStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            let report = CollectionReport {
                collection,
                status,
                pages: progress.pages,
                written: progress.written,
            };
            metrics::record_sync_collection(collection.as_str(), report.outcome_label());
            collections.push(report);
        }

        let elapsed = start.elapsed();
        metrics::record_sync_duration(elapsed);

        let report = SyncReport {
            store_id: store_id.to_string(),
            collections,
            duration_ms: elapsed.as_millis() as u64,
        };
        info!(
            store_id,
            complete = report.is_complete(),
            settled = report.is_settled(),
            duration_ms = report.duration_ms,
            "Sync finished"
        );
        report
    }

    /// Run one write batch on the blocking pool and record its row count.
    async fn persist<T, F>(
        &self,
        progress: &mut Progress,
        table: &'static str,
        rows: Vec<T>,
        write: F,
    ) -> Result<(), SyncError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MirrorStore, &[T]) -> anyhow::Result<usize> + Send + 'static,
    {
        let store = self.store.clone();
        let written = tokio::task::spawn_blocking(move || write(store.as_ref(), &rows))
            .await
            .map_err(|e| SyncError::Persist {
                table,
                source: e.into(),
            })?
            .map_err(|source| SyncError::Persist { table, source })?;
        progress.written.insert(table, written);
        Ok(())
    }

    async fn sync_orders(
        &self,
        store_id: &str,
        token: &str,
        since: Option<DateTime<Utc>>,
        progress: &mut Progress,
    ) -> Result<(), SyncError> {
        let mut variables = json!({ "first": self.settings.page_size });
        if let Some(since) = since {
            variables["query"] = Value::String(orders_since_filter(
                &since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }

        let fetched = fetch_all(
            self.api.as_ref(),
            store_id,
            token,
            ORDERS_QUERY,
            &variables,
            ORDERS_PATH,
            self.settings.pagination_policy,
        )
        .await?;
        progress.pages = fetched.pages;
        progress.truncation = fetched.truncation;

        let normalized = normalize_orders(&fetched.nodes);
        self.persist(progress, "orders", normalized.orders, |store, rows| {
            store.upsert_orders(rows)
        })
        .await?;
        self.persist(progress, "order_items", normalized.order_items, |store, rows| {
            store.upsert_order_items(rows)
        })
        .await
    }

    async fn sync_products(
        &self,
        store_id: &str,
        token: &str,
        progress: &mut Progress,
    ) -> Result<(), SyncError> {
        let variables = json!({ "first": self.settings.page_size });
        let fetched = fetch_all(
            self.api.as_ref(),
            store_id,
            token,
            PRODUCTS_QUERY,
            &variables,
            PRODUCTS_PATH,
            self.settings.pagination_policy,
        )
        .await?;
        progress.pages = fetched.pages;
        progress.truncation = fetched.truncation;

        let normalized = normalize_products(&fetched.nodes);
        self.persist(progress, "products", normalized.products, |store, rows| {
            store.upsert_products(rows)
        })
        .await?;
        self.persist(progress, "variants", normalized.variants, |store, rows| {
            store.upsert_variants(rows)
        })
        .await?;
        self.persist(progress, "inventory", normalized.inventory, |store, rows| {
            store.upsert_inventory(rows)
        })
        .await
    }

    async fn sync_shop(
        &self,
        store_id: &str,
        token: &str,
        progress: &mut Progress,
    ) -> Result<(), SyncError> {
        let response = self
            .api
            .execute(store_id, token, SHOP_QUERY, &json!({}))
            .await?;
        progress.pages = 1;

        if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
            warn!(store_id, errors = %errors, "Commerce API returned errors for shop");
            progress.truncation = Some(Truncation::UpstreamErrors(errors.to_string()));
            return Ok(());
        }

        let shop = response.get("data").and_then(|data| data.get("shop"));
        match normalize_shop(shop) {
            Some(record) => {
                self.persist(progress, "shop", vec![record], |store, shops| {
                    for shop in shops {
                        store.upsert_shop(shop)?;
                    }
                    Ok(shops.len())
                })
                .await
            }
            None => {
                warn!(store_id, "Shop object missing from response");
                progress.truncation = Some(Truncation::MissingPath("shop".to_string()));
                Ok(())
            }
        }
    }
}
