//! Question → SQL → rows → answer.
//!
//! The pipeline is an explicit state machine:
//!
//! ```text
//! Received ─▶ Generating ─▶ Validating ─▶ Executing ─▶ Synthesizing ─▶ Done(Answered)
//!                 │              │             │
//!                 ▼              ▼             ▼
//!      Done(Unanswerable)   Err(Unsafe)   Done(NoData)
//! ```
//!
//! `Received` syncs the store first when its mirror is stale. The whole run
//! is bounded by a timeout; on expiry nothing partial is returned.

use super::prompts::{
    answer_prompt, sql_prompt, strip_code_fence, INVALID_SENTINEL, NO_DATA_MESSAGE,
    UNANSWERABLE_MESSAGE,
};
use super::safety::is_safe;
use crate::llm::{CompletionOptions, LlmError, LlmProvider};
use crate::mirror::schema::schema_description;
use crate::mirror::{MirrorStore, Row, StalenessCache, SyncOrchestrator};
use crate::server::metrics;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Text generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Generated query rejected as unsafe")]
    UnsafeQuery { sql: String },

    #[error("Query execution failed: {0:#}")]
    Execution(anyhow::Error),

    #[error("Question not answered within {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    /// Whether the caller may retry the same question unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            QueryError::Generation(e) => e.is_retryable(),
            QueryError::Timeout(_) => true,
            QueryError::UnsafeQuery { .. } | QueryError::Execution(_) => false,
        }
    }
}

/// Terminal, non-error results of a question.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Answered { answer: String, sql: String },
    NoData { message: String, sql: String },
    Unanswerable { message: String },
}

impl Resolution {
    fn label(&self) -> &'static str {
        match self {
            Resolution::Answered { .. } => "answered",
            Resolution::NoData { .. } => "no_data",
            Resolution::Unanswerable { .. } => "unanswerable",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryOutcome {
    pub request_id: String,
    #[serde(flatten)]
    pub resolution: Resolution,
    /// A sync ran before answering.
    pub synced: bool,
    /// False when that sync was partial; the answer may use stale data.
    pub sync_complete: bool,
}

#[derive(Clone, Debug)]
pub struct QuerySettings {
    /// Bound on the whole pipeline: sync, both generations and the query.
    pub timeout: Duration,
    pub completion: CompletionOptions,
    /// When set, question-triggered syncs only fetch orders this recent.
    pub orders_window: Option<chrono::Duration>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            completion: CompletionOptions::default(),
            orders_window: None,
        }
    }
}

enum QueryState {
    Received,
    Generating,
    Validating { sql: String },
    Executing { sql: String },
    Synthesizing { sql: String, rows: Vec<Row> },
    Done(Resolution),
}

/// What the `Received` step observed about syncing.
#[derive(Default)]
struct SyncStatus {
    synced: bool,
    complete: bool,
}

pub struct QueryOrchestrator {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn MirrorStore>,
    sync: Arc<SyncOrchestrator>,
    staleness: Arc<StalenessCache>,
    settings: QuerySettings,
    schema: String,
}

impl QueryOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn MirrorStore>,
        sync: Arc<SyncOrchestrator>,
        staleness: Arc<StalenessCache>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            llm,
            store,
            sync,
            staleness,
            settings,
            schema: schema_description(),
        }
    }

    pub async fn answer_question(
        &self,
        store_id: &str,
        token: &str,
        question: &str,
    ) -> Result<QueryOutcome, QueryError> {
        let request_id = Uuid::new_v4().to_string();
        info!(%request_id, store_id, "Answering question");

        let result = tokio::time::timeout(
            self.settings.timeout,
            self.run(&request_id, store_id, token, question),
        )
        .await
        .unwrap_or(Err(QueryError::Timeout(self.settings.timeout)));

        match &result {
            Ok(outcome) => {
                info!(%request_id, outcome = outcome.resolution.label(), "Question resolved");
                metrics::record_question_outcome(outcome.resolution.label());
            }
            Err(QueryError::UnsafeQuery { sql }) => {
                warn!(%request_id, store_id, %sql, "Unsafe query rejected by safety gate");
                metrics::record_question_outcome("unsafe_query");
            }
            Err(e) => {
                warn!(%request_id, store_id, retryable = e.is_retryable(), "Question failed: {}", e);
                metrics::record_question_outcome(match e {
                    QueryError::Generation(_) => "generation_error",
                    QueryError::Timeout(_) => "timeout",
                    _ => "execution_error",
                });
            }
        }
        result
    }

    async fn run(
        &self,
        request_id: &str,
        store_id: &str,
        token: &str,
        question: &str,
    ) -> Result<QueryOutcome, QueryError> {
        let mut sync_status = SyncStatus::default();
        let mut state = QueryState::Received;

        let resolution = loop {
            state = match state {
                QueryState::Received => {
                    sync_status = self.sync_if_stale(store_id, token).await;
                    QueryState::Generating
                }
                QueryState::Generating => self.generate_sql(question).await?,
                QueryState::Validating { sql } => {
                    if !is_safe(&sql) {
                        return Err(QueryError::UnsafeQuery { sql });
                    }
                    QueryState::Executing { sql }
                }
                QueryState::Executing { sql } => self.execute(sql).await?,
                QueryState::Synthesizing { sql, rows } => {
                    let prompt = answer_prompt(question, &sql, &rows);
                    let answer = self.generate("answer", &prompt).await?;
                    QueryState::Done(Resolution::Answered { answer, sql })
                }
                QueryState::Done(resolution) => break resolution,
            };
        };

        debug!(request_id, "Pipeline finished");
        Ok(QueryOutcome {
            request_id: request_id.to_string(),
            resolution,
            synced: sync_status.synced,
            sync_complete: !sync_status.synced || sync_status.complete,
        })
    }

    /// Single-flight per store: the lock is held across check, sync and mark.
    /// A caller that queued behind a running sync shares its result.
    async fn sync_if_stale(&self, store_id: &str, token: &str) -> SyncStatus {
        let seen = self.staleness.last_attempt(store_id).generation;
        let _guard = self.staleness.lock_store(store_id).await;

        let last = self.staleness.last_attempt(store_id);
        if last.generation != seen {
            debug!(store_id, generation = last.generation, "Reusing sync finished while queued");
            return SyncStatus {
                synced: true,
                complete: last.complete,
            };
        }
        if !self.staleness.should_sync(store_id) {
            return SyncStatus::default();
        }

        let since = self.settings.orders_window.map(|window| Utc::now() - window);
        let report = self.sync.ingest(store_id, token, since).await;
        let complete = report.is_complete();
        self.staleness
            .record_attempt(store_id, report.is_settled(), complete);
        if !complete {
            warn!(store_id, "Sync incomplete, answering from the existing mirror");
        }
        SyncStatus {
            synced: true,
            complete,
        }
    }

    async fn generate(&self, phase: &'static str, prompt: &str) -> Result<String, QueryError> {
        match self.llm.generate(prompt, &self.settings.completion).await {
            Ok(text) => {
                metrics::record_llm_call(phase, "ok");
                Ok(text)
            }
            Err(e) => {
                metrics::record_llm_call(phase, "error");
                warn!(phase, error = %e, "Text generation failed");
                Err(e.into())
            }
        }
    }

    async fn generate_sql(&self, question: &str) -> Result<QueryState, QueryError> {
        let reply = self.generate("sql", &sql_prompt(&self.schema, question)).await?;
        let sql = strip_code_fence(&reply);
        debug!(%sql, "Generated query");

        if sql == INVALID_SENTINEL {
            return Ok(QueryState::Done(Resolution::Unanswerable {
                message: UNANSWERABLE_MESSAGE.to_string(),
            }));
        }
        Ok(QueryState::Validating {
            sql: sql.to_string(),
        })
    }

    async fn execute(&self, sql: String) -> Result<QueryState, QueryError> {
        let store = self.store.clone();
        let query = sql.clone();
        let rows = tokio::task::spawn_blocking(move || store.query_rows(&query))
            .await
            .map_err(|e| QueryError::Execution(e.into()))?
            .map_err(QueryError::Execution)?;

        debug!(rows = rows.len(), "Query executed");
        if rows.is_empty() {
            return Ok(QueryState::Done(Resolution::NoData {
                message: NO_DATA_MESSAGE.to_string(),
                sql,
            }));
        }
        Ok(QueryState::Synthesizing { sql, rows })
    }
}
