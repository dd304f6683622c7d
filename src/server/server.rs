use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{log_requests, metrics, state::*, ServerConfig};
use crate::mirror::SyncReport;
use crate::query::QueryError;

#[derive(Serialize)]
struct ServerStats {
    pub status: &'static str,
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct AskBody {
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub shopify_token: String,
}

#[derive(Deserialize, Debug)]
struct IngestBody {
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub shopify_token: String,
    pub since_days: Option<u32>,
}

#[derive(Serialize)]
struct IngestResponse {
    complete: bool,
    #[serde(flatten)]
    report: SyncReport,
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
}

fn missing_fields() -> Response {
    (StatusCode::BAD_REQUEST, "Missing fields").into_response()
}

fn query_error_response(err: QueryError) -> Response {
    let retryable = err.is_retryable();
    let message = err.to_string();
    let (status, error, sql) = match err {
        QueryError::UnsafeQuery { sql } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "unsafe_query", Some(sql))
        }
        QueryError::Generation(_) if retryable => {
            (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable", None)
        }
        QueryError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed", None),
        QueryError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", None),
        QueryError::Execution(_) => (StatusCode::INTERNAL_SERVER_ERROR, "query_failed", None),
    };
    let body = ErrorResponse {
        error,
        message,
        retryable,
        sql,
    };
    (status, Json(body)).into_response()
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        status: "ok",
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn ask(
    State(orchestrator): State<GuardedQueryOrchestrator>,
    Json(body): Json<AskBody>,
) -> Response {
    if body.store_id.trim().is_empty()
        || body.question.trim().is_empty()
        || body.shopify_token.trim().is_empty()
    {
        return missing_fields();
    }

    match orchestrator
        .answer_question(body.store_id.trim(), &body.shopify_token, body.question.trim())
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => query_error_response(err),
    }
}

async fn ingest(State(state): State<ServerState>, Json(body): Json<IngestBody>) -> Response {
    let store_id = body.store_id.trim();
    if store_id.is_empty() || body.shopify_token.trim().is_empty() {
        return missing_fields();
    }

    let since = body
        .since_days
        .or(state.config.default_since_days)
        .map(|days| Utc::now() - chrono::Duration::days(days as i64));

    let report = {
        let _guard = state.staleness.lock_store(store_id).await;
        let report = state
            .sync_orchestrator
            .ingest(store_id, &body.shopify_token, since)
            .await;
        state
            .staleness
            .record_attempt(store_id, report.is_settled(), report.is_complete());
        report
    };

    match state.mirror_store.table_counts() {
        Ok(counts) => metrics::set_mirror_rows(&counts),
        Err(e) => warn!("Failed to count mirror rows: {}", e),
    }

    Json(IngestResponse {
        complete: report.is_complete(),
        report,
    })
    .into_response()
}

pub fn make_app(
    config: ServerConfig,
    query_orchestrator: GuardedQueryOrchestrator,
    sync_orchestrator: GuardedSyncOrchestrator,
    staleness: GuardedStalenessCache,
    mirror_store: GuardedMirrorStore,
) -> Result<Router> {
    let state = ServerState {
        config,
        start_time: Instant::now(),
        query_orchestrator,
        sync_orchestrator,
        staleness,
        mirror_store,
        hash: env!("GIT_HASH").to_owned(),
    };

    let api_routes: Router = Router::new()
        .route("/ask", post(ask))
        .route("/ingest", post(ingest))
        .with_state(state.clone());

    let app: Router = Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests));

    Ok(app)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(
    config: ServerConfig,
    query_orchestrator: GuardedQueryOrchestrator,
    sync_orchestrator: GuardedSyncOrchestrator,
    staleness: GuardedStalenessCache,
    mirror_store: GuardedMirrorStore,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(
        config,
        query_orchestrator,
        sync_orchestrator,
        staleness,
        mirror_store,
    )?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            info!("HTTP server stopped: {:?}", result);
            Ok(result?)
        }
        result = axum::serve(metrics_listener, make_metrics_app()).into_future() => {
            info!("Metrics server stopped: {:?}", result);
            Ok(result?)
        }
    }
}
