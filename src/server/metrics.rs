use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Metric name prefix for all server metrics
const PREFIX: &str = "commerce_analytics";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Sync Metrics
    pub static ref SYNC_COLLECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_sync_collections_total"), "Collection syncs by outcome"),
        &["collection", "outcome"]
    ).expect("Failed to create sync_collections_total metric");

    pub static ref SYNC_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_sync_duration_seconds"),
            "Full store sync duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0])
    ).expect("Failed to create sync_duration_seconds metric");

    // Question Metrics
    pub static ref QUESTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_questions_total"), "Questions by terminal outcome"),
        &["outcome"]
    ).expect("Failed to create questions_total metric");

    pub static ref LLM_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_llm_calls_total"), "Text generation calls"),
        &["phase", "status"]
    ).expect("Failed to create llm_calls_total metric");

    // Mirror Metrics
    pub static ref MIRROR_ROWS: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_mirror_rows"), "Rows per mirror table"),
        &["table"]
    ).expect("Failed to create mirror_rows metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_COLLECTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(QUESTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LLM_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MIRROR_ROWS.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Set the row-count gauges from a table → count map.
pub fn set_mirror_rows(counts: &BTreeMap<String, i64>) {
    for (table, count) in counts {
        MIRROR_ROWS
            .with_label_values(&[table.as_str()])
            .set(*count as f64);
    }
}

/// Collapse a request path to a bounded label set.
pub fn endpoint_label(path: &str) -> &'static str {
    match path {
        "/api/v1/ask" => "/api/v1/ask",
        "/api/v1/ingest" => "/api/v1/ingest",
        "/health" => "/health",
        _ => "other",
    }
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let path = endpoint_label(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record one collection of a sync (`complete`, `truncated` or `failed`)
pub fn record_sync_collection(collection: &str, outcome: &str) {
    SYNC_COLLECTIONS_TOTAL
        .with_label_values(&[collection, outcome])
        .inc();
}

pub fn record_sync_duration(duration: Duration) {
    SYNC_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_question_outcome(outcome: &str) {
    QUESTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a generation call; `phase` is `sql` or `answer`
pub fn record_llm_call(phase: &str, status: &str) {
    LLM_CALLS_TOTAL.with_label_values(&[phase, status]).inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb) = line
                        .split_whitespace()
                        .nth(1)
                        .and_then(|s| s.parse::<f64>().ok())
                    {
                        PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                        return;
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
