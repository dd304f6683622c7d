use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commerce_analytics_server::commerce_api::{CommerceApi, GraphqlCommerceClient};
use commerce_analytics_server::config::{self, AppConfig, FileConfig};
use commerce_analytics_server::llm::{CompletionOptions, LlmProvider, OpenAIProvider};
use commerce_analytics_server::mirror::{
    MirrorStore, SqliteMirrorStore, StalenessCache, SyncOrchestrator, SyncSettings,
};
use commerce_analytics_server::query::{QueryOrchestrator, QuerySettings};
use commerce_analytics_server::server::{self, metrics, run_server, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite mirror database file. Created if missing.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_path: args.db_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            llm_api_key: std::env::var("LLM_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&(&cli_args).into(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening SQLite mirror database at {:?}...", app_config.db_path);
    let mirror_store: Arc<dyn MirrorStore> = Arc::new(SqliteMirrorStore::new(
        &app_config.db_path,
        app_config.read_pool_size,
    )?);
    metrics::set_mirror_rows(&mirror_store.table_counts()?);

    let commerce_timeout = Duration::from_secs(app_config.commerce.timeout_secs);
    let commerce_api: Arc<dyn CommerceApi> = Arc::new(match &app_config.commerce.endpoint {
        Some(endpoint) => {
            info!("Using commerce endpoint {}", endpoint);
            GraphqlCommerceClient::with_endpoint(
                endpoint,
                &app_config.commerce.api_version,
                commerce_timeout,
            )?
        }
        None => GraphqlCommerceClient::new(&app_config.commerce.api_version, commerce_timeout)?,
    });

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAIProvider::new(
        app_config.llm.base_url.clone(),
        app_config.llm.model.clone(),
        app_config.llm.api_key_source.clone(),
    ));
    info!(
        "Text generation via {} ({})",
        app_config.llm.base_url, app_config.llm.model
    );
    if let Err(e) = llm.health_check().await {
        warn!("Text generation service is not reachable yet: {}", e);
    }

    let sync_orchestrator = Arc::new(SyncOrchestrator::new(
        commerce_api,
        mirror_store.clone(),
        SyncSettings {
            page_size: app_config.page_size,
            pagination_policy: app_config.pagination_policy,
        },
    ));
    let staleness = Arc::new(StalenessCache::with_ttl_minutes(
        app_config.staleness_ttl_minutes,
    ));
    let query_orchestrator = Arc::new(QueryOrchestrator::new(
        llm,
        mirror_store.clone(),
        sync_orchestrator.clone(),
        staleness.clone(),
        QuerySettings {
            timeout: Duration::from_secs(app_config.request_timeout_secs),
            completion: CompletionOptions {
                temperature: app_config.llm.temperature,
                max_tokens: app_config.llm.max_tokens,
                timeout: Duration::from_secs(app_config.llm.timeout_secs),
            },
            orders_window: app_config
                .orders_since_days
                .map(|days| chrono::Duration::days(days as i64)),
        },
    ));

    let server_config = server::ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        default_since_days: app_config.orders_since_days,
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    run_server(
        server_config,
        query_orchestrator,
        sync_orchestrator,
        staleness,
        mirror_store,
    )
    .await
}
