//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own mirror database, a stub
//! commerce API and a scripted text generator.

use super::constants::*;
use super::fakes::{ScriptedLlm, StubCommerceApi};
use commerce_analytics_server::mirror::{
    MirrorStore, SqliteMirrorStore, StalenessCache, SyncOrchestrator, SyncSettings,
};
use commerce_analytics_server::query::{QueryOrchestrator, QuerySettings};
use commerce_analytics_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated mirror database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Mirror store for direct database access in tests
    pub mirror_store: Arc<SqliteMirrorStore>,

    /// The stub commerce API, to inspect the calls it received
    pub commerce_api: Arc<StubCommerceApi>,

    /// The scripted text generator, to inspect the prompts it received
    pub llm: Arc<ScriptedLlm>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server backed by the fixture shop and the given LLM replies.
    pub async fn spawn(llm_replies: &[&str]) -> Self {
        Self::spawn_with(
            StubCommerceApi::new(),
            ScriptedLlm::replying(llm_replies),
            QuerySettings::default(),
        )
        .await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound,
    /// or the server doesn't become ready within timeout.
    pub async fn spawn_with(
        commerce_api: StubCommerceApi,
        llm: ScriptedLlm,
        query_settings: QuerySettings,
    ) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let mirror_store = Arc::new(
            SqliteMirrorStore::new(temp_db_dir.path().join("mirror.db"), 2)
                .expect("Failed to open mirror store"),
        );
        let commerce_api = Arc::new(commerce_api);
        let llm = Arc::new(llm);

        let store: Arc<dyn MirrorStore> = mirror_store.clone();
        let staleness = Arc::new(StalenessCache::default());
        let sync_orchestrator = Arc::new(SyncOrchestrator::new(
            commerce_api.clone(),
            store.clone(),
            SyncSettings {
                page_size: 2,
                ..Default::default()
            },
        ));
        let query_orchestrator = Arc::new(QueryOrchestrator::new(
            llm.clone(),
            store.clone(),
            sync_orchestrator.clone(),
            staleness.clone(),
            query_settings,
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };

        let app = make_app(
            config,
            query_orchestrator,
            sync_orchestrator,
            staleness,
            store,
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            mirror_store,
            commerce_api,
            llm,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the /health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Row count of one mirror table
    pub fn count(&self, table: &str) -> i64 {
        self.mirror_store
            .table_counts()
            .expect("Failed to count rows")
            .get(table)
            .copied()
            .unwrap_or_else(|| panic!("unknown table {}", table))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
