use axum::extract::FromRef;

use crate::mirror::{MirrorStore, StalenessCache, SyncOrchestrator};
use crate::query::QueryOrchestrator;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedQueryOrchestrator = Arc<QueryOrchestrator>;
pub type GuardedSyncOrchestrator = Arc<SyncOrchestrator>;
pub type GuardedStalenessCache = Arc<StalenessCache>;
pub type GuardedMirrorStore = Arc<dyn MirrorStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub query_orchestrator: GuardedQueryOrchestrator,
    pub sync_orchestrator: GuardedSyncOrchestrator,
    pub staleness: GuardedStalenessCache,
    pub mirror_store: GuardedMirrorStore,
    pub hash: String,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedQueryOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.query_orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedSyncOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.sync_orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedStalenessCache {
    fn from_ref(input: &ServerState) -> Self {
        input.staleness.clone()
    }
}

impl FromRef<ServerState> for GuardedMirrorStore {
    fn from_ref(input: &ServerState) -> Self {
        input.mirror_store.clone()
    }
}
