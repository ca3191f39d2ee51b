//! Application state.

use std::sync::Arc;

use tracing::info;

use reel_orchestrator::{
    CredentialAdapterFactory, Orchestrator, OrchestratorConfig, Scheduler,
};
use reel_providers::{CredentialStore, EnvCredentialStore};
use reel_store::{
    JobStore, MemoryJobStore, MemoryProjectStore, ProjectStore, RedisJobStore, RedisProjectStore,
    RedisStoreConfig,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub projects: Arc<dyn ProjectStore>,
    pub jobs: Arc<dyn JobStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Create new application state: stores per the configured backend,
    /// the env-backed credential store, and the orchestrator with its
    /// wake-up runtime already running.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let (projects, jobs): (Arc<dyn ProjectStore>, Arc<dyn JobStore>) =
            match config.store_backend.as_str() {
                "redis" => {
                    let redis_config = RedisStoreConfig::from_env();
                    info!(url = %redis_config.url, "Using redis store backend");
                    (
                        Arc::new(RedisProjectStore::new(redis_config.clone())?),
                        Arc::new(RedisJobStore::new(redis_config)?),
                    )
                }
                _ => {
                    info!("Using in-memory store backend");
                    (
                        Arc::new(MemoryProjectStore::new()),
                        Arc::new(MemoryJobStore::new()),
                    )
                }
            };

        let credentials: Arc<dyn CredentialStore> = Arc::new(EnvCredentialStore::new());

        let (scheduler, wakeups) = Scheduler::new();
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&jobs),
            Arc::new(CredentialAdapterFactory::new(Arc::clone(&credentials))),
            scheduler,
            OrchestratorConfig::from_env(),
        ));
        Arc::clone(&orchestrator).spawn_runtime(wakeups);

        Ok(Self {
            config,
            projects,
            jobs,
            credentials,
            orchestrator,
        })
    }
}
