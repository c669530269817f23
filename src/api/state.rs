use std::sync::Arc;

use crate::api::routes::cron::RefreshState;
use crate::config::ServerConfig;
use crate::pipeline::RefreshJob;
use crate::storage::StatsStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StatsStore>,
    pub job: Arc<RefreshJob>,
    pub refresh_state: Arc<tokio::sync::RwLock<RefreshState>>,
    /// Bearer secret for the cron endpoint; `None` rejects every trigger.
    pub cron_secret: Option<String>,
    pub cache_control: String,
    pub cors_origin: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StatsStore>,
        job: Arc<RefreshJob>,
        cron_secret: Option<String>,
        server: &ServerConfig,
    ) -> Self {
        Self {
            store,
            job,
            refresh_state: Arc::new(tokio::sync::RwLock::new(RefreshState::default())),
            cron_secret,
            cache_control: server.cache_control(),
            cors_origin: server.cors_origin.clone(),
        }
    }
}
