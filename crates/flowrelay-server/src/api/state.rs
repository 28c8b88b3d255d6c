use std::sync::Arc;

use flowrelay_upstream::FlowiseClient;
use parking_lot::RwLock;

use crate::config::ServerConfig;

/// The one upstream conversation id this process tracks. Null at startup,
/// set by the relay when metadata arrives, cleared by reset-session. Shared
/// across all requests with last-write-wins semantics (single-tenant by
/// design).
pub type SharedSession = Arc<RwLock<Option<String>>>;

/// Application state shared across all API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub flowise: Arc<FlowiseClient>,
    pub session: SharedSession,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let mut flowise = FlowiseClient::new(&config.flowise_base_url, &config.chatflow_id);
        if let Some(api_key) = &config.flowise_api_key {
            flowise = flowise.with_api_key(api_key);
        }
        if let Some(system_message) = &config.system_message {
            flowise = flowise.with_system_message(system_message);
        }

        Self {
            config: Arc::new(config),
            flowise: Arc::new(flowise),
            session: Arc::new(RwLock::new(None)),
        }
    }
}
