//! Shared application state passed to every axum handler.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::Digest;

use agent_core::{Orchestrator, Provider, SessionStorage, ToolRegistry};

use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ToolRegistry>,
    pub provider: Arc<dyn Provider>,
    pub storage: Arc<dyn SessionStorage>,
    /// Live orchestrators for currently-connected sessions, keyed by
    /// session id. A session not present here but present in `storage` is
    /// one that's been persisted but has no open connection right now.
    pub sessions: Arc<RwLock<HashMap<String, Arc<Orchestrator>>>>,
    /// SHA-256 hash of the pre-shared gateway token. `None` means
    /// unauthenticated (dev mode) — see `ws::token_eq`.
    pub token_hash: Option<Vec<u8>>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        registry: ToolRegistry,
        provider: Arc<dyn Provider>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let token_hash = config
            .token
            .as_ref()
            .map(|t| sha2::Sha256::digest(t.as_bytes()).to_vec());
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            provider,
            storage,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            token_hash,
        }
    }
}
