use axum::extract::FromRef;
use std::time::Instant;

use super::ServerConfig;
use crate::sync::SyncHandle;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub sync: SyncHandle,
    /// Name and model of the generation provider, reported by the health endpoint.
    pub provider: String,
    pub model: String,
}

impl FromRef<ServerState> for SyncHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.sync.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
