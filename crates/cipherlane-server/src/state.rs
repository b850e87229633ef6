//! Server state: the controller plus its shadow backend

use std::sync::Arc;

use cipherlane_core::{KeccakProofVerifier, ShadowAlu, ShadowOracle};
use cipherlane_engine::TrafficController;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::ServerConfig;
use crate::error::Result;

/// Everything the handlers share
///
/// The shadow ALU is the only backend the server ships with. `shadow_mode`
/// only decides whether plaintext encryption is served over HTTP and whether
/// the in-process relay answers reveal requests.
pub struct ServerState {
    pub controller: TrafficController,
    pub alu: Arc<ShadowAlu>,
    pub oracle: Arc<ShadowOracle>,
    pub shadow_mode: bool,
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let verifier = KeccakProofVerifier::new(config.oracle_key_bytes()?);
        let alu = Arc::new(ShadowAlu::new());
        let oracle = Arc::new(ShadowOracle::new(alu.clone(), verifier.clone()));
        let controller = TrafficController::new(
            config.controller.clone(),
            alu.clone(),
            oracle.clone(),
            Arc::new(verifier),
        );

        Ok(Self {
            controller,
            alu,
            oracle,
            shadow_mode: config.shadow_mode,
            metrics: None,
        })
    }
}

/// Shared server state type
pub type SharedState = Arc<tokio::sync::RwLock<ServerState>>;

/// Create shared state from config
pub fn create_shared_state(config: &ServerConfig) -> Result<SharedState> {
    Ok(Arc::new(tokio::sync::RwLock::new(ServerState::new(config)?)))
}
