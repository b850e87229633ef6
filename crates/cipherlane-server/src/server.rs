//! Controller server implementation

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::metrics::init_prometheus_recorder;
use crate::relay::spawn_relay;
use crate::routes::create_router;
use crate::state::{create_shared_state, SharedState};

/// HTTP server over one shared traffic controller
pub struct CipherlaneServer {
    state: SharedState,
    config: ServerConfig,
}

impl CipherlaneServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        let state = create_shared_state(&config)?;
        Ok(Self { state, config })
    }

    /// Run the server until the listener fails
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let relay = self.start_relay();
        let router = create_router(self.state);

        tracing::info!(%addr, shadow_mode = self.config.shadow_mode, "Starting cipherlane server");

        let served = axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        if let Some(relay) = relay {
            relay.abort();
        }
        served
    }

    fn start_relay(&self) -> Option<JoinHandle<()>> {
        self.config
            .shadow_mode
            .then(|| spawn_relay(self.state.clone(), self.config.relay_interval()))
    }

    pub fn addr(&self) -> SocketAddr {
        self.config.bind
    }

    /// Get the server state for testing
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }
}

/// Builder for CipherlaneServer
pub struct ServerBuilder {
    config: ServerConfig,
    metrics: bool,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            metrics: false,
        }
    }

    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.bind = ([0, 0, 0, 0], port).into();
        self
    }

    pub fn shadow_mode(mut self, enabled: bool) -> Self {
        self.config.shadow_mode = enabled;
        self
    }

    /// Install the global Prometheus recorder on build
    ///
    /// Only one recorder can exist per process.
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    pub async fn build(self) -> Result<CipherlaneServer> {
        let server = CipherlaneServer::new(self.config)?;
        if self.metrics {
            let handle = init_prometheus_recorder()?;
            server.state.write().await.metrics = Some(handle);
        }
        Ok(server)
    }
}
