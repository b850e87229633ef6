//! cipherlane-server: HTTP boundary for the encrypted lane controller
//!
//! Wraps one `TrafficController` in shared state and exposes its operations
//! over axum, with Prometheus metrics and an optional shadow oracle relay.

pub mod config;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{CipherlaneServer, ServerBuilder};
pub use state::{create_shared_state, ServerState, SharedState};
