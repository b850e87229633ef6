//! cipherlane: encrypted traffic-lane control
//!
//! Umbrella crate over the workspace members:
//! - [`core`]: handles, records, the ALU and oracle boundaries
//! - [`engine`]: the `TrafficController` and its components
//! - [`server`]: the axum HTTP boundary

pub use cipherlane_core as core;
pub use cipherlane_engine as engine;
pub use cipherlane_server as server;
