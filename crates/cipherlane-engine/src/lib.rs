//! cipherlane-engine: Encrypted traffic-lane control
//!
//! The engine owns all controller state and exposes it through
//! [`TrafficController`]:
//! - [`TelemetryStore`]: encrypted sensor readings, indexed per sensor
//! - [`Analytics`]: read-only formulas over ciphertexts
//! - [`LanePlanner`]: direction, lane count and flow rate per record
//! - [`RevealRegistry`]: exactly-once decryption of a planned config
//! - [`AccessGuard`]: admin and operator roles
//!
//! The engine is synchronous and single-writer. Callers that share it across
//! tasks wrap it in a lock; every `&mut self` method is one atomic step.

mod access;
mod analytics;
mod controller;
mod error;
mod events;
mod planner;
mod reveal;
mod scratch;
mod store;

pub use access::{AccessGuard, Role};
pub use analytics::{Analytics, ConfigMetric, EncryptedValue, RecordMetric, SensorMetric};
pub use controller::{ControllerStats, TrafficController};
pub use error::{Error, Result};
pub use events::{Event, EventLog};
pub use planner::{ConfigStore, LanePlanner};
pub use reveal::{RevealRegistry, RevealState};
pub use store::{Reading, TelemetryStore};
