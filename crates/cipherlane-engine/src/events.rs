//! Controller events

use cipherlane_core::{Principal, RecordId};
use serde::{Deserialize, Serialize};

/// Events emitted by state-changing calls
///
/// Only submission, planning and a successful reveal callback emit.
/// Reveal requests and operator adjustments are silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    DataReceived { id: RecordId, sensor: Principal },
    LaneConfigUpdated { id: RecordId },
    ConfigDecrypted { id: RecordId },
}

/// Append-only event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        tracing::debug!(?event, "Event emitted");
        self.events.push(event);
    }

    pub fn all(&self) -> &[Event] {
        &self.events
    }

    /// Events after the first `offset`, for incremental polling
    pub fn since(&self, offset: usize) -> &[Event] {
        self.events.get(offset..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
