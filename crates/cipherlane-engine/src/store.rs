//! Telemetry store: encrypted submissions indexed per sensor

use std::collections::HashMap;

use cipherlane_core::{Ciphertext, Principal, RecordField, RecordId, TrafficRecord};

use crate::error::{Error, Result};

/// Encrypted readings as submitted by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub volume: Ciphertext,
    pub avg_speed: Ciphertext,
    pub destination_pattern: Ciphertext,
    pub congestion_level: Ciphertext,
}

/// Owns every `TrafficRecord`; records are never removed
///
/// Ids are dense and 1-based, so record `id` lives at `records[id - 1]`.
#[derive(Debug, Clone, Default)]
pub struct TelemetryStore {
    records: Vec<TrafficRecord>,
    sensor_index: HashMap<Principal, Vec<RecordId>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a reading under the next id and append it to the sensor's history
    pub fn submit(&mut self, sensor: Principal, reading: Reading, submitted_at: u64) -> RecordId {
        let id = self.records.len() as RecordId + 1;
        self.records.push(TrafficRecord {
            id,
            sensor,
            volume: reading.volume,
            avg_speed: reading.avg_speed,
            destination_pattern: reading.destination_pattern,
            congestion_level: reading.congestion_level,
            submitted_at,
        });
        self.sensor_index.entry(sensor).or_default().push(id);
        id
    }

    pub fn get(&self, id: RecordId) -> Result<&TrafficRecord> {
        id.checked_sub(1)
            .and_then(|idx| self.records.get(idx as usize))
            .ok_or(Error::UnknownRecord(id))
    }

    /// Rewrite one operator-mutable field in place
    pub fn mutate(&mut self, id: RecordId, field: RecordField, value: Ciphertext) -> Result<()> {
        let record = id
            .checked_sub(1)
            .and_then(|idx| self.records.get_mut(idx as usize))
            .ok_or(Error::UnknownRecord(id))?;
        record.set_field(field, value);
        Ok(())
    }

    /// Record ids of a sensor in submission order
    pub fn history(&self, sensor: &Principal) -> &[RecordId] {
        self.sensor_index
            .get(sensor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Up to `n` most recent records of a sensor, oldest first
    pub fn latest(&self, sensor: &Principal, n: usize) -> Vec<&TrafficRecord> {
        let history = self.history(sensor);
        let start = history.len().saturating_sub(n);
        history[start..]
            .iter()
            .filter_map(|id| self.get(*id).ok())
            .collect()
    }

    /// All records of a sensor, oldest first
    pub fn records_of(&self, sensor: &Principal) -> Vec<&TrafficRecord> {
        self.latest(sensor, usize::MAX)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_index.len()
    }
}
