//! Telemetry records and lane configurations

use serde::{Deserialize, Serialize};

use crate::{Ciphertext, Direction, Principal};

/// 1-based record identifier, assigned at submission
pub type RecordId = u64;

/// One encrypted sensor submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub id: RecordId,
    /// Principal that submitted the reading
    pub sensor: Principal,
    /// Vehicles observed in the sampling window
    pub volume: Ciphertext,
    pub avg_speed: Ciphertext,
    /// Share of traffic heading toward the forward destination, 0-100
    pub destination_pattern: Ciphertext,
    /// Congestion score, 0-100
    pub congestion_level: Ciphertext,
    /// Unix seconds
    pub submitted_at: u64,
}

impl TrafficRecord {
    /// Current ciphertext of a mutable field
    pub fn field(&self, field: RecordField) -> Ciphertext {
        match field {
            RecordField::Volume => self.volume,
            RecordField::DestinationPattern => self.destination_pattern,
            RecordField::CongestionLevel => self.congestion_level,
        }
    }

    /// Replace a mutable field in place; identity fields are untouched
    pub fn set_field(&mut self, field: RecordField, value: Ciphertext) {
        match field {
            RecordField::Volume => self.volume = value,
            RecordField::DestinationPattern => self.destination_pattern = value,
            RecordField::CongestionLevel => self.congestion_level = value,
        }
    }
}

/// Fields operators may rewrite after submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Volume,
    DestinationPattern,
    CongestionLevel,
}

/// Encrypted planner output for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Record this configuration was planned from
    pub id: RecordId,
    /// 0 = forward, 1 = reverse
    pub direction: Ciphertext,
    pub lane_count: Ciphertext,
    pub flow_rate: Ciphertext,
    /// Unix seconds
    pub computed_at: u64,
}

impl LaneConfig {
    /// Handles in reveal order: direction, lane count, flow rate
    pub fn reveal_handles(&self) -> [Ciphertext; 3] {
        [self.direction, self.lane_count, self.flow_rate]
    }
}

/// Plaintext lane configuration, written once by a verified oracle callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecryptedConfig {
    pub direction: u32,
    pub lane_count: u32,
    pub flow_rate: u32,
    pub revealed: bool,
}

impl DecryptedConfig {
    pub fn revealed(direction: u32, lane_count: u32, flow_rate: u32) -> Self {
        Self {
            direction,
            lane_count,
            flow_rate,
            revealed: true,
        }
    }

    /// Typed direction, if the revealed code is a valid one
    pub fn direction(&self) -> Option<Direction> {
        Direction::from_code(self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Handle;

    fn ct(byte: u8) -> Ciphertext {
        Ciphertext::from_handle(Handle([byte; 32]))
    }

    fn record() -> TrafficRecord {
        TrafficRecord {
            id: 7,
            sensor: Principal::new([1u8; 20]),
            volume: ct(1),
            avg_speed: ct(2),
            destination_pattern: ct(3),
            congestion_level: ct(4),
            submitted_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_set_field_keeps_identity() {
        let mut updated = record();
        updated.set_field(RecordField::Volume, ct(9));
        assert_eq!(updated.volume, ct(9));
        assert_eq!(updated.id, 7);
        assert_eq!(updated.sensor, Principal::new([1u8; 20]));
        assert_eq!(updated.submitted_at, 1_700_000_000);
        assert_eq!(updated.avg_speed, ct(2));
    }

    #[test]
    fn test_field_accessor() {
        let rec = record();
        assert_eq!(rec.field(RecordField::DestinationPattern), ct(3));
        assert_eq!(rec.field(RecordField::CongestionLevel), ct(4));
    }

    #[test]
    fn test_decrypted_default_is_unrevealed() {
        let cfg = DecryptedConfig::default();
        assert!(!cfg.revealed);
        assert!(DecryptedConfig::revealed(1, 3, 576).revealed);
        assert_eq!(DecryptedConfig::revealed(1, 3, 576).direction(), Some(Direction::Reverse));
    }
}
