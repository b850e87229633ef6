//! Corridor direction of a revealed lane configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction decided by the planner
///
/// Encrypted as a u32 code: 0 keeps the corridor forward, 1 reverses it
/// toward the heavier reverse demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Forward demand dominates (or ties)
    Forward,
    /// Reverse demand strictly dominates
    Reverse,
}

impl Direction {
    /// Plaintext code used inside the encrypted computation
    pub fn code(&self) -> u32 {
        match self {
            Direction::Forward => 0,
            Direction::Reverse => 1,
        }
    }

    /// Interpret a revealed code; anything other than 0 or 1 is not a direction
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Direction::Forward),
            1 => Some(Direction::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Forward
    }
}
