//! Controller configuration

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::Principal;

/// Protocol version constant
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Configuration of a traffic controller instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Identity allowed to grant the operator role; fixed for the controller's lifetime
    pub admin: Principal,
    /// Lanes shared between the two directions
    #[serde(default = "default_total_lanes")]
    pub total_lanes: u32,
    /// Percent of destination pattern counted as forward demand
    #[serde(default = "default_forward_weight")]
    pub forward_weight: u32,
    /// Percent of destination pattern counted as reverse demand
    #[serde(default = "default_reverse_weight")]
    pub reverse_weight: u32,
    /// Flow-rate multiplier numerator when reversed
    #[serde(default = "default_boost_num")]
    pub reversal_boost_num: u32,
    /// Flow-rate multiplier denominator when reversed
    #[serde(default = "default_boost_den")]
    pub reversal_boost_den: u32,
    /// Protocol version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_total_lanes() -> u32 {
    constants::TOTAL_LANES
}

fn default_forward_weight() -> u32 {
    constants::FORWARD_WEIGHT
}

fn default_reverse_weight() -> u32 {
    constants::REVERSE_WEIGHT
}

fn default_boost_num() -> u32 {
    constants::REVERSAL_BOOST_NUM
}

fn default_boost_den() -> u32 {
    constants::REVERSAL_BOOST_DEN
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl ControllerConfig {
    /// Default planning parameters with the given admin
    pub fn new(admin: Principal) -> Self {
        Self {
            admin,
            total_lanes: default_total_lanes(),
            forward_weight: default_forward_weight(),
            reverse_weight: default_reverse_weight(),
            reversal_boost_num: default_boost_num(),
            reversal_boost_den: default_boost_den(),
            version: default_version(),
        }
    }

    /// Override the number of lanes
    pub fn with_total_lanes(mut self, lanes: u32) -> Self {
        self.total_lanes = lanes;
        self
    }

    /// Reject parameters the planner cannot use
    ///
    /// Planning parameters are public, so they are checked in the clear,
    /// unlike the encrypted denominators inside the formulas.
    pub fn validate(&self) -> crate::Result<()> {
        if self.total_lanes == 0 {
            return Err(crate::Error::InvalidConfig("total_lanes must be positive".into()));
        }
        if self.reversal_boost_den == 0 {
            return Err(crate::Error::InvalidConfig(
                "reversal_boost_den must be positive".into(),
            ));
        }
        if self.forward_weight > 100 || self.reverse_weight > 100 {
            return Err(crate::Error::InvalidConfig(
                "directional weights are percentages".into(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Principal {
        Principal::new([0xaa; 20])
    }

    #[test]
    fn test_defaults_match_planning_constants() {
        let config = ControllerConfig::new(admin());
        assert_eq!(config.total_lanes, 4);
        assert_eq!(config.forward_weight, 70);
        assert_eq!(config.reverse_weight, 30);
        assert_eq!((config.reversal_boost_num, config.reversal_boost_den), (12, 10));
        assert_eq!(config.version, PROTOCOL_VERSION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = format!("{{\"admin\": \"{}\"}}", admin());
        let config: ControllerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, ControllerConfig::new(admin()));
    }

    #[test]
    fn test_validate_rejects_zero_lanes() {
        let config = ControllerConfig::new(admin()).with_total_lanes(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.json");

        let config = ControllerConfig::new(admin()).with_total_lanes(6);
        config.save(&path).unwrap();

        let loaded = ControllerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
