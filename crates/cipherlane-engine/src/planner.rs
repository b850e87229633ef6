//! Lane configuration planner
//!
//! Turns one encrypted record into an encrypted `LaneConfig`. The reversal
//! decision is an `EncryptedBool`, so every value that depends on it goes
//! through `select`; there is no host-side branch on the outcome.

use std::collections::HashMap;

use cipherlane_core::{ControllerConfig, Direction, LaneConfig, RecordId, TrafficRecord};

use crate::analytics::Analytics;
use crate::error::{Error, Result};

/// Latest lane configuration per record; recomputation overwrites
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    configs: HashMap<RecordId, LaneConfig>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RecordId) -> Result<&LaneConfig> {
        self.configs.get(&id).ok_or(Error::UnknownConfig(id))
    }

    /// Store a config, returning the one it replaced
    pub fn insert(&mut self, config: LaneConfig) -> Option<LaneConfig> {
        self.configs.insert(config.id, config)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.configs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Computes direction, lane count and flow rate over ciphertexts
pub struct LanePlanner<'a> {
    analytics: &'a Analytics<'a>,
    config: &'a ControllerConfig,
}

impl<'a> LanePlanner<'a> {
    pub fn new(analytics: &'a Analytics<'a>, config: &'a ControllerConfig) -> Self {
        Self { analytics, config }
    }

    /// Plan a configuration for `rec`
    ///
    /// ```text
    /// reversed   = reverse_demand > forward_demand
    /// direction  = reversed ? Reverse.code() : Forward.code()
    /// lane_count = (total_lanes * (reversed ? reverse : forward) / total) / 2 + 1
    /// base_flow  = (avg_speed * 10) * (100 - congestion_level / 10) / 100
    /// flow_rate  = reversed ? base_flow * 12 / 10 : base_flow
    /// ```
    pub fn plan(&self, rec: &TrafficRecord, computed_at: u64) -> LaneConfig {
        let alu = self.analytics.alu();

        let forward = self.analytics.directional_demand(rec, true);
        let reverse = self.analytics.directional_demand(rec, false);
        let reversed = alu.gt(&reverse, &forward);

        let direction = alu.select(
            &reversed,
            &alu.constant(Direction::Reverse.code()),
            &alu.constant(Direction::Forward.code()),
        );

        let selected = alu.select(&reversed, &reverse, &forward);
        let total = alu.add(&forward, &reverse);
        let share = alu.div(&alu.mul_scalar(&selected, self.config.total_lanes), &total);
        let lane_count = alu.add_scalar(&alu.div_scalar(&share, 2), 1);

        let speed_flow = alu.mul_scalar(&rec.avg_speed, 10);
        let headroom = alu.scalar_sub(100, &alu.div_scalar(&rec.congestion_level, 10));
        let base_flow = alu.div_scalar(&alu.mul(&speed_flow, &headroom), 100);
        let boosted = alu.div_scalar(
            &alu.mul_scalar(&base_flow, self.config.reversal_boost_num),
            self.config.reversal_boost_den,
        );
        let flow_rate = alu.select(&reversed, &boosted, &base_flow);

        LaneConfig {
            id: rec.id,
            direction,
            lane_count,
            flow_rate,
            computed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Reading, TelemetryStore};
    use cipherlane_core::{Principal, ShadowAlu};

    const ADMIN: Principal = Principal::new([0xaa; 20]);
    const SENSOR: Principal = Principal::new([1; 20]);

    fn plan_plaintext(
        config: &ControllerConfig,
        volume: u32,
        speed: u32,
        destination: u32,
        congestion: u32,
    ) -> (u32, u32, u32) {
        let alu = ShadowAlu::new();
        let mut store = TelemetryStore::new();
        let id = store.submit(
            SENSOR,
            Reading {
                volume: alu.encrypt(volume),
                avg_speed: alu.encrypt(speed),
                destination_pattern: alu.encrypt(destination),
                congestion_level: alu.encrypt(congestion),
            },
            0,
        );

        let analytics = Analytics::new(&alu, &store, config);
        let planner = LanePlanner::new(&analytics, config);
        let cfg = planner.plan(store.get(id).unwrap(), 7);
        assert_eq!(cfg.id, id);
        assert_eq!(cfg.computed_at, 7);

        (
            alu.decrypt(&cfg.direction),
            alu.decrypt(&cfg.lane_count),
            alu.decrypt(&cfg.flow_rate),
        )
    }

    #[test]
    fn test_forward_scenario() {
        let config = ControllerConfig::new(ADMIN);
        assert_eq!(plan_plaintext(&config, 100, 50, 80, 40), (0, 2, 480));
    }

    #[test]
    fn test_reverse_scenario() {
        let config = ControllerConfig::new(ADMIN);
        // Weights 70/30 favour forward; a 0 pattern ties at volume/10 and stays forward
        assert_eq!(plan_plaintext(&config, 100, 50, 0, 40), (0, 2, 480));

        // Swap the weights so reverse demand dominates
        let mut swapped = config.clone();
        swapped.forward_weight = 30;
        swapped.reverse_weight = 70;
        // forward 34, reverse 66: lanes (264/100)/2+1 = 2, flow 480*1.2
        let (direction, lanes, flow) = plan_plaintext(&swapped, 100, 50, 80, 40);
        assert_eq!(Direction::from_code(direction), Some(Direction::Reverse));
        assert_eq!((lanes, flow), (2, 576));
    }

    #[test]
    fn test_total_lanes_is_configurable() {
        let config = ControllerConfig::new(ADMIN).with_total_lanes(8);
        // (8*66/100)/2+1 = 5/2+1
        assert_eq!(plan_plaintext(&config, 100, 50, 80, 40).1, 3);
    }

    #[test]
    fn test_zero_demand_lane_count_is_defined() {
        let config = ControllerConfig::new(ADMIN);
        // total demand 0: share saturates, lane count wraps past u32::MAX/2
        let (direction, lanes, flow) = plan_plaintext(&config, 0, 50, 0, 40);
        assert_eq!(direction, 0);
        assert_eq!(lanes, u32::MAX / 2 + 1);
        assert_eq!(flow, 480);
    }

    #[test]
    fn test_config_store_overwrites() {
        let alu = ShadowAlu::new();
        let mut configs = ConfigStore::new();
        let first = LaneConfig {
            id: 1,
            direction: alu.encrypt(0),
            lane_count: alu.encrypt(2),
            flow_rate: alu.encrypt(480),
            computed_at: 1,
        };
        let second = LaneConfig {
            computed_at: 2,
            ..first.clone()
        };

        assert!(configs.insert(first.clone()).is_none());
        assert_eq!(configs.insert(second.clone()), Some(first));
        assert_eq!(configs.get(1).unwrap(), &second);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs.get(2).unwrap_err(), Error::UnknownConfig(2));
    }
}
