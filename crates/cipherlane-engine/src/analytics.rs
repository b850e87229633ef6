//! Encrypted traffic analytics
//!
//! Every function here is a pure read: it takes records (or a sensor's
//! history) and returns fresh ciphertexts. Nothing is decrypted and no store
//! is written. Writers such as special-event adjustment compute their new
//! value here and leave the write to the controller.
//!
//! Denominators that are themselves encrypted (total demand, volume, flow
//! rate) cannot be checked before dividing. They rely on the ALU's
//! division-by-zero sentinel (`u32::MAX`) instead.

use std::fmt;
use std::str::FromStr;

use cipherlane_core::{
    Ciphertext, ControllerConfig, EncryptedAlu, EncryptedBool, LaneConfig, Principal,
    TrafficRecord,
};
use serde::{Deserialize, Serialize};

use crate::store::TelemetryStore;

/// Peak prediction multiplier, as numerator/denominator
const PEAK_FACTOR: (u32, u32) = (12, 10);

/// Either kind of encrypted analytic result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "handle", rename_all = "lowercase")]
pub enum EncryptedValue {
    Uint(Ciphertext),
    Bool(EncryptedBool),
}

/// Stateless formulas over stored telemetry
pub struct Analytics<'a> {
    alu: &'a dyn EncryptedAlu,
    store: &'a TelemetryStore,
    config: &'a ControllerConfig,
}

impl<'a> Analytics<'a> {
    pub fn new(alu: &'a dyn EncryptedAlu, store: &'a TelemetryStore, config: &'a ControllerConfig) -> Self {
        Self { alu, store, config }
    }

    pub fn alu(&self) -> &'a dyn EncryptedAlu {
        self.alu
    }

    /// volume/10 + destination_pattern * weight / 100
    pub fn directional_demand(&self, rec: &TrafficRecord, forward: bool) -> Ciphertext {
        let alu = self.alu;
        let weight = if forward {
            self.config.forward_weight
        } else {
            self.config.reverse_weight
        };
        let base = alu.div_scalar(&rec.volume, 10);
        let directed = alu.div_scalar(&alu.mul_scalar(&rec.destination_pattern, weight), 100);
        alu.add(&base, &directed)
    }

    /// congestion_level * volume / 100
    pub fn congestion_impact(&self, rec: &TrafficRecord) -> Ciphertext {
        let product = self.alu.mul(&rec.congestion_level, &rec.volume);
        self.alu.div_scalar(&product, 100)
    }

    /// Forward share of total demand, in percent
    pub fn lane_allocation_ratio(&self, rec: &TrafficRecord) -> Ciphertext {
        let alu = self.alu;
        let forward = self.directional_demand(rec, true);
        let reverse = self.directional_demand(rec, false);
        let total = alu.add(&forward, &reverse);
        alu.div(&alu.mul_scalar(&forward, 100), &total)
    }

    /// Mean volume over the sensor's whole history, scaled by 1.2
    ///
    /// Cost is linear in the number of submissions from this sensor.
    pub fn peak_traffic_prediction(&self, sensor: &Principal) -> Ciphertext {
        let alu = self.alu;
        let history = self.store.records_of(sensor);
        if history.is_empty() {
            return alu.constant(0);
        }

        let mut sum = alu.constant(0);
        for rec in &history {
            sum = alu.add(&sum, &rec.volume);
        }
        let count = u32::try_from(history.len()).unwrap_or(u32::MAX);
        let avg = alu.div_scalar(&sum, count);
        alu.div_scalar(&alu.mul_scalar(&avg, PEAK_FACTOR.0), PEAK_FACTOR.1)
    }

    /// Latest volume plus the mean of the last two volume deltas
    ///
    /// The deltas telescope to `v3 - v1`; its sign is resolved with a select
    /// so a falling trend does not wrap. Needs three points, else 0.
    pub fn future_demand_prediction(&self, sensor: &Principal) -> Ciphertext {
        let alu = self.alu;
        let recent = self.store.latest(sensor, 3);
        if recent.len() < 3 {
            return alu.constant(0);
        }

        let first = &recent[0].volume;
        let last = &recent[2].volume;
        let rising = alu.gt(last, first);
        let up = alu.add(last, &alu.div_scalar(&alu.sub(last, first), 2));
        let down = alu.sub(last, &alu.div_scalar(&alu.sub(first, last), 2));
        alu.select(&rising, &up, &down)
    }

    /// base - base / (flow_rate / 100), with base = congestion_level * 60 / 10
    pub fn travel_time_savings(&self, cfg: &LaneConfig, rec: &TrafficRecord) -> Ciphertext {
        let alu = self.alu;
        let base = alu.div_scalar(&alu.mul_scalar(&rec.congestion_level, 60), 10);
        let factor = alu.div_scalar(&cfg.flow_rate, 100);
        alu.sub(&base, &alu.div(&base, &factor))
    }

    /// congestion_level * 5
    pub fn environmental_impact(&self, rec: &TrafficRecord) -> Ciphertext {
        self.alu.mul_scalar(&rec.congestion_level, 5)
    }

    /// 100 - (congestion_level + avg_speed/10) / 2
    pub fn safety_index(&self, rec: &TrafficRecord) -> Ciphertext {
        let alu = self.alu;
        let risk = alu.add(&rec.congestion_level, &alu.div_scalar(&rec.avg_speed, 10));
        alu.scalar_sub(100, &alu.div_scalar(&risk, 2))
    }

    /// Green time in seconds: 60 + volume/10 + congestion_level/5
    pub fn signal_timing(&self, rec: &TrafficRecord) -> Ciphertext {
        let alu = self.alu;
        let timing = alu.add_scalar(&alu.div_scalar(&rec.volume, 10), 60);
        alu.add(&timing, &alu.div_scalar(&rec.congestion_level, 5))
    }

    /// flow_rate * 100 / volume
    pub fn network_efficiency(&self, cfg: &LaneConfig, rec: &TrafficRecord) -> Ciphertext {
        self.alu.div(&self.alu.mul_scalar(&cfg.flow_rate, 100), &rec.volume)
    }

    /// travel_time_savings * 30
    pub fn economic_impact(&self, cfg: &LaneConfig, rec: &TrafficRecord) -> Ciphertext {
        self.alu.mul_scalar(&self.travel_time_savings(cfg, rec), 30)
    }

    /// travel_time_savings + economic_impact + (100 - environmental_impact)
    pub fn public_benefit(&self, cfg: &LaneConfig, rec: &TrafficRecord) -> Ciphertext {
        let alu = self.alu;
        let savings = self.travel_time_savings(cfg, rec);
        let economic = alu.mul_scalar(&savings, 30);
        let environment = alu.scalar_sub(100, &self.environmental_impact(rec));
        alu.add(&alu.add(&savings, &economic), &environment)
    }

    /// 100 - congestion_level
    pub fn resilience_index(&self, rec: &TrafficRecord) -> Ciphertext {
        self.alu.scalar_sub(100, &rec.congestion_level)
    }

    /// |Δvolume| > 20 or |Δavg_speed| > 10 between the last two readings
    pub fn pattern_change(&self, sensor: &Principal) -> EncryptedBool {
        let alu = self.alu;
        let recent = self.store.latest(sensor, 2);
        if recent.len() < 2 {
            return self.encrypted_false();
        }

        let (prev, last) = (recent[0], recent[1]);
        let volume_delta = alu.abs(&alu.sub(&last.volume, &prev.volume));
        let speed_delta = alu.abs(&alu.sub(&last.avg_speed, &prev.avg_speed));
        alu.or(&alu.gt_scalar(&volume_delta, 20), &alu.gt_scalar(&speed_delta, 10))
    }

    /// Δvolume > 50 and Δavg_speed < -20 between the last two readings
    ///
    /// Deltas are unsigned and wrap, and -20 is its u32 wrap (`u32::MAX - 19`).
    /// So a volume drop also reads as a large rise, and the speed test only
    /// fails for a speed drop of 1 to 20. Needs three readings, else false.
    pub fn anomaly(&self, sensor: &Principal) -> EncryptedBool {
        let alu = self.alu;
        if self.store.history(sensor).len() < 3 {
            return self.encrypted_false();
        }

        let recent = self.store.latest(sensor, 2);
        let (prev, last) = (recent[0], recent[1]);
        let volume_delta = alu.sub(&last.volume, &prev.volume);
        let speed_delta = alu.sub(&last.avg_speed, &prev.avg_speed);
        alu.and(
            &alu.gt_scalar(&volume_delta, 50),
            &alu.lt_scalar(&speed_delta, (-20i32) as u32),
        )
    }

    /// Volume after a special event of the given encrypted impact
    pub fn special_event_volume(&self, rec: &TrafficRecord, impact: &Ciphertext) -> Ciphertext {
        self.alu.add(&rec.volume, &self.alu.div_scalar(impact, 10))
    }

    /// Congestion after one adaptive-control step: -10 above 70, else +5
    pub fn adaptive_congestion(&self, rec: &TrafficRecord) -> Ciphertext {
        let alu = self.alu;
        let high = alu.gt_scalar(&rec.congestion_level, 70);
        let relieved = alu.sub(&rec.congestion_level, &alu.constant(10));
        let raised = alu.add_scalar(&rec.congestion_level, 5);
        alu.select(&high, &relieved, &raised)
    }

    /// Destination pattern with transit priority: +20 when congestion > 60
    pub fn transit_destination(&self, rec: &TrafficRecord) -> Ciphertext {
        let alu = self.alu;
        let congested = alu.gt_scalar(&rec.congestion_level, 60);
        let boosted = alu.add_scalar(&rec.destination_pattern, 20);
        alu.select(&congested, &boosted, &rec.destination_pattern)
    }

    pub fn record_metric(&self, metric: RecordMetric, rec: &TrafficRecord) -> Ciphertext {
        match metric {
            RecordMetric::ForwardDemand => self.directional_demand(rec, true),
            RecordMetric::ReverseDemand => self.directional_demand(rec, false),
            RecordMetric::CongestionImpact => self.congestion_impact(rec),
            RecordMetric::LaneAllocationRatio => self.lane_allocation_ratio(rec),
            RecordMetric::EnvironmentalImpact => self.environmental_impact(rec),
            RecordMetric::SafetyIndex => self.safety_index(rec),
            RecordMetric::SignalTiming => self.signal_timing(rec),
            RecordMetric::ResilienceIndex => self.resilience_index(rec),
        }
    }

    pub fn config_metric(&self, metric: ConfigMetric, cfg: &LaneConfig, rec: &TrafficRecord) -> Ciphertext {
        match metric {
            ConfigMetric::TravelTimeSavings => self.travel_time_savings(cfg, rec),
            ConfigMetric::NetworkEfficiency => self.network_efficiency(cfg, rec),
            ConfigMetric::EconomicImpact => self.economic_impact(cfg, rec),
            ConfigMetric::PublicBenefit => self.public_benefit(cfg, rec),
        }
    }

    pub fn sensor_metric(&self, metric: SensorMetric, sensor: &Principal) -> EncryptedValue {
        match metric {
            SensorMetric::PeakTraffic => EncryptedValue::Uint(self.peak_traffic_prediction(sensor)),
            SensorMetric::FutureDemand => EncryptedValue::Uint(self.future_demand_prediction(sensor)),
            SensorMetric::PatternChange => EncryptedValue::Bool(self.pattern_change(sensor)),
            SensorMetric::Anomaly => EncryptedValue::Bool(self.anomaly(sensor)),
        }
    }

    fn encrypted_false(&self) -> EncryptedBool {
        let zero = self.alu.constant(0);
        self.alu.gt(&zero, &zero)
    }
}

macro_rules! metric_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(format!("unknown {} metric: {}", stringify!($ty), s)),
                }
            }
        }
    };
}

/// Analytics over a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordMetric {
    ForwardDemand,
    ReverseDemand,
    CongestionImpact,
    LaneAllocationRatio,
    EnvironmentalImpact,
    SafetyIndex,
    SignalTiming,
    ResilienceIndex,
}

metric_names!(RecordMetric {
    ForwardDemand => "forward-demand",
    ReverseDemand => "reverse-demand",
    CongestionImpact => "congestion-impact",
    LaneAllocationRatio => "lane-allocation-ratio",
    EnvironmentalImpact => "environmental-impact",
    SafetyIndex => "safety-index",
    SignalTiming => "signal-timing",
    ResilienceIndex => "resilience-index",
});

/// Analytics over a lane config and the record it was planned from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigMetric {
    TravelTimeSavings,
    NetworkEfficiency,
    EconomicImpact,
    PublicBenefit,
}

metric_names!(ConfigMetric {
    TravelTimeSavings => "travel-time-savings",
    NetworkEfficiency => "network-efficiency",
    EconomicImpact => "economic-impact",
    PublicBenefit => "public-benefit",
});

/// Analytics over a sensor's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorMetric {
    PeakTraffic,
    FutureDemand,
    PatternChange,
    Anomaly,
}

metric_names!(SensorMetric {
    PeakTraffic => "peak-traffic",
    FutureDemand => "future-demand",
    PatternChange => "pattern-change",
    Anomaly => "anomaly",
});
