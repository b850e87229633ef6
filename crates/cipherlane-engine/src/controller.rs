//! Traffic controller: the public entry points
//!
//! Each `&mut self` call is one serialized state transition. Ciphertext work
//! and every check happen before the first write, so a failing call leaves
//! the controller untouched.
//!
//! Intermediate ciphertexts are released once a computation finishes, and
//! read-only analytics are memoized until the next write. Repeated queries
//! therefore hold the backend's live handle count steady.

use std::sync::Arc;

use cipherlane_core::{
    unix_now, Ciphertext, ControllerConfig, DecryptedConfig, DecryptionOracle, EncryptedAlu,
    LaneConfig, Principal, ProofVerifier, RecordField, RecordId, RequestId, TrafficRecord,
};
use tracing::{info, warn};

use crate::access::AccessGuard;
use crate::analytics::{Analytics, ConfigMetric, EncryptedValue, RecordMetric, SensorMetric};
use crate::error::Result;
use crate::events::{Event, EventLog};
use crate::planner::{ConfigStore, LanePlanner};
use crate::reveal::{RevealRegistry, RevealState};
use crate::scratch::{Memo, Outputs, Scratch};
use crate::store::{Reading, TelemetryStore};

/// Counters for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ControllerStats {
    pub records: usize,
    pub sensors: usize,
    pub configs: usize,
    pub pending_reveals: usize,
    pub events: usize,
}

/// Encrypted lane controller
pub struct TrafficController {
    config: ControllerConfig,
    alu: Arc<dyn EncryptedAlu>,
    oracle: Arc<dyn DecryptionOracle>,
    verifier: Arc<dyn ProofVerifier>,
    access: AccessGuard,
    store: TelemetryStore,
    configs: ConfigStore,
    reveals: RevealRegistry,
    events: EventLog,
    /// Bumped by every write that can change an analytic result
    revision: u64,
    record_results: Memo<(RecordId, RecordMetric), Ciphertext>,
    config_results: Memo<(RecordId, ConfigMetric), Ciphertext>,
    /// `None` stands for every sensor without history
    sensor_results: Memo<(Option<Principal>, SensorMetric), EncryptedValue>,
}

impl TrafficController {
    /// Create a controller; `config.admin` becomes admin and first operator
    pub fn new(
        config: ControllerConfig,
        alu: Arc<dyn EncryptedAlu>,
        oracle: Arc<dyn DecryptionOracle>,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        let access = AccessGuard::new(config.admin);
        info!(admin = %config.admin, lanes = config.total_lanes, "Traffic controller initialized");
        Self {
            config,
            alu,
            oracle,
            verifier,
            access,
            store: TelemetryStore::new(),
            configs: ConfigStore::new(),
            reveals: RevealRegistry::new(),
            events: EventLog::new(),
            revision: 0,
            record_results: Memo::default(),
            config_results: Memo::default(),
            sensor_results: Memo::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run formulas against the store, keeping only the handles of the result
    fn compute<T: Outputs>(&self, f: impl FnOnce(&Analytics<'_>) -> T) -> T {
        let scratch = Scratch::new(self.alu.as_ref());
        let out = f(&Analytics::new(&scratch, &self.store, &self.config));
        scratch.finish(&out.handles());
        out
    }

    // Access

    /// Grant the operator role (admin only)
    pub fn authorize(&mut self, caller: &Principal, operator: Principal) -> Result<()> {
        if self.access.authorize(caller, operator)? {
            info!(%operator, "Operator authorized");
        }
        Ok(())
    }

    pub fn is_operator(&self, who: &Principal) -> bool {
        self.access.is_operator(who)
    }

    pub fn admin(&self) -> Principal {
        self.access.admin()
    }

    pub fn operators(&self) -> Vec<Principal> {
        self.access.operators()
    }

    // Telemetry

    /// Store an encrypted reading from any caller; ciphertexts are not validated
    pub fn submit(
        &mut self,
        sensor: &Principal,
        volume: Ciphertext,
        avg_speed: Ciphertext,
        destination_pattern: Ciphertext,
        congestion_level: Ciphertext,
    ) -> RecordId {
        let reading = Reading {
            volume,
            avg_speed,
            destination_pattern,
            congestion_level,
        };
        let id = self.store.submit(*sensor, reading, unix_now());
        self.revision += 1;
        self.events.emit(Event::DataReceived { id, sensor: *sensor });
        info!(id, %sensor, "Telemetry received");
        id
    }

    pub fn record(&self, id: RecordId) -> Result<&TrafficRecord> {
        self.store.get(id)
    }

    pub fn sensor_history(&self, sensor: &Principal) -> &[RecordId] {
        self.store.history(sensor)
    }

    /// Add `impact / 10` to the record's volume (operator only)
    pub fn adjust_for_special_event(&mut self, caller: &Principal, id: RecordId, impact: Ciphertext) -> Result<()> {
        self.access.require_operator(caller)?;
        let volume = {
            let rec = self.store.get(id)?;
            self.compute(|an| an.special_event_volume(rec, &impact))
        };
        self.store.mutate(id, RecordField::Volume, volume)?;
        self.revision += 1;
        info!(id, "Special event applied");
        Ok(())
    }

    /// One adaptive-control step on the record's congestion (operator only)
    pub fn adaptive_control(&mut self, caller: &Principal, id: RecordId) -> Result<()> {
        self.access.require_operator(caller)?;
        let congestion = {
            let rec = self.store.get(id)?;
            self.compute(|an| an.adaptive_congestion(rec))
        };
        self.store.mutate(id, RecordField::CongestionLevel, congestion)?;
        self.revision += 1;
        info!(id, "Adaptive control applied");
        Ok(())
    }

    /// Transit-priority adjustment of the destination pattern (operator only)
    pub fn optimize_for_transit(&mut self, caller: &Principal, id: RecordId) -> Result<()> {
        self.access.require_operator(caller)?;
        let destination = {
            let rec = self.store.get(id)?;
            self.compute(|an| an.transit_destination(rec))
        };
        self.store.mutate(id, RecordField::DestinationPattern, destination)?;
        self.revision += 1;
        info!(id, "Transit priority applied");
        Ok(())
    }

    // Planning

    /// Compute and store the lane configuration for a record (operator only)
    pub fn plan(&mut self, caller: &Principal, id: RecordId) -> Result<&LaneConfig> {
        self.access.require_operator(caller)?;
        let lane_config = {
            let rec = self.store.get(id)?;
            self.compute(|an| LanePlanner::new(an, &self.config).plan(rec, unix_now()))
        };

        let replaced = self.configs.insert(lane_config).is_some();
        self.revision += 1;
        self.events.emit(Event::LaneConfigUpdated { id });
        info!(id, replaced, "Lane config planned");
        self.configs.get(id)
    }

    pub fn lane_config(&self, id: RecordId) -> Result<&LaneConfig> {
        self.configs.get(id)
    }

    // Reveal

    /// Ask the oracle to decrypt a config (operator only)
    ///
    /// Emits no event. Several requests may be outstanding for one config;
    /// only the first valid callback takes effect.
    pub fn request_reveal(&mut self, caller: &Principal, id: RecordId) -> Result<RequestId> {
        self.access.require_operator(caller)?;
        self.reveals.ensure_not_revealed(id)?;
        let handles = self.configs.get(id)?.reveal_handles();

        let request_id = self
            .oracle
            .submit_for_decryption(&handles)
            .map_err(crate::error::Error::Oracle)?;
        if let Err(e) = self.reveals.record_request(request_id, id) {
            self.oracle.cancel(request_id);
            warn!(id, request_id, error = %e, "Oracle request withdrawn");
            return Err(e);
        }

        info!(id, request_id, "Reveal requested");
        Ok(request_id)
    }

    /// Oracle fulfillment entry point, open to any caller
    ///
    /// Authenticity comes from the proof, not from who calls.
    pub fn on_reveal_callback(&mut self, request_id: RequestId, bundle: &[u8], proof: &[u8]) -> Result<DecryptedConfig> {
        match self
            .reveals
            .process_callback(self.verifier.as_ref(), request_id, bundle, proof)
        {
            Ok((id, decrypted)) => {
                self.events.emit(Event::ConfigDecrypted { id });
                info!(
                    id,
                    request_id,
                    direction = ?decrypted.direction(),
                    lane_count = decrypted.lane_count,
                    flow_rate = decrypted.flow_rate,
                    "Config revealed"
                );
                Ok(decrypted)
            }
            Err(e) => {
                warn!(request_id, error = %e, "Reveal callback rejected");
                Err(e)
            }
        }
    }

    pub fn decrypted_config(&self, id: RecordId) -> DecryptedConfig {
        self.reveals.decrypted(id)
    }

    pub fn reveal_state(&self, id: RecordId) -> RevealState {
        self.reveals.state(id)
    }

    pub fn pending_requests(&self, id: RecordId) -> Vec<RequestId> {
        self.reveals.pending_requests(id)
    }

    // Analytics

    pub fn record_metric(&self, id: RecordId, metric: RecordMetric) -> Result<Ciphertext> {
        let rec = self.store.get(id)?;
        Ok(self
            .record_results
            .get_or_compute(self.alu.as_ref(), (id, metric), self.revision, || {
                self.compute(|an| an.record_metric(metric, rec))
            }))
    }

    pub fn config_metric(&self, id: RecordId, metric: ConfigMetric) -> Result<Ciphertext> {
        let cfg = self.configs.get(id)?;
        let rec = self.store.get(id)?;
        Ok(self
            .config_results
            .get_or_compute(self.alu.as_ref(), (id, metric), self.revision, || {
                self.compute(|an| an.config_metric(metric, cfg, rec))
            }))
    }

    pub fn sensor_metric(&self, sensor: &Principal, metric: SensorMetric) -> EncryptedValue {
        let key = (!self.store.history(sensor).is_empty()).then_some(*sensor);
        self.sensor_results
            .get_or_compute(self.alu.as_ref(), (key, metric), self.revision, || {
                self.compute(|an| an.sensor_metric(metric, sensor))
            })
    }

    // Events

    pub fn events(&self) -> &[Event] {
        self.events.all()
    }

    pub fn events_since(&self, offset: usize) -> &[Event] {
        self.events.since(offset)
    }

    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            records: self.store.len(),
            sensors: self.store.sensor_count(),
            configs: self.configs.len(),
            pending_reveals: self.reveals.pending_count(),
            events: self.events.len(),
        }
    }
}
