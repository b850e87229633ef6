//! One-time reveal of lane configurations
//!
//! Per config id the protocol moves `NoRequest -> Requested -> Revealed`.
//! `Requested` is not stored: it is "some request maps to this id and the id
//! is not revealed yet". `Revealed` is terminal. Request mappings are kept
//! after the callback so a replayed request id still resolves, and then
//! fails as already revealed instead of looking forged.
//!
//! Outstanding requests never expire. A request the oracle never answers
//! leaves its config `Requested` for good; a fresh request is the only way on.

use std::collections::HashMap;

use cipherlane_core::{DecryptedConfig, PlaintextBundle, ProofVerifier, RecordId, RequestId};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reveal progress of a config id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    NoRequest,
    Requested,
    Revealed,
}

/// Request mappings and revealed plaintexts
#[derive(Debug, Clone, Default)]
pub struct RevealRegistry {
    requests: HashMap<RequestId, RecordId>,
    decrypted: HashMap<RecordId, DecryptedConfig>,
}

impl RevealRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: RecordId) -> RevealState {
        if self.is_revealed(id) {
            RevealState::Revealed
        } else if self.requests.values().any(|target| *target == id) {
            RevealState::Requested
        } else {
            RevealState::NoRequest
        }
    }

    pub fn is_revealed(&self, id: RecordId) -> bool {
        self.decrypted.get(&id).is_some_and(|d| d.revealed)
    }

    /// Revealed plaintext, or the unrevealed default
    pub fn decrypted(&self, id: RecordId) -> DecryptedConfig {
        self.decrypted.get(&id).copied().unwrap_or_default()
    }

    pub fn ensure_not_revealed(&self, id: RecordId) -> Result<()> {
        if self.is_revealed(id) {
            return Err(Error::AlreadyRevealed(id));
        }
        Ok(())
    }

    /// Remember which config an oracle request decrypts
    ///
    /// The oracle must hand out fresh, non-zero ids; anything else is
    /// rejected before the mapping is touched.
    pub fn record_request(&mut self, request_id: RequestId, id: RecordId) -> Result<()> {
        if request_id == 0 {
            return Err(Error::Oracle("oracle returned request id 0".into()));
        }
        if let Some(existing) = self.requests.get(&request_id) {
            return Err(Error::Oracle(format!(
                "oracle reused request id {} (already maps to config {})",
                request_id, existing
            )));
        }
        self.requests.insert(request_id, id);
        Ok(())
    }

    pub fn resolve(&self, request_id: RequestId) -> Result<RecordId> {
        if request_id == 0 {
            return Err(Error::UnknownRequest(request_id));
        }
        self.requests
            .get(&request_id)
            .copied()
            .ok_or(Error::UnknownRequest(request_id))
    }

    /// Unanswered request ids for a config, oldest first
    pub fn pending_requests(&self, id: RecordId) -> Vec<RequestId> {
        if self.is_revealed(id) {
            return Vec::new();
        }
        let mut pending: Vec<_> = self
            .requests
            .iter()
            .filter(|(_, target)| **target == id)
            .map(|(request_id, _)| *request_id)
            .collect();
        pending.sort_unstable();
        pending
    }

    /// Total unanswered requests across all configs
    pub fn pending_count(&self) -> usize {
        self.requests
            .values()
            .filter(|target| !self.is_revealed(**target))
            .count()
    }

    /// Apply an oracle callback
    ///
    /// Checks run in order: known request, not yet revealed, valid proof,
    /// well-formed bundle. Only when all pass is the plaintext written.
    pub fn process_callback(
        &mut self,
        verifier: &dyn ProofVerifier,
        request_id: RequestId,
        bundle: &[u8],
        proof: &[u8],
    ) -> Result<(RecordId, DecryptedConfig)> {
        let id = self.resolve(request_id)?;
        self.ensure_not_revealed(id)?;

        if !verifier.verify(request_id, bundle, proof) {
            return Err(Error::InvalidProof(request_id));
        }

        let values = PlaintextBundle::from_bytes(bundle)
            .map_err(|e| Error::MalformedBundle(e.to_string()))?;

        let decrypted = DecryptedConfig::revealed(values.direction, values.lane_count, values.flow_rate);
        self.decrypted.insert(id, decrypted);
        Ok((id, decrypted))
    }
}
