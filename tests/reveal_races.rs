//! Reveal protocol integration tests
//!
//! Several requests per config, callbacks in any order, forged and replayed
//! fulfillments. Exactly one valid callback may reveal a config.

use std::sync::Arc;

use cipherlane_core::{
    ControllerConfig, DecryptedConfig, Fulfillment, KeccakProofVerifier, PendingRequest,
    PlaintextBundle, Principal, ShadowAlu, ShadowOracle,
};
use cipherlane_engine::{Error, Event, RevealState, TrafficController};
use tokio::sync::RwLock;

const ADMIN: Principal = Principal::new([0xad; 20]);
const SENSOR: Principal = Principal::new([0x5a; 20]);
const ORACLE_KEY: &[u8] = b"reveal-races";

struct Setup {
    alu: Arc<ShadowAlu>,
    oracle: Arc<ShadowOracle>,
    controller: TrafficController,
}

impl Setup {
    fn new() -> Self {
        let alu = Arc::new(ShadowAlu::new());
        let verifier = KeccakProofVerifier::new(ORACLE_KEY.to_vec());
        let oracle = Arc::new(ShadowOracle::new(alu.clone(), verifier.clone()));
        let controller = TrafficController::new(
            ControllerConfig::new(ADMIN),
            alu.clone(),
            oracle.clone(),
            Arc::new(verifier),
        );
        Self {
            alu,
            oracle,
            controller,
        }
    }

    /// Submit and plan one record
    fn planned(&mut self, volume: u32, speed: u32, destination: u32, congestion: u32) -> u64 {
        let alu = self.alu.clone();
        let id = self.controller.submit(
            &SENSOR,
            alu.encrypt(volume),
            alu.encrypt(speed),
            alu.encrypt(destination),
            alu.encrypt(congestion),
        );
        self.controller.plan(&ADMIN, id).unwrap();
        id
    }

    fn fulfill_all(&self) -> Vec<Fulfillment> {
        self.oracle
            .take_pending()
            .iter()
            .map(|request| self.oracle.fulfill(request))
            .collect()
    }

    fn callback(&mut self, f: &Fulfillment) -> Result<DecryptedConfig, Error> {
        self.controller.on_reveal_callback(f.request_id, &f.bundle, &f.proof)
    }

    fn decrypted_events(&self) -> usize {
        self.controller
            .events()
            .iter()
            .filter(|e| matches!(e, Event::ConfigDecrypted { .. }))
            .count()
    }
}

#[test]
fn test_two_requests_reveal_exactly_once() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);

    let r1 = s.controller.request_reveal(&ADMIN, id).unwrap();
    let r2 = s.controller.request_reveal(&ADMIN, id).unwrap();
    assert_ne!(r1, r2);
    assert_eq!(s.controller.pending_requests(id), vec![r1, r2]);
    // requests are silent
    assert_eq!(s.decrypted_events(), 0);

    let fulfillments = s.fulfill_all();
    assert_eq!(fulfillments.len(), 2);

    // answer the later request first
    let revealed = s.callback(&fulfillments[1]).unwrap();
    assert_eq!(revealed, DecryptedConfig::revealed(0, 2, 480));
    assert_eq!(s.callback(&fulfillments[0]).unwrap_err(), Error::AlreadyRevealed(id));

    assert_eq!(s.decrypted_events(), 1);
    assert_eq!(s.controller.decrypted_config(id), revealed);
    assert!(s.controller.pending_requests(id).is_empty());
    assert_eq!(s.controller.request_reveal(&ADMIN, id).unwrap_err(), Error::AlreadyRevealed(id));
}

#[test]
fn test_replayed_callback_is_rejected() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    s.controller.request_reveal(&ADMIN, id).unwrap();
    let f = s.fulfill_all().remove(0);

    s.callback(&f).unwrap();
    assert_eq!(s.callback(&f).unwrap_err(), Error::AlreadyRevealed(id));
    assert_eq!(s.decrypted_events(), 1);
}

#[test]
fn test_tampered_proof_changes_nothing() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    s.controller.request_reveal(&ADMIN, id).unwrap();
    let f = s.fulfill_all().remove(0);

    let mut forged = f.clone();
    forged.proof[31] ^= 0x01;
    assert_eq!(s.callback(&forged).unwrap_err(), Error::InvalidProof(f.request_id));

    // bundle altered under the genuine proof
    let mut altered = f.clone();
    altered.bundle = PlaintextBundle::new(1, 4, 9999).to_bytes().to_vec();
    assert_eq!(s.callback(&altered).unwrap_err(), Error::InvalidProof(f.request_id));

    assert_eq!(s.controller.reveal_state(id), RevealState::Requested);
    assert_eq!(s.controller.decrypted_config(id), DecryptedConfig::default());
    assert_eq!(s.decrypted_events(), 0);

    // the genuine fulfillment still goes through
    assert_eq!(s.callback(&f).unwrap(), DecryptedConfig::revealed(0, 2, 480));
}

#[test]
fn test_proof_is_bound_to_request_id() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    let r1 = s.controller.request_reveal(&ADMIN, id).unwrap();
    let r2 = s.controller.request_reveal(&ADMIN, id).unwrap();
    let fulfillments = s.fulfill_all();

    let swapped = Fulfillment {
        request_id: r2,
        ..fulfillments[0].clone()
    };
    assert_eq!(fulfillments[0].request_id, r1);
    assert_eq!(s.callback(&swapped).unwrap_err(), Error::InvalidProof(r2));
    assert!(!matches!(s.controller.reveal_state(id), RevealState::Revealed));
}

#[test]
fn test_foreign_oracle_key_is_rejected() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    let request_id = s.controller.request_reveal(&ADMIN, id).unwrap();

    let bundle = PlaintextBundle::new(0, 2, 480).to_bytes().to_vec();
    let proof = KeccakProofVerifier::new(b"someone-else".to_vec())
        .sign(request_id, &bundle)
        .to_vec();
    assert_eq!(
        s.controller.on_reveal_callback(request_id, &bundle, &proof).unwrap_err(),
        Error::InvalidProof(request_id)
    );
}

#[test]
fn test_unknown_and_zero_request_ids() {
    let mut s = Setup::new();
    s.planned(100, 50, 80, 40);
    let signer = KeccakProofVerifier::new(ORACLE_KEY.to_vec());
    let bundle = PlaintextBundle::new(0, 2, 480).to_bytes().to_vec();

    for request_id in [0, 42] {
        let proof = signer.sign(request_id, &bundle).to_vec();
        assert_eq!(
            s.controller.on_reveal_callback(request_id, &bundle, &proof).unwrap_err(),
            Error::UnknownRequest(request_id)
        );
    }
}

#[test]
fn test_malformed_bundle_with_valid_proof() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    let request_id = s.controller.request_reveal(&ADMIN, id).unwrap();
    s.fulfill_all();

    let signer = KeccakProofVerifier::new(ORACLE_KEY.to_vec());
    let mut bundle = PlaintextBundle::new(0, 2, 480).to_bytes().to_vec();
    bundle[0] = 0xff;
    let proof = signer.sign(request_id, &bundle).to_vec();

    assert!(matches!(
        s.controller.on_reveal_callback(request_id, &bundle, &proof),
        Err(Error::MalformedBundle(_))
    ));
    assert_eq!(s.controller.reveal_state(id), RevealState::Requested);
}

#[test]
fn test_interleaved_configs() {
    let mut s = Setup::new();
    let forward = s.planned(100, 50, 80, 40);
    let other = s.planned(200, 30, 10, 90);

    let r_forward = s.controller.request_reveal(&ADMIN, forward).unwrap();
    let r_other = s.controller.request_reveal(&ADMIN, other).unwrap();
    let fulfillments = s.fulfill_all();
    let by_id = |id| {
        fulfillments
            .iter()
            .find(|f| f.request_id == id)
            .cloned()
            .unwrap()
    };

    // other first: forward 20+7=27, reverse 20+3=23; lanes (4*27/50)/2+1 = 2
    // flow 300 * (100 - 9) / 100 = 273
    let revealed = s.callback(&by_id(r_other)).unwrap();
    assert_eq!(revealed, DecryptedConfig::revealed(0, 2, 273));
    assert_eq!(s.controller.reveal_state(forward), RevealState::Requested);

    s.callback(&by_id(r_forward)).unwrap();
    assert_eq!(s.controller.reveal_state(forward), RevealState::Revealed);
    assert_eq!(
        s.controller.events().iter().rev().take(2).collect::<Vec<_>>(),
        vec![&Event::ConfigDecrypted { id: forward }, &Event::ConfigDecrypted { id: other }]
    );
}

#[test]
fn test_replan_after_reveal_keeps_revealed_value() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    s.controller.request_reveal(&ADMIN, id).unwrap();
    let f = s.fulfill_all().remove(0);
    s.callback(&f).unwrap();

    // change the volume and plan again; the revealed decision is final
    let impact = s.alu.encrypt(1000);
    s.controller.adjust_for_special_event(&ADMIN, id, impact).unwrap();
    s.controller.plan(&ADMIN, id).unwrap();
    assert_eq!(s.controller.decrypted_config(id), DecryptedConfig::revealed(0, 2, 480));
    assert_eq!(s.controller.request_reveal(&ADMIN, id).unwrap_err(), Error::AlreadyRevealed(id));
}

#[test]
fn test_pending_request_payload() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    let request_id = s.controller.request_reveal(&ADMIN, id).unwrap();

    let pending: Vec<PendingRequest> = s.oracle.take_pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request_id, request_id);
    assert_eq!(
        pending[0].ciphertexts,
        s.controller.lane_config(id).unwrap().reveal_handles().to_vec()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callbacks_reveal_once() {
    let mut s = Setup::new();
    let id = s.planned(100, 50, 80, 40);
    for _ in 0..8 {
        s.controller.request_reveal(&ADMIN, id).unwrap();
    }
    let fulfillments = s.fulfill_all();
    let controller = Arc::new(RwLock::new(s.controller));

    let tasks: Vec<_> = fulfillments
        .into_iter()
        .map(|f| {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .write()
                    .await
                    .on_reveal_callback(f.request_id, &f.bundle, &f.proof)
            })
        })
        .collect();

    let mut revealed = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(cfg) => {
                assert_eq!(cfg, DecryptedConfig::revealed(0, 2, 480));
                revealed += 1;
            }
            Err(e) => {
                assert_eq!(e, Error::AlreadyRevealed(id));
                rejected += 1;
            }
        }
    }
    assert_eq!((revealed, rejected), (1, 7));

    let controller = controller.read().await;
    let decrypted = controller
        .events()
        .iter()
        .filter(|e| matches!(e, Event::ConfigDecrypted { .. }))
        .count();
    assert_eq!(decrypted, 1);
}
