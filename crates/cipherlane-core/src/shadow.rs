//! Plaintext shadow backend
//!
//! `ShadowAlu` implements `EncryptedAlu` by keeping every "ciphertext" in a
//! private plaintext table keyed by opaque handles. It follows the exact
//! arithmetic semantics required of real backends, so a shadow run predicts
//! what an encrypted run reveals. `ShadowOracle` plays the decryption network
//! against the same table and signs its answers with a `KeccakProofVerifier`.
//!
//! Neither type provides confidentiality. They exist for development servers
//! and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

use crate::{
    Ciphertext, DecryptionOracle, EncryptedAlu, EncryptedBool, Handle, KeccakProofVerifier,
    RequestId,
};

const HANDLE_DOMAIN: &[u8] = b"cipherlane.shadow.handle";

#[derive(Default)]
struct ShadowTable {
    values: HashMap<Handle, u32>,
    constants: HashMap<u32, Handle>,
    issued: u64,
}

impl ShadowTable {
    fn read(&self, handle: &Handle) -> u32 {
        self.values.get(handle).copied().unwrap_or(0)
    }

    fn alloc(&mut self, value: u32) -> Handle {
        self.issued += 1;
        let mut hasher = Keccak::v256();
        hasher.update(HANDLE_DOMAIN);
        hasher.update(&self.issued.to_be_bytes());
        let mut out = [0u8; 32];
        hasher.finalize(&mut out);

        let handle = Handle(out);
        self.values.insert(handle, value);
        handle
    }

    fn constant(&mut self, value: u32) -> Handle {
        if let Some(handle) = self.constants.get(&value) {
            return *handle;
        }
        let handle = self.alloc(value);
        self.constants.insert(value, handle);
        handle
    }

    fn release(&mut self, handle: &Handle) {
        let shared = self
            .values
            .get(handle)
            .is_some_and(|value| self.constants.get(value) == Some(handle));
        if !shared {
            self.values.remove(handle);
        }
    }
}

/// Plaintext-backed implementation of the encrypted ALU
#[derive(Default)]
pub struct ShadowAlu {
    table: Mutex<ShadowTable>,
}

impl ShadowAlu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stand-in for client-side encryption of a sensor reading
    pub fn encrypt(&self, value: u32) -> Ciphertext {
        Ciphertext::from_handle(self.lock().alloc(value))
    }

    /// Plaintext behind a handle, if this backend issued it
    pub fn peek(&self, handle: &Handle) -> Option<u32> {
        self.lock().values.get(handle).copied()
    }

    /// Plaintext of a ciphertext; unknown handles read as 0
    pub fn decrypt(&self, ct: &Ciphertext) -> u32 {
        self.lock().read(&ct.handle())
    }

    pub fn decrypt_bool(&self, b: &EncryptedBool) -> bool {
        self.lock().read(&b.handle()) != 0
    }

    /// Number of handles issued so far, released ones included
    pub fn issued(&self) -> u64 {
        self.lock().issued
    }

    /// Number of handles currently held in the table
    pub fn live(&self) -> usize {
        self.lock().values.len()
    }

    fn lock(&self) -> MutexGuard<'_, ShadowTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn binary(&self, a: &Handle, b: &Handle, op: impl FnOnce(u32, u32) -> u32) -> Handle {
        let mut table = self.lock();
        let value = op(table.read(a), table.read(b));
        table.alloc(value)
    }
}

impl EncryptedAlu for ShadowAlu {
    fn constant(&self, value: u32) -> Ciphertext {
        Ciphertext::from_handle(self.lock().constant(value))
    }

    fn release(&self, handles: &[Handle]) {
        let mut table = self.lock();
        for handle in handles {
            table.release(handle);
        }
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext::from_handle(self.binary(&a.handle(), &b.handle(), u32::wrapping_add))
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext::from_handle(self.binary(&a.handle(), &b.handle(), u32::wrapping_sub))
    }

    fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext::from_handle(self.binary(&a.handle(), &b.handle(), u32::wrapping_mul))
    }

    fn div(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext::from_handle(self.binary(&a.handle(), &b.handle(), |x, y| {
            x.checked_div(y).unwrap_or(crate::constants::DIV_BY_ZERO_SENTINEL)
        }))
    }

    fn abs(&self, a: &Ciphertext) -> Ciphertext {
        let mut table = self.lock();
        let value = (table.read(&a.handle()) as i32).unsigned_abs();
        Ciphertext::from_handle(table.alloc(value))
    }

    fn gt(&self, a: &Ciphertext, b: &Ciphertext) -> EncryptedBool {
        EncryptedBool::from_handle(self.binary(&a.handle(), &b.handle(), |x, y| (x > y) as u32))
    }

    fn lt(&self, a: &Ciphertext, b: &Ciphertext) -> EncryptedBool {
        EncryptedBool::from_handle(self.binary(&a.handle(), &b.handle(), |x, y| (x < y) as u32))
    }

    fn and(&self, a: &EncryptedBool, b: &EncryptedBool) -> EncryptedBool {
        EncryptedBool::from_handle(self.binary(&a.handle(), &b.handle(), |x, y| {
            (x != 0 && y != 0) as u32
        }))
    }

    fn or(&self, a: &EncryptedBool, b: &EncryptedBool) -> EncryptedBool {
        EncryptedBool::from_handle(self.binary(&a.handle(), &b.handle(), |x, y| {
            (x != 0 || y != 0) as u32
        }))
    }

    fn select(&self, cond: &EncryptedBool, if_true: &Ciphertext, if_false: &Ciphertext) -> Ciphertext {
        let mut table = self.lock();
        let value = if table.read(&cond.handle()) != 0 {
            table.read(&if_true.handle())
        } else {
            table.read(&if_false.handle())
        };
        Ciphertext::from_handle(table.alloc(value))
    }
}

/// A decryption request waiting for the shadow oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub ciphertexts: Vec<Ciphertext>,
}

/// Signed answer to a decryption request, ready for the callback entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfillment {
    pub request_id: RequestId,
    pub bundle: Vec<u8>,
    pub proof: Vec<u8>,
}

#[derive(Default)]
struct OracleQueue {
    last_id: RequestId,
    pending: VecDeque<PendingRequest>,
}

/// In-process decryption oracle backed by a `ShadowAlu`
pub struct ShadowOracle {
    alu: Arc<ShadowAlu>,
    signer: KeccakProofVerifier,
    queue: Mutex<OracleQueue>,
    offline: AtomicBool,
}

impl ShadowOracle {
    pub fn new(alu: Arc<ShadowAlu>, signer: KeccakProofVerifier) -> Self {
        Self {
            alu,
            signer,
            queue: Mutex::new(OracleQueue::default()),
            offline: AtomicBool::new(false),
        }
    }

    /// Refuse new submissions while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Drain every request submitted so far, oldest first
    pub fn take_pending(&self) -> Vec<PendingRequest> {
        self.lock().pending.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Decrypt a request and sign the resulting bundle
    pub fn fulfill(&self, request: &PendingRequest) -> Fulfillment {
        let mut bundle = Vec::with_capacity(request.ciphertexts.len() * 32);
        for ct in &request.ciphertexts {
            let mut word = [0u8; 32];
            word[28..].copy_from_slice(&self.alu.decrypt(ct).to_be_bytes());
            bundle.extend_from_slice(&word);
        }
        let proof = self.signer.sign(request.request_id, &bundle).to_vec();

        Fulfillment {
            request_id: request.request_id,
            bundle,
            proof,
        }
    }

    fn lock(&self) -> MutexGuard<'_, OracleQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DecryptionOracle for ShadowOracle {
    fn submit_for_decryption(&self, ciphertexts: &[Ciphertext]) -> Result<RequestId, String> {
        if self.offline.load(Ordering::SeqCst) {
            return Err("shadow oracle is offline".to_string());
        }

        let mut queue = self.lock();
        queue.last_id += 1;
        let request_id = queue.last_id;
        queue.pending.push_back(PendingRequest {
            request_id,
            ciphertexts: ciphertexts.to_vec(),
        });
        Ok(request_id)
    }

    fn cancel(&self, request_id: RequestId) {
        let mut queue = self.lock();
        if let Some(pos) = queue.pending.iter().rposition(|r| r.request_id == request_id) {
            queue.pending.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PlaintextBundle, ProofVerifier};

    #[test]
    fn test_arithmetic_wraps() {
        let alu = ShadowAlu::new();
        let small = alu.encrypt(3);
        let big = alu.encrypt(u32::MAX);

        assert_eq!(alu.decrypt(&alu.add(&big, &small)), 2);
        assert_eq!(alu.decrypt(&alu.sub(&small, &alu.encrypt(5))), u32::MAX - 1);
        assert_eq!(alu.decrypt(&alu.mul(&big, &alu.encrypt(2))), u32::MAX - 1);
    }

    #[test]
    fn test_div_by_zero_is_sentinel() {
        let alu = ShadowAlu::new();
        let q = alu.div(&alu.encrypt(10), &alu.encrypt(0));
        assert_eq!(alu.decrypt(&q), u32::MAX);
        assert_eq!(alu.decrypt(&alu.div_scalar(&alu.encrypt(10), 3)), 3);
    }

    #[test]
    fn test_abs_reads_twos_complement() {
        let alu = ShadowAlu::new();
        let delta = alu.sub(&alu.encrypt(130), &alu.encrypt(150));
        assert_eq!(alu.decrypt(&alu.abs(&delta)), 20);
        assert_eq!(alu.decrypt(&alu.abs(&alu.encrypt(20))), 20);
    }

    #[test]
    fn test_select_and_booleans() {
        let alu = ShadowAlu::new();
        let a = alu.encrypt(10);
        let b = alu.encrypt(20);
        let yes = alu.lt(&a, &b);
        let no = alu.gt(&a, &b);

        assert_eq!(alu.decrypt(&alu.select(&yes, &a, &b)), 10);
        assert_eq!(alu.decrypt(&alu.select(&no, &a, &b)), 20);
        assert!(alu.decrypt_bool(&alu.or(&yes, &no)));
        assert!(!alu.decrypt_bool(&alu.and(&yes, &no)));
    }

    #[test]
    fn test_handles_are_opaque_and_unique() {
        let alu = ShadowAlu::new();
        let a = alu.encrypt(5);
        let b = alu.encrypt(5);
        assert_ne!(a, b);
        assert_eq!(alu.issued(), 2);
    }

    #[test]
    fn test_constants_are_shared() {
        let alu = ShadowAlu::new();
        let a = alu.constant(10);
        let b = alu.constant(10);
        assert_eq!(a, b);
        assert_ne!(alu.constant(11), a);
        assert_eq!(alu.live(), 2);

        // a released constant stays readable for every other holder
        alu.release(&[a.handle()]);
        assert_eq!(alu.decrypt(&b), 10);
    }

    #[test]
    fn test_release_frees_intermediates() {
        let alu = ShadowAlu::new();
        let x = alu.encrypt(7);
        let sum = alu.add_scalar(&x, 3);
        let doubled = alu.mul_scalar(&sum, 2);
        assert_eq!(alu.live(), 5);

        alu.release(&[sum.handle()]);
        assert_eq!(alu.live(), 4);
        assert_eq!(alu.peek(&sum.handle()), None);
        assert_eq!(alu.decrypt(&doubled), 20);
        assert_eq!(alu.issued(), 5);
    }

    #[test]
    fn test_unknown_handle_reads_as_zero() {
        let alu = ShadowAlu::new();
        let forged = Ciphertext::from_handle(Handle([9u8; 32]));
        assert_eq!(alu.peek(&forged.handle()), None);
        assert_eq!(alu.decrypt(&alu.add_scalar(&forged, 4)), 4);
    }

    #[test]
    fn test_oracle_fulfills_with_valid_proof() {
        let alu = Arc::new(ShadowAlu::new());
        let verifier = KeccakProofVerifier::new(b"k".to_vec());
        let oracle = ShadowOracle::new(alu.clone(), verifier.clone());

        let cts = [alu.encrypt(1), alu.encrypt(3), alu.encrypt(576)];
        let id = oracle.submit_for_decryption(&cts).unwrap();
        assert_eq!(id, 1);
        assert_eq!(oracle.pending_count(), 1);

        let pending = oracle.take_pending();
        assert_eq!(oracle.pending_count(), 0);

        let fulfillment = oracle.fulfill(&pending[0]);
        assert!(verifier.verify(id, &fulfillment.bundle, &fulfillment.proof));
        assert_eq!(
            PlaintextBundle::from_bytes(&fulfillment.bundle).unwrap(),
            PlaintextBundle::new(1, 3, 576)
        );
    }

    #[test]
    fn test_cancel_withdraws_request() {
        let alu = Arc::new(ShadowAlu::new());
        let oracle = ShadowOracle::new(alu.clone(), KeccakProofVerifier::new(b"k".to_vec()));
        let first = oracle.submit_for_decryption(&[alu.encrypt(1)]).unwrap();
        let second = oracle.submit_for_decryption(&[alu.encrypt(2)]).unwrap();

        oracle.cancel(first);
        oracle.cancel(99);
        let pending = oracle.take_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request_id, second);
    }

    #[test]
    fn test_offline_oracle_rejects_submissions() {
        let alu = Arc::new(ShadowAlu::new());
        let oracle = ShadowOracle::new(alu.clone(), KeccakProofVerifier::new(b"k".to_vec()));
        oracle.set_offline(true);
        assert!(oracle.submit_for_decryption(&[alu.encrypt(1)]).is_err());
        assert_eq!(oracle.pending_count(), 0);
    }
}
