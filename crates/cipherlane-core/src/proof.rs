//! Verification of oracle decryption proofs

use tiny_keccak::{Hasher, Keccak};

use crate::RequestId;

/// Length of a keccak proof
pub const PROOF_SIZE: usize = 32;

const PROOF_DOMAIN: &[u8] = b"cipherlane.reveal.v1";

/// Checks that a plaintext bundle is the oracle's answer to a request
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, request_id: RequestId, bundle: &[u8], proof: &[u8]) -> bool;
}

/// Keyed keccak-256 proof shared between the controller and the oracle
///
/// `proof = keccak256(domain || key || request_id (be) || bundle)`
#[derive(Clone)]
pub struct KeccakProofVerifier {
    key: Vec<u8>,
}

impl KeccakProofVerifier {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Produce the proof the oracle attaches to a fulfilled request
    pub fn sign(&self, request_id: RequestId, bundle: &[u8]) -> [u8; PROOF_SIZE] {
        let mut hasher = Keccak::v256();
        hasher.update(PROOF_DOMAIN);
        hasher.update(&self.key);
        hasher.update(&request_id.to_be_bytes());
        hasher.update(bundle);
        let mut out = [0u8; PROOF_SIZE];
        hasher.finalize(&mut out);
        out
    }
}

impl ProofVerifier for KeccakProofVerifier {
    fn verify(&self, request_id: RequestId, bundle: &[u8], proof: &[u8]) -> bool {
        let expected = self.sign(request_id, bundle);
        constant_time_eq(&expected, proof)
    }
}

impl std::fmt::Debug for KeccakProofVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeccakProofVerifier").finish_non_exhaustive()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
