//! Decryption oracle boundary
//!
//! The oracle network is external: this crate only describes what is handed
//! to it (ciphertext handles) and what comes back (an ABI-style plaintext
//! bundle plus a proof checked by a `ProofVerifier`).

use serde::{Deserialize, Serialize};

use crate::{Ciphertext, Error, Result};

/// Oracle-issued identifier of a decryption request; 0 is never valid
pub type RequestId = u64;

/// Size of a three-word plaintext bundle
pub const BUNDLE_SIZE: usize = 3 * WORD_SIZE;

const WORD_SIZE: usize = 32;

/// Submits ciphertexts for asynchronous decryption
///
/// The matching plaintexts arrive later through the controller's callback
/// entry point, possibly out of order and possibly more than once.
pub trait DecryptionOracle: Send + Sync {
    fn submit_for_decryption(&self, ciphertexts: &[Ciphertext]) -> std::result::Result<RequestId, String>;

    /// Withdraw the most recent submission under `request_id`
    ///
    /// Called when the controller refuses the id it was handed, so the oracle
    /// is not left answering a request nothing maps.
    fn cancel(&self, _request_id: RequestId) {}
}

/// Decoded reveal payload: direction, lane count, flow rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBundle {
    pub direction: u32,
    pub lane_count: u32,
    pub flow_rate: u32,
}

impl PlaintextBundle {
    pub fn new(direction: u32, lane_count: u32, flow_rate: u32) -> Self {
        Self {
            direction,
            lane_count,
            flow_rate,
        }
    }

    /// Encode as three 32-byte big-endian words
    pub fn to_bytes(&self) -> [u8; BUNDLE_SIZE] {
        let mut bytes = [0u8; BUNDLE_SIZE];
        for (i, value) in [self.direction, self.lane_count, self.flow_rate].iter().enumerate() {
            let end = (i + 1) * WORD_SIZE;
            bytes[end - 4..end].copy_from_slice(&value.to_be_bytes());
        }
        bytes
    }

    /// Decode exactly three words, each holding a u32
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BUNDLE_SIZE {
            return Err(Error::MalformedBundle(format!(
                "expected {} bytes, got {}",
                BUNDLE_SIZE,
                bytes.len()
            )));
        }

        let mut values = [0u32; 3];
        for (i, word) in bytes.chunks_exact(WORD_SIZE).enumerate() {
            if word[..WORD_SIZE - 4].iter().any(|b| *b != 0) {
                return Err(Error::MalformedBundle(format!("word {} exceeds u32 range", i)));
            }
            let mut be = [0u8; 4];
            be.copy_from_slice(&word[WORD_SIZE - 4..]);
            values[i] = u32::from_be_bytes(be);
        }

        Ok(Self::new(values[0], values[1], values[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_layout() {
        let bytes = PlaintextBundle::new(1, 2, 0x0102_0304).to_bytes();
        assert_eq!(bytes.len(), 96);
        assert_eq!(bytes[31], 1);
        assert_eq!(bytes[63], 2);
        assert_eq!(&bytes[92..96], &[1, 2, 3, 4]);
        assert!(bytes[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_bundle_decode() {
        let bundle = PlaintextBundle::new(0, 2, 480);
        assert_eq!(PlaintextBundle::from_bytes(&bundle.to_bytes()).unwrap(), bundle);
    }

    #[test]
    fn test_bundle_rejects_wrong_length() {
        assert!(matches!(
            PlaintextBundle::from_bytes(&[0u8; 64]),
            Err(Error::MalformedBundle(_))
        ));
        assert!(PlaintextBundle::from_bytes(&[0u8; 128]).is_err());
    }

    #[test]
    fn test_bundle_rejects_oversized_word() {
        let mut bytes = PlaintextBundle::new(0, 2, 480).to_bytes();
        bytes[40] = 1;
        assert!(matches!(
            PlaintextBundle::from_bytes(&bytes),
            Err(Error::MalformedBundle(_))
        ));
    }
}
