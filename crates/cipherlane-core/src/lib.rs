//! cipherlane-core: Shared types for encrypted lane control
//!
//! This crate defines the vocabulary every other crate speaks:
//! - Ciphertext handles (`Ciphertext`, `EncryptedBool`) and the `EncryptedAlu`
//!   capability that computes over them
//! - Telemetry records, lane configurations and revealed decisions
//! - The decryption oracle boundary (`DecryptionOracle`, `ProofVerifier`,
//!   `PlaintextBundle`)
//! - A plaintext shadow backend for development and tests
//!
//! # Privacy Model
//!
//! Sensor readings arrive already encrypted. Every derived value is another
//! ciphertext handle; the host never holds a secret plaintext until the
//! reveal protocol has run.
//!
//! | Information | Host Knowledge |
//! |-------------|----------------|
//! | Sensor identity, submission time | **YES** - provenance is public |
//! | Number of submissions per sensor | **YES** - history length drives analytics |
//! | Volume, speed, destination, congestion | NO - ciphertext handles only |
//! | Planned direction, lane count, flow rate | NO - until revealed |
//! | Revealed decision | **YES** - exactly once, after a verified callback |
//!
//! `EncryptedBool` deliberately has no conversion to `bool`: a secret
//! condition can only steer a computation through `EncryptedAlu::select`.

mod alu;
mod config;
mod direction;
mod error;
mod handle;
mod oracle;
mod principal;
mod proof;
mod record;
mod shadow;

pub use alu::EncryptedAlu;
pub use config::{ControllerConfig, PROTOCOL_VERSION};
pub use direction::Direction;
pub use error::Error;
pub use handle::{Ciphertext, EncryptedBool, Handle};
pub use oracle::{DecryptionOracle, PlaintextBundle, RequestId, BUNDLE_SIZE};
pub use principal::Principal;
pub use proof::{KeccakProofVerifier, ProofVerifier, PROOF_SIZE};
pub use record::{DecryptedConfig, LaneConfig, RecordField, RecordId, TrafficRecord};
pub use shadow::{Fulfillment, PendingRequest, ShadowAlu, ShadowOracle};

pub type Result<T> = std::result::Result<T, Error>;

/// Seconds since the unix epoch, 0 if the clock is before it
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Constants of the lane planning formulas
pub mod constants {
    /// Lanes available on a controlled corridor
    pub const TOTAL_LANES: u32 = 4;

    /// Percentage of destination pattern attributed to forward travel
    pub const FORWARD_WEIGHT: u32 = 70;

    /// Percentage of destination pattern attributed to reverse travel
    pub const REVERSE_WEIGHT: u32 = 30;

    /// Flow-rate boost applied when the corridor is reversed (numerator/denominator)
    pub const REVERSAL_BOOST_NUM: u32 = 12;
    pub const REVERSAL_BOOST_DEN: u32 = 10;

    /// Sentinel produced by division by an encrypted zero
    pub const DIV_BY_ZERO_SENTINEL: u32 = u32::MAX;
}
