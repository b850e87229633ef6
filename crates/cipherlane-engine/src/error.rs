//! Engine error types

use cipherlane_core::{Principal, RecordId, RequestId};
use thiserror::Error;

use crate::access::Role;

/// Every failure leaves controller state exactly as it was before the call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unauthorized: {caller} lacks the {role} role")]
    Unauthorized { caller: Principal, role: Role },

    #[error("Config {0} has already been revealed")]
    AlreadyRevealed(RecordId),

    #[error("Unknown decryption request: {0}")]
    UnknownRequest(RequestId),

    #[error("Invalid decryption proof for request {0}")]
    InvalidProof(RequestId),

    #[error("Unknown traffic record: {0}")]
    UnknownRecord(RecordId),

    #[error("No lane config for record {0}")]
    UnknownConfig(RecordId),

    #[error("Malformed plaintext bundle: {0}")]
    MalformedBundle(String),

    #[error("Decryption oracle error: {0}")]
    Oracle(String),
}

pub type Result<T> = std::result::Result<T, Error>;
