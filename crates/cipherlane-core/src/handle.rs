//! Opaque ciphertext handles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 32-byte reference to a value held by an encrypted backend
///
/// A handle carries no information about the value it names. Two handles
/// that encrypt the same plaintext are in general different.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl Handle {
    pub const ZERO: Handle = Handle([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 4 bytes are enough to tell handles apart in logs
        write!(f, "Handle(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Handle {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        hex_bytes::parse(s)
            .map(Handle)
            .map_err(|e| crate::Error::InvalidHex(format!("handle: {}", e)))
    }
}

/// Encrypted unsigned 32-bit integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ciphertext(Handle);

impl Ciphertext {
    pub fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    pub fn handle(&self) -> Handle {
        self.0
    }
}

/// Encrypted boolean
///
/// Has no accessor for a host `bool`; use `EncryptedAlu::select` to let it
/// pick between two ciphertexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedBool(Handle);

impl EncryptedBool {
    pub fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    pub fn handle(&self) -> Handle {
        self.0
    }
}

pub(crate) mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_str = format!("0x{}", hex::encode(bytes));
        serializer.serialize_str(&hex_str)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse<const N: usize>(s: &str) -> Result<[u8; N], String> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| format!("expected {} bytes, got {}", N, len))
    }
}
