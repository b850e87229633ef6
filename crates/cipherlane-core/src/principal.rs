//! Caller identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::handle::hex_bytes;

/// 20-byte principal identity of a caller (sensor, operator, admin)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(#[serde(with = "hex_bytes")] pub [u8; 20]);

impl Principal {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_hex())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Principal {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        hex_bytes::parse(s)
            .map(Principal)
            .map_err(|e| crate::Error::InvalidHex(format!("principal: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_roundtrips_through_hex() {
        let mut bytes = [0u8; 20];
        bytes[19] = 1;
        let principal = Principal::new(bytes);

        assert_eq!(principal.to_hex(), "0x0000000000000000000000000000000000000001");
        assert_eq!(principal.to_hex().parse::<Principal>().unwrap(), principal);
    }

    #[test]
    fn test_principal_accepts_unprefixed_hex() {
        let parsed: Principal = "dededededededededededededededededededede".parse().unwrap();
        assert_eq!(parsed, Principal::new([0xde; 20]));
    }

    #[test]
    fn test_principal_rejects_wrong_length() {
        assert!("0xdead".parse::<Principal>().is_err());
    }
}
