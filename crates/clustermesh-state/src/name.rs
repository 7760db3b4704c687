//! Node identity.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

const NAME_MASK: u64 = 0xffff_ffff_ffff;

/// 48-bit peer identifier, written like a MAC address (`aa:bb:cc:dd:ee:ff`).
///
/// Used to address peers; never part of the gossiped payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerName(u64);

impl PeerName {
    /// Create from the low 48 bits of `value`.
    pub const fn from_u64(value: u64) -> Self {
        Self(value & NAME_MASK)
    }

    /// Get the raw value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The six octets, most significant first.
    pub fn octets(&self) -> [u8; 6] {
        let b = self.0.to_be_bytes();
        [b[2], b[3], b[4], b[5], b[6], b[7]]
    }
}

impl FromStr for PeerName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut value = 0u64;
        let mut count = 0;
        for part in s.split(':') {
            if count == 6 || part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::InvalidPeerName(s.to_string()));
            }
            let octet =
                u8::from_str_radix(part, 16).map_err(|_| Error::InvalidPeerName(s.to_string()))?;
            value = (value << 8) | u64::from(octet);
            count += 1;
        }
        if count != 6 {
            return Err(Error::InvalidPeerName(s.to_string()));
        }
        Ok(Self(value))
    }
}

impl std::fmt::Display for PeerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let o = self.octets();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}
