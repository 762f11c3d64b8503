//! Packet - the fixed 16-byte wire record
//!
//! Layout (big-endian):
//!
//! | offset | field |
//! |---|---|
//! | 0-3 | start time, i32 |
//! | 4 | bpm |
//! | 5 | gradient |
//! | 6 | energy |
//! | 7 | attack |
//! | 8 | release |
//! | 9 | program |
//! | 10-15 | reserved, zero |

use std::fmt;

use crate::ContractError;

/// Packet length in bytes
pub const PACKET_LEN: usize = 16;

/// Length of the hex service identifier carrying a packet
pub const IDENTIFIER_LEN: usize = PACKET_LEN * 2;

/// Byte offsets inside a packet
pub mod offsets {
    pub const START_TIME: usize = 0;
    pub const BPM: usize = 4;
    pub const GRADIENT: usize = 5;
    pub const ENERGY: usize = 6;
    pub const ATTACK: usize = 7;
    pub const RELEASE: usize = 8;
    pub const PROGRAM: usize = 9;
    pub const RESERVED: usize = 10;
}

/// Encoded show state. Always exactly [`PACKET_LEN`] bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Packet([u8; PACKET_LEN]);

impl Packet {
    /// Wrap raw bytes
    pub const fn from_bytes(bytes: [u8; PACKET_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    /// Consume into the raw bytes
    pub fn into_bytes(self) -> [u8; PACKET_LEN] {
        self.0
    }
}

impl TryFrom<&[u8]> for Packet {
    type Error = ContractError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; PACKET_LEN] = bytes
            .try_into()
            .map_err(|_| ContractError::invalid_length(PACKET_LEN, bytes.len()))?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_rejects_wrong_length() {
        let err = Packet::try_from(&[0u8; 15][..]).unwrap_err();
        assert!(matches!(
            err,
            ContractError::InvalidLength {
                expected: 16,
                actual: 15
            }
        ));

        assert!(Packet::try_from(&[0u8; 17][..]).is_err());
        assert!(Packet::try_from(&[7u8; 16][..]).is_ok());
    }

    #[test]
    fn test_debug_is_hex() {
        let mut bytes = [0u8; PACKET_LEN];
        bytes[0] = 0xab;
        let packet = Packet::from_bytes(bytes);
        assert_eq!(
            format!("{packet:?}"),
            "Packet(ab000000000000000000000000000000)"
        );
    }
}
