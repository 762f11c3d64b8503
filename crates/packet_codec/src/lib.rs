//! # Packet Codec
//!
//! Show state ↔ 16-byte packet ↔ 32-character service identifier.
//!
//! - [`encode`] is total: every field is clamped, never wrapped
//!   (except the start time, which is a wrapping i32 by design of the wire format)
//! - [`decode`] rescales bytes back for inspection; the live system never
//!   decodes its own packets
//! - [`to_identifier`] / [`from_identifier`] convert to and from the lowercase
//!   hex text carried in advertisements
//!
//! ## Example
//!
//! ```
//! use contracts::ShowState;
//!
//! let state = ShowState { start_time: 1000, bpm: 120.0, ..Default::default() };
//! let packet = packet_codec::encode(&state);
//! let id = packet_codec::to_identifier(&packet);
//! assert_eq!(id.len(), 32);
//! assert_eq!(packet_codec::from_identifier(&id).unwrap(), packet);
//! ```

mod codec;
mod identifier;

pub use codec::{decode, encode};
pub use contracts::{Packet, ShowState, IDENTIFIER_LEN, PACKET_LEN};
pub use identifier::{from_identifier, is_identifier, to_identifier};
