//! Service identifier text form

use contracts::{ContractError, Packet, IDENTIFIER_LEN, PACKET_LEN};

fn is_lower_hex(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'a'..=b'f')
}

/// Number of leading lowercase hex digits
fn hex_prefix_len(text: &str) -> usize {
    text.bytes().take_while(|&b| is_lower_hex(b)).count()
}

/// Render a packet as a 32-character lowercase hex identifier
pub fn to_identifier(packet: &Packet) -> String {
    hex::encode(packet.as_bytes())
}

/// True when `text` is exactly 32 lowercase hex characters
pub fn is_identifier(text: &str) -> bool {
    text.len() == IDENTIFIER_LEN && hex_prefix_len(text) == IDENTIFIER_LEN
}

/// Parse an identifier produced by [`to_identifier`]
///
/// # Errors
/// `InvalidLength` unless `text` is exactly 32 lowercase hex characters.
/// Non-hex input is reported with the length of its decodable prefix.
pub fn from_identifier(text: &str) -> Result<Packet, ContractError> {
    if !is_identifier(text) {
        return Err(ContractError::invalid_length(
            IDENTIFIER_LEN,
            hex_prefix_len(text),
        ));
    }

    let mut bytes = [0u8; PACKET_LEN];
    hex::decode_to_slice(text, &mut bytes)
        .map_err(|_| ContractError::invalid_length(IDENTIFIER_LEN, hex_prefix_len(text)))?;
    Ok(Packet::from_bytes(bytes))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_identifier_matches_pattern(bytes in any::<[u8; 16]>()) {
            let id = to_identifier(&Packet::from_bytes(bytes));
            prop_assert!(is_identifier(&id));
        }

        #[test]
        fn test_non_identifiers_rejected(text in "[0-9a-zA-Z]{0,40}") {
            let valid = text.len() == 32 && text.bytes().all(is_lower_hex);
            prop_assert_eq!(from_identifier(&text).is_ok(), valid);
        }
    }
}
