//! Binary encode / decode

use bytes::{Buf, BufMut};
use contracts::{offsets, Packet, ShowState, ENERGY_MAX, ENVELOPE_MAX_MS, PACKET_LEN};

/// floor(clamp(value, 0, 255)); NaN maps to 0
fn clamp_byte(value: f64) -> u8 {
    // `as` saturates and truncates; after the clamp truncation equals floor
    value.clamp(0.0, 255.0) as u8
}

fn clamp_int_byte(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Rescale `value` in `[0, max]` onto a byte
fn rescale(value: f64, max: f64) -> u8 {
    clamp_byte(255.0 * (value / max))
}

fn unscale(byte: u8, max: f64) -> f64 {
    f64::from(byte) / 255.0 * max
}

/// Encode a show state into a packet. Never fails.
pub fn encode(state: &ShowState) -> Packet {
    let mut bytes = [0u8; PACKET_LEN];
    let mut buf = &mut bytes[..];

    // wire format is a wrapping i32
    buf.put_i32(state.start_time as i32);
    buf.put_u8(clamp_byte(state.bpm));
    buf.put_u8(clamp_int_byte(state.gradient));
    buf.put_u8(rescale(state.energy, ENERGY_MAX));
    buf.put_u8(rescale(state.attack, ENVELOPE_MAX_MS));
    buf.put_u8(rescale(state.release, ENVELOPE_MAX_MS));
    buf.put_u8(clamp_int_byte(state.program));
    // reserved tail stays zero
    debug_assert_eq!(buf.len(), PACKET_LEN - offsets::RESERVED);

    Packet::from_bytes(bytes)
}

/// Decode a packet back into a show state, to byte precision.
pub fn decode(packet: &Packet) -> ShowState {
    let mut buf = &packet.as_bytes()[..];

    let start_time = i64::from(buf.get_i32());
    let bpm = f64::from(buf.get_u8());
    let gradient = i32::from(buf.get_u8());
    let energy = unscale(buf.get_u8(), ENERGY_MAX);
    let attack = unscale(buf.get_u8(), ENVELOPE_MAX_MS);
    let release = unscale(buf.get_u8(), ENVELOPE_MAX_MS);
    let program = i32::from(buf.get_u8());

    ShowState {
        start_time,
        bpm,
        gradient,
        energy,
        attack,
        release,
        program,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ShowState {
        ShowState {
            start_time: 1000,
            bpm: 120.0,
            gradient: 0,
            energy: 500.0,
            attack: 100.0,
            release: 600.0,
            program: 1,
        }
    }

    #[test]
    fn test_encode_layout() {
        let packet = encode(&sample());
        let bytes = packet.as_bytes();

        assert_eq!(
            i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            1000
        );
        assert_eq!(bytes[offsets::BPM], 120);
        assert_eq!(bytes[offsets::GRADIENT], 0);
        // floor(255 * 0.5) = floor(127.5)
        assert_eq!(bytes[offsets::ENERGY], 127);
        // floor(255 * 100 / 600) = floor(42.5)
        assert_eq!(bytes[offsets::ATTACK], 42);
        assert_eq!(bytes[offsets::RELEASE], 255);
        assert_eq!(bytes[offsets::PROGRAM], 1);
        assert!(bytes[offsets::RESERVED..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_clamps_instead_of_wrapping() {
        let state = ShowState {
            start_time: 0,
            bpm: 300.7,
            gradient: -4,
            energy: 5000.0,
            attack: -10.0,
            release: 601.0,
            program: 1024,
        };
        let bytes = *encode(&state).as_bytes();

        assert_eq!(bytes[offsets::BPM], 255);
        assert_eq!(bytes[offsets::GRADIENT], 0);
        assert_eq!(bytes[offsets::ENERGY], 255);
        assert_eq!(bytes[offsets::ATTACK], 0);
        assert_eq!(bytes[offsets::RELEASE], 255);
        assert_eq!(bytes[offsets::PROGRAM], 255);
    }

    #[test]
    fn test_encode_floors_fractional_bpm() {
        let state = ShowState {
            bpm: 127.9,
            ..Default::default()
        };
        assert_eq!(encode(&state).as_bytes()[offsets::BPM], 127);
    }

    #[test]
    fn test_encode_nan_is_zero() {
        let state = ShowState {
            bpm: f64::NAN,
            energy: f64::NAN,
            ..Default::default()
        };
        let bytes = *encode(&state).as_bytes();
        assert_eq!(bytes[offsets::BPM], 0);
        assert_eq!(bytes[offsets::ENERGY], 0);
    }

    #[test]
    fn test_start_time_wraps_as_i32() {
        let state = ShowState {
            start_time: i64::from(i32::MAX) + 1,
            ..Default::default()
        };
        let decoded = decode(&encode(&state));
        assert_eq!(decoded.start_time, i64::from(i32::MIN));

        let state = ShowState {
            start_time: -250,
            ..Default::default()
        };
        assert_eq!(decode(&encode(&state)).start_time, -250);
    }

    #[test]
    fn test_decode_rescales() {
        let decoded = decode(&encode(&sample()));

        assert_eq!(decoded.start_time, 1000);
        assert_eq!(decoded.bpm, 120.0);
        assert_eq!(decoded.program, 1);
        assert!((decoded.energy - 127.0 / 255.0 * 1000.0).abs() < 1e-9);
        assert_eq!(decoded.release, 600.0);
    }
}
