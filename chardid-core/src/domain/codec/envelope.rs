//! Ballot envelope stripping.
//!
//! The ordering service stores either of two additive wrappers around an
//! operation payload:
//!
//!   slot:  `0x00 0x00 ‖ compact_size(len) ‖ payload`
//!   vote:  `0x00 ‖ varint(ballot) ‖ compact_size(len) ‖ payload`
//!
//! The varint is LEB128 (least-significant group first, high bit =
//! continuation); compact_size is the Bitcoin form. The two encodings are
//! never interchangeable. A leading byte other than 0x00 means the bytes
//! are a bare payload. Anything that does not parse as one of these forms
//! is skipped silently by the processor.
//!
//! A vote wrapper for ballot 0 starts `0x00 0x00` and is indistinguishable
//! from the slot marker; the slot interpretation wins.

const MAX_VARINT_LEN: usize = 10;

/// Strips a recognized envelope, returning the inner payload. `None` means
/// "not a recognizable payload, skip this ballot".
pub fn strip_envelope(data: &[u8]) -> Option<&[u8]> {
    if data.is_empty() {
        return None;
    }
    if data[0] != 0x00 {
        return Some(data);
    }
    if data.len() >= 2 && data[1] == 0x00 {
        return strip_framed(&data[2..]);
    }
    let (_, varint_len) = read_varint(&data[1..])?;
    strip_framed(&data[1 + varint_len..])
}

/// `compact_size(len) ‖ payload`, length-exact.
fn strip_framed(data: &[u8]) -> Option<&[u8]> {
    let (len, size_len) = read_compact_size(data)?;
    let payload = &data[size_len..];
    if payload.len() as u64 != len {
        return None;
    }
    Some(payload)
}

/// LEB128 unsigned varint: 7 bits per group, least significant first,
/// high bit set on every byte but the last.
fn read_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return None;
        }
        value |= u64::from(byte & 0x7F) << (7 * i as u32);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Bitcoin CompactSize: `< 0xfd` inline, `0xfd` + u16le, `0xfe` + u32le,
/// `0xff` + u64le.
fn read_compact_size(data: &[u8]) -> Option<(u64, usize)> {
    let first = *data.first()?;
    match first {
        0x00..=0xFC => Some((u64::from(first), 1)),
        0xFD => {
            let bytes: [u8; 2] = data.get(1..3)?.try_into().ok()?;
            Some((u64::from(u16::from_le_bytes(bytes)), 3))
        }
        0xFE => {
            let bytes: [u8; 4] = data.get(1..5)?.try_into().ok()?;
            Some((u64::from(u32::from_le_bytes(bytes)), 5))
        }
        0xFF => {
            let bytes: [u8; 8] = data.get(1..9)?.try_into().ok()?;
            Some((u64::from_le_bytes(bytes), 9))
        }
    }
}

/// Wraps a payload in the vote envelope. Used by authoring clients when
/// submitting through the referendum path, and by tests.
pub fn wrap_vote(ballot: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + MAX_VARINT_LEN + 9 + payload.len());
    out.push(0x00);
    write_varint(&mut out, ballot);
    write_compact_size(&mut out, payload.len() as u64);
    out.extend_from_slice(payload);
    out
}

/// Wraps a payload in the slot envelope.
pub fn wrap_slot(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 9 + payload.len());
    out.push(0x00);
    out.push(0x00);
    write_compact_size(&mut out, payload.len() as u64);
    out.extend_from_slice(payload);
    out
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return;
        }
    }
}

fn write_compact_size(out: &mut Vec<u8>, len: u64) {
    match len {
        0..=0xFC => out.push(len as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(len as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&len.to_le_bytes());
        }
    }
}
