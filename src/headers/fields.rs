//! Shared field encoders/decoders for the built-in headers.
//!
//! Each helper reads or writes one field at a fixed offset and keeps the field tree in
//! sync. Encoders fall back to a default and record "Not Found" when the field is
//! missing from the input.

use crate::codec::CodecError;
use crate::header::Header;
use crate::value::Value;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Integer value sized to the bit width.
pub fn narrow(v: u64, bit_len: usize) -> Value {
    match bit_len {
        0..=8 => Value::U8(v as u8),
        9..=16 => Value::U16(v as u16),
        17..=32 => Value::U32(v as u32),
        _ => Value::U64(v),
    }
}

pub fn decode_u8(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let v = h.read_u8(offset)?;
    h.set(path, v);
    Ok(())
}

pub fn decode_u16(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let v = h.read_u16(offset)?;
    h.set(path, v);
    Ok(())
}

pub fn decode_u32(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let v = h.read_u32(offset)?;
    h.set(path, v);
    Ok(())
}

pub fn encode_u8(h: &mut Header<'_>, path: &str, offset: usize, default: u8) -> Result<(), CodecError> {
    let v = h.u64_or(path, default as u64);
    h.write_u8(offset, v as u8);
    Ok(())
}

pub fn encode_u16(h: &mut Header<'_>, path: &str, offset: usize, default: u16) -> Result<(), CodecError> {
    let v = h.u64_or(path, default as u64);
    h.write_u16(offset, v as u16);
    Ok(())
}

pub fn encode_u32(h: &mut Header<'_>, path: &str, offset: usize, default: u32) -> Result<(), CodecError> {
    let v = h.u64_or(path, default as u64);
    h.write_u32(offset, v as u32);
    Ok(())
}

pub fn decode_bits(
    h: &mut Header<'_>,
    path: &str,
    offset: usize,
    byte_len: usize,
    bit_offset: usize,
    bit_len: usize,
) -> Result<(), CodecError> {
    let v = h.read_bits(offset, byte_len, bit_offset, bit_len)?;
    h.set(path, narrow(v, bit_len));
    Ok(())
}

pub fn encode_bits(
    h: &mut Header<'_>,
    path: &str,
    offset: usize,
    byte_len: usize,
    bit_offset: usize,
    bit_len: usize,
    default: u64,
) -> Result<(), CodecError> {
    let v = h.u64_or(path, default);
    h.write_bits(offset, byte_len, bit_offset, bit_len, v)
}

pub fn decode_flag(h: &mut Header<'_>, path: &str, offset: usize, bit_offset: usize) -> Result<(), CodecError> {
    let v = h.read_bits(offset, 1, bit_offset, 1)?;
    h.set(path, v == 1);
    Ok(())
}

pub fn encode_flag(h: &mut Header<'_>, path: &str, offset: usize, bit_offset: usize) -> Result<(), CodecError> {
    let v = h.bool_or(path, false);
    h.write_bits(offset, 1, bit_offset, 1, v as u64)
}

pub fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

pub fn parse_mac(s: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.split(|c| c == ':' || c == '-');
    for byte in mac.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

pub fn decode_mac(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let mac = format_mac(h.read_bytes(offset, 6)?);
    h.set(path, mac);
    Ok(())
}

pub fn encode_mac(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let s = h.str_or(path, "00:00:00:00:00:00");
    let mac = parse_mac(&s).unwrap_or_else(|| {
        h.record_error(path, "Invalid MAC address");
        [0u8; 6]
    });
    h.write_bytes(offset, &mac);
    Ok(())
}

pub fn decode_ipv4(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let b = h.read_bytes(offset, 4)?;
    let addr = Ipv4Addr::new(b[0], b[1], b[2], b[3]);
    h.set(path, addr.to_string());
    Ok(())
}

pub fn encode_ipv4(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let s = h.str_or(path, "0.0.0.0");
    let addr = s.parse::<Ipv4Addr>().unwrap_or_else(|_| {
        h.record_error(path, "Invalid IPv4 address");
        Ipv4Addr::UNSPECIFIED
    });
    h.write_bytes(offset, &addr.octets());
    Ok(())
}

pub fn decode_ipv6(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(h.read_bytes(offset, 16)?);
    h.set(path, Ipv6Addr::from(octets).to_string());
    Ok(())
}

pub fn encode_ipv6(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let s = h.str_or(path, "::");
    let addr = s.parse::<Ipv6Addr>().unwrap_or_else(|_| {
        h.record_error(path, "Invalid IPv6 address");
        Ipv6Addr::UNSPECIFIED
    });
    h.write_bytes(offset, &addr.octets());
    Ok(())
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Two-byte type code stored as four lowercase hex digits ("0800").
pub fn decode_type_code(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let code = to_hex(h.read_bytes(offset, 2)?);
    h.set(path, code);
    Ok(())
}

pub fn encode_type_code(h: &mut Header<'_>, path: &str, offset: usize) -> Result<(), CodecError> {
    let s = h.str_or(path, "0000");
    let code = match from_hex(&s) {
        Some(b) if b.len() == 2 => [b[0], b[1]],
        _ => {
            h.record_error(path, "Invalid hex value");
            [0, 0]
        }
    };
    h.write_bytes(offset, &code);
    Ok(())
}

/// Field of the immediately preceding header compared against a type code.
pub fn prev_type_code_is(probe: &crate::header::Probe<'_>, path: &str, code: &str) -> bool {
    matches!(probe.prev_field(path), Some(Value::Str(ref s)) if s.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_text_form() {
        assert_eq!(format_mac(&[0, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]), "00:1b:21:aa:bb:cc");
        assert_eq!(parse_mac("00-1B-21-aa-bb-cc"), Some([0, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]));
        assert_eq!(parse_mac("00:1b:21"), None);
        assert_eq!(parse_mac("00:1b:21:aa:bb:cc:dd"), None);
    }

    #[test]
    fn hex_text_form() {
        assert_eq!(to_hex(&[0x86, 0xdd]), "86dd");
        assert_eq!(from_hex("86DD"), Some(vec![0x86, 0xdd]));
        assert_eq!(from_hex("868"), None);
        assert_eq!(from_hex("zz"), None);
    }

    #[test]
    fn narrow_picks_the_smallest_width() {
        assert_eq!(narrow(6, 4), Value::U8(6));
        assert_eq!(narrow(4095, 12), Value::U16(4095));
        assert_eq!(narrow(0xfffff, 20), Value::U32(0xfffff));
    }
}
