//! Byte- and bit-range access over the shared packet buffer.
//!
//! Offsets here are absolute; [`Header`](crate::header::Header) adds its own start
//! position before calling in. Bit windows follow the ITU-T/IEC packing convention:
//! the `byte_len` bytes at `offset` form one big-endian bit string and bit 0 is the most
//! significant bit of its first byte.

use crate::codec::CodecError;
use byteorder::{BigEndian, ByteOrder};

/// Widest bit window, in bytes.
pub const MAX_BIT_WINDOW: usize = 8;

pub fn read_bytes(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], CodecError> {
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(&buf[offset..end]),
        _ => Err(CodecError::OutOfBounds {
            offset,
            len,
            buffer_len: buf.len(),
        }),
    }
}

/// Write `bytes` at `offset`, zero-filling any gap past the current end.
pub fn write_bytes(buf: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    let end = offset + bytes.len();
    if buf.len() < end {
        buf.resize(end, 0);
    }
    buf[offset..end].copy_from_slice(bytes);
}

fn check_window(byte_len: usize, bit_offset: usize, bit_len: usize) -> Result<(), CodecError> {
    if byte_len == 0
        || byte_len > MAX_BIT_WINDOW
        || bit_len == 0
        || bit_offset + bit_len > byte_len * 8
    {
        return Err(CodecError::BitRange {
            byte_len,
            bit_offset,
            bit_len,
        });
    }
    Ok(())
}

fn mask(bit_len: usize) -> u64 {
    if bit_len >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_len) - 1
    }
}

/// Unsigned big-endian integer of 1 to 8 bytes.
pub fn bytes_to_u64(bytes: &[u8]) -> u64 {
    match bytes.len() {
        0 => 0,
        1 => bytes[0] as u64,
        2 => BigEndian::read_u16(bytes) as u64,
        4 => BigEndian::read_u32(bytes) as u64,
        8 => BigEndian::read_u64(bytes),
        n if n < 8 => BigEndian::read_uint(bytes, n),
        n => BigEndian::read_u64(&bytes[n - 8..]),
    }
}

/// `value` as `len` big-endian bytes (1 to 8), high bits truncated.
pub fn u64_to_bytes(value: u64, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    match len {
        1 => buf[0] = value as u8,
        2 => BigEndian::write_u16(&mut buf, value as u16),
        4 => BigEndian::write_u32(&mut buf, value as u32),
        8 => BigEndian::write_u64(&mut buf, value),
        _ => {
            let mut b = [0u8; 8];
            BigEndian::write_u64(&mut b, value);
            let n = len.min(8);
            buf[len - n..].copy_from_slice(&b[8 - n..]);
        }
    }
    buf
}

pub fn read_bits(
    buf: &[u8],
    offset: usize,
    byte_len: usize,
    bit_offset: usize,
    bit_len: usize,
) -> Result<u64, CodecError> {
    check_window(byte_len, bit_offset, bit_len)?;
    let window = bytes_to_u64(read_bytes(buf, offset, byte_len)?);
    let shift = byte_len * 8 - bit_offset - bit_len;
    Ok((window >> shift) & mask(bit_len))
}

/// Replace one bit lane of the window; bits outside the lane are kept.
pub fn write_bits(
    buf: &mut Vec<u8>,
    offset: usize,
    byte_len: usize,
    bit_offset: usize,
    bit_len: usize,
    value: u64,
) -> Result<(), CodecError> {
    check_window(byte_len, bit_offset, bit_len)?;
    if buf.len() < offset + byte_len {
        buf.resize(offset + byte_len, 0);
    }
    let window = bytes_to_u64(&buf[offset..offset + byte_len]);
    let shift = byte_len * 8 - bit_offset - bit_len;
    let lane = mask(bit_len) << shift;
    let updated = (window & !lane) | ((value & mask(bit_len)) << shift);
    write_bytes(buf, offset, &u64_to_bytes(updated, byte_len));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_past_end_is_an_error() {
        let buf = [1u8, 2, 3];
        assert_eq!(read_bytes(&buf, 1, 2).unwrap(), &[2, 3]);
        assert!(matches!(
            read_bytes(&buf, 2, 2),
            Err(CodecError::OutOfBounds { offset: 2, len: 2, buffer_len: 3 })
        ));
    }

    #[test]
    fn write_grows_with_zero_padding() {
        let mut buf = vec![0xaa];
        write_bytes(&mut buf, 3, &[0xbb, 0xcc]);
        assert_eq!(buf, vec![0xaa, 0, 0, 0xbb, 0xcc]);
    }

    #[test]
    fn bits_are_counted_from_msb() {
        // 0x60 0x00 = 0110 0000 ...: IPv6 version nibble.
        let buf = [0x60, 0x00];
        assert_eq!(read_bits(&buf, 0, 1, 0, 4).unwrap(), 6);
        assert_eq!(read_bits(&buf, 0, 2, 1, 2).unwrap(), 0b11);
    }

    #[test]
    fn write_bits_keeps_neighbouring_lanes() {
        let mut buf = vec![0b1010_1010];
        write_bits(&mut buf, 0, 1, 7, 1, 1).unwrap();
        assert_eq!(buf[0], 0b1010_1011);
        write_bits(&mut buf, 0, 1, 0, 4, 0).unwrap();
        assert_eq!(buf[0], 0b0000_1011);
    }

    #[test]
    fn window_wider_than_eight_bytes_is_rejected() {
        let buf = [0u8; 16];
        assert!(matches!(read_bits(&buf, 0, 9, 0, 1), Err(CodecError::BitRange { .. })));
        assert!(matches!(read_bits(&buf, 0, 1, 4, 5), Err(CodecError::BitRange { .. })));
    }

    #[test]
    fn odd_width_integers() {
        assert_eq!(bytes_to_u64(&[0x01, 0x02, 0x03]), 0x010203);
        assert_eq!(u64_to_bytes(0x0a0b0c, 3), vec![0x0a, 0x0b, 0x0c]);
    }
}
