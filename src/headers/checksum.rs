//! RFC 1071 internet checksum and the IP pseudo-headers used by UDP and ICMPv6.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Ones' complement sum of big-endian 16-bit words, folded; odd input is zero padded.
pub fn ones_complement_sum(chunks: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;
    let mut pending: Option<u8> = None;
    for chunk in chunks {
        for &b in *chunk {
            match pending.take() {
                Some(hi) => sum = fold(sum + u32::from(u16::from_be_bytes([hi, b]))),
                None => pending = Some(b),
            }
        }
    }
    if let Some(hi) = pending {
        sum = fold(sum + u32::from(u16::from_be_bytes([hi, 0])));
    }
    sum as u16
}

/// End-around carry; keeps the running sum within 16 bits.
fn fold(sum: u32) -> u32 {
    (sum & 0xffff) + (sum >> 16)
}

/// Internet checksum over the concatenation of `chunks`.
pub fn internet_checksum(chunks: &[&[u8]]) -> u16 {
    !ones_complement_sum(chunks)
}

pub fn ipv4_pseudo_header(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, length: u16) -> Vec<u8> {
    let mut ph = Vec::with_capacity(12);
    ph.extend_from_slice(&src.octets());
    ph.extend_from_slice(&dst.octets());
    ph.push(0);
    ph.push(protocol);
    ph.extend_from_slice(&length.to_be_bytes());
    ph
}

pub fn ipv6_pseudo_header(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, length: u32) -> Vec<u8> {
    let mut ph = Vec::with_capacity(40);
    ph.extend_from_slice(&src.octets());
    ph.extend_from_slice(&dst.octets());
    ph.extend_from_slice(&length.to_be_bytes());
    ph.extend_from_slice(&[0, 0, 0, next_header]);
    ph
}
