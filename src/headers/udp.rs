//! UDP header (RFC 768).
//!
//! A missing `length` or `checksum` is computed after the whole packet has been
//! encoded: the length covers this header and everything after it, the checksum adds the
//! IPv4 or IPv6 pseudo-header of the enclosing IP header.

use crate::codec::CodecError;
use crate::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, ModuleState, Probe};
use crate::headers::{checksum, fields, ipv4, ipv6};
use crate::value::Value;
use std::net::{Ipv4Addr, Ipv6Addr};

pub const ID: &str = "udp";

pub const PROTOCOL_NUMBER: u8 = 17;

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "User Datagram Protocol",
    nickname: "UDP",
    is_protocol: true,
    fields: &[
        FieldDescriptor {
            path: "srcport",
            label: "Source Port",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "srcport", 0),
            encode: |h| fields::encode_u16(h, "srcport", 0, 0),
        },
        FieldDescriptor {
            path: "dstport",
            label: "Destination Port",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "dstport", 2),
            encode: |h| fields::encode_u16(h, "dstport", 2, 0),
        },
        FieldDescriptor {
            path: "length",
            label: "Length",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "length", 4),
            encode: encode_length,
        },
        FieldDescriptor {
            path: "checksum",
            label: "Checksum",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "checksum", 6),
            encode: encode_checksum,
        },
    ],
};

fn encode_length(h: &mut Header<'_>) -> Result<(), CodecError> {
    if !h.is_undefined("length") {
        return fields::encode_u16(h, "length", 4, 0);
    }
    h.write_u16(4, 0);
    h.add_post_packet_handler(1, |h| {
        let total = h.length_with_following();
        let len = u16::try_from(total)
            .map_err(|_| CodecError::InvalidValue(format!("UDP length {} exceeds 65535", total)))?;
        h.set("length", len);
        h.write_u16(4, len);
        Ok(())
    });
    Ok(())
}

fn address<T: std::str::FromStr>(ip: &ModuleState, path: &str) -> Result<T, CodecError> {
    ip.field(path)
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| CodecError::InvalidValue(format!("{} {} is not a valid address", ip.id, path)))
}

/// Pseudo-header of the enclosing IP header; `None` when UDP is not carried over IP.
fn pseudo_header(ip: Option<&ModuleState>, udp_len: usize) -> Result<Option<Vec<u8>>, CodecError> {
    let Some(ip) = ip else {
        return Ok(None);
    };
    match ip.id {
        ipv4::ID => {
            let src: Ipv4Addr = address(ip, "sip")?;
            let dst: Ipv4Addr = address(ip, "dip")?;
            let len = u16::try_from(udp_len).map_err(|_| {
                CodecError::InvalidValue(format!("UDP length {} exceeds the IPv4 pseudo-header", udp_len))
            })?;
            Ok(Some(checksum::ipv4_pseudo_header(src, dst, PROTOCOL_NUMBER, len)))
        }
        ipv6::ID => {
            let src: Ipv6Addr = address(ip, "sip")?;
            let dst: Ipv6Addr = address(ip, "dip")?;
            let len = u32::try_from(udp_len).map_err(|_| {
                CodecError::InvalidValue(format!("UDP length {} exceeds the IPv6 pseudo-header", udp_len))
            })?;
            Ok(Some(checksum::ipv6_pseudo_header(src, dst, PROTOCOL_NUMBER, len)))
        }
        _ => Ok(None),
    }
}

fn encode_checksum(h: &mut Header<'_>) -> Result<(), CodecError> {
    if !h.is_undefined("checksum") {
        return fields::encode_u16(h, "checksum", 6, 0);
    }
    h.write_u16(6, 0);
    h.add_post_packet_handler(2, |h| {
        let len = h.length_with_following();
        let Some(pseudo) = pseudo_header(h.prev_module(), len)? else {
            h.set("checksum", 0u16);
            return Ok(());
        };
        let sum = match checksum::internet_checksum(&[pseudo.as_slice(), h.read_bytes(0, len)?]) {
            // Zero means "no checksum" on the wire.
            0 => 0xffff,
            s => s,
        };
        h.set("checksum", sum);
        h.write_u16(6, sum);
        Ok(())
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Udp;

impl HeaderCodec for Udp {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        let Some(prev) = probe.prev_module() else {
            return false;
        };
        let next_protocol = match prev.id {
            ipv4::ID => prev.field("protocol"),
            ipv6::ID => prev.field("nxt"),
            _ => None,
        };
        next_protocol.and_then(|v| v.as_u64()) == Some(PROTOCOL_NUMBER as u64)
    }
}
