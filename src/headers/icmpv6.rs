//! ICMPv6 (RFC 4443). The message body after the checksum is kept as raw bytes.

use crate::codec::CodecError;
use crate::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, Probe};
use crate::headers::{checksum, fields, ipv6};
use crate::value::Value;
use std::net::Ipv6Addr;

pub const ID: &str = "icmpv6";

pub const NEXT_HEADER: u8 = 58;

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "Internet Control Message Protocol v6",
    nickname: "ICMPv6",
    is_protocol: true,
    fields: &[
        FieldDescriptor {
            path: "type",
            label: "Type",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "type", 0),
            encode: |h| fields::encode_u8(h, "type", 0, 0),
        },
        FieldDescriptor {
            path: "code",
            label: "Code",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "code", 1),
            encode: |h| fields::encode_u8(h, "code", 1, 0),
        },
        FieldDescriptor {
            path: "checksum",
            label: "Checksum",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "checksum", 2),
            encode: encode_checksum,
        },
        FieldDescriptor {
            path: "message",
            label: "Message Body",
            kind: FieldKind::Bytes,
            decode: decode_message,
            encode: encode_message,
        },
    ],
};

fn decode_message(h: &mut Header<'_>) -> Result<(), CodecError> {
    let len = h.remaining().saturating_sub(4);
    if len > 0 {
        let body = h.read_bytes(4, len)?.to_vec();
        h.set("message", body);
    }
    Ok(())
}

fn encode_message(h: &mut Header<'_>) -> Result<(), CodecError> {
    if let Some(Value::Bytes(body)) = h.get("message") {
        h.write_bytes(4, &body);
    }
    Ok(())
}

fn ipv6_address(h: &Header<'_>, path: &str) -> Result<Ipv6Addr, CodecError> {
    h.find_prev(ipv6::ID)
        .ok_or_else(|| CodecError::InvalidValue("ICMPv6 checksum needs an enclosing IPv6 header".to_string()))?
        .field(path)
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| CodecError::InvalidValue(format!("ipv6 {} is not a valid address", path)))
}

fn encode_checksum(h: &mut Header<'_>) -> Result<(), CodecError> {
    if !h.is_undefined("checksum") {
        return fields::encode_u16(h, "checksum", 2, 0);
    }
    h.write_u16(2, 0);
    h.add_post_packet_handler(1, |h| {
        let len = h.length_with_following();
        let upper_len = u32::try_from(len).map_err(|_| {
            CodecError::InvalidValue(format!("ICMPv6 length {} exceeds the IPv6 pseudo-header", len))
        })?;
        let pseudo = checksum::ipv6_pseudo_header(
            ipv6_address(h, "sip")?,
            ipv6_address(h, "dip")?,
            NEXT_HEADER,
            upper_len,
        );
        let sum = checksum::internet_checksum(&[pseudo.as_slice(), h.read_bytes(0, len)?]);
        h.set("checksum", sum);
        h.write_u16(2, sum);
        Ok(())
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Icmpv6;

impl HeaderCodec for Icmpv6 {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        matches!(probe.prev_module(), Some(prev) if prev.id == ipv6::ID)
            && probe.prev_field("nxt").and_then(|v| v.as_u64()) == Some(NEXT_HEADER as u64)
    }
}
