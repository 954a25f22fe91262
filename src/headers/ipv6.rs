//! IPv6 fixed header (RFC 8200).

use crate::codec::CodecError;
use crate::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, Probe};
use crate::headers::fields;

pub const ID: &str = "ipv6";

pub const HEADER_LEN: usize = 40;

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "Internet Protocol Version 6",
    nickname: "IPv6",
    is_protocol: true,
    fields: &[
        FieldDescriptor {
            path: "version",
            label: "Version",
            kind: FieldKind::Integer { min: 0, max: 15 },
            decode: |h| fields::decode_bits(h, "version", 0, 1, 0, 4),
            encode: |h| fields::encode_bits(h, "version", 0, 1, 0, 4, 6),
        },
        FieldDescriptor::object("tclass", "Traffic Class"),
        FieldDescriptor {
            path: "tclass.dscp",
            label: "Differentiated Services Codepoint",
            kind: FieldKind::Integer { min: 0, max: 63 },
            decode: |h| fields::decode_bits(h, "tclass.dscp", 0, 4, 4, 6),
            encode: |h| fields::encode_bits(h, "tclass.dscp", 0, 4, 4, 6, 0),
        },
        FieldDescriptor {
            path: "tclass.ecn",
            label: "Explicit Congestion Notification",
            kind: FieldKind::Integer { min: 0, max: 3 },
            decode: |h| fields::decode_bits(h, "tclass.ecn", 0, 4, 10, 2),
            encode: |h| fields::encode_bits(h, "tclass.ecn", 0, 4, 10, 2, 0),
        },
        FieldDescriptor {
            path: "flow",
            label: "Flow Label",
            kind: FieldKind::Integer { min: 0, max: 0xfffff },
            decode: |h| fields::decode_bits(h, "flow", 1, 3, 4, 20),
            encode: |h| fields::encode_bits(h, "flow", 1, 3, 4, 20, 0),
        },
        FieldDescriptor {
            path: "plen",
            label: "Payload Length",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "plen", 4),
            encode: encode_payload_length,
        },
        FieldDescriptor {
            path: "nxt",
            label: "Next Header",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "nxt", 6),
            encode: |h| fields::encode_u8(h, "nxt", 6, 0),
        },
        FieldDescriptor {
            path: "hllm",
            label: "Hop Limit",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "hllm", 7),
            encode: |h| fields::encode_u8(h, "hllm", 7, 64),
        },
        FieldDescriptor {
            path: "sip",
            label: "Source Address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_ipv6(h, "sip", 8),
            encode: |h| fields::encode_ipv6(h, "sip", 8),
        },
        FieldDescriptor {
            path: "dip",
            label: "Destination Address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_ipv6(h, "dip", 24),
            encode: |h| fields::encode_ipv6(h, "dip", 24),
        },
    ],
};

fn encode_payload_length(h: &mut Header<'_>) -> Result<(), CodecError> {
    if !h.is_undefined("plen") {
        return fields::encode_u16(h, "plen", 4, 0);
    }
    h.write_u16(4, 0);
    h.add_post_packet_handler(1, |h| {
        let payload = h.length_with_following().saturating_sub(HEADER_LEN);
        // Jumbograms carry zero here.
        let plen = u16::try_from(payload).unwrap_or(0);
        h.set("plen", plen);
        h.write_u16(4, plen);
        Ok(())
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv6;

impl HeaderCodec for Ipv6 {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        fields::prev_type_code_is(probe, "etherType", "86dd")
    }
}
