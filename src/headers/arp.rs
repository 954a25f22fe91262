//! ARP over Ethernet/IPv4 (RFC 826).

use crate::codec::CodecError;
use crate::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, Probe};
use crate::headers::fields;

pub const ID: &str = "arp";

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "Address Resolution Protocol",
    nickname: "ARP",
    is_protocol: true,
    fields: &[
        FieldDescriptor::object("hardware", "Hardware"),
        FieldDescriptor {
            path: "hardware.type",
            label: "Type",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "hardware.type", 0),
            encode: |h| fields::encode_u16(h, "hardware.type", 0, 1),
        },
        FieldDescriptor {
            path: "hardware.size",
            label: "Size",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "hardware.size", 4),
            encode: |h| fields::encode_u8(h, "hardware.size", 4, 6),
        },
        FieldDescriptor::object("protocol", "Protocol"),
        FieldDescriptor {
            path: "protocol.type",
            label: "Type",
            kind: FieldKind::Text,
            decode: |h| fields::decode_type_code(h, "protocol.type", 2),
            encode: |h| fields::encode_type_code(h, "protocol.type", 2),
        },
        FieldDescriptor {
            path: "protocol.size",
            label: "Size",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "protocol.size", 5),
            encode: |h| fields::encode_u8(h, "protocol.size", 5, 4),
        },
        FieldDescriptor {
            path: "opcode",
            label: "Opcode",
            kind: FieldKind::U16,
            decode: decode_opcode,
            encode: encode_opcode,
        },
        FieldDescriptor::object("sender", "Sender"),
        FieldDescriptor {
            path: "sender.mac",
            label: "MAC address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_mac(h, "sender.mac", 8),
            encode: |h| fields::encode_mac(h, "sender.mac", 8),
        },
        FieldDescriptor {
            path: "sender.ipv4",
            label: "IP address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_ipv4(h, "sender.ipv4", 14),
            encode: |h| fields::encode_ipv4(h, "sender.ipv4", 14),
        },
        FieldDescriptor::object("target", "Target"),
        FieldDescriptor {
            path: "target.mac",
            label: "MAC address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_mac(h, "target.mac", 18),
            encode: |h| fields::encode_mac(h, "target.mac", 18),
        },
        FieldDescriptor {
            path: "target.ipv4",
            label: "IP address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_ipv4(h, "target.ipv4", 24),
            encode: |h| fields::encode_ipv4(h, "target.ipv4", 24),
        },
    ],
};

fn check_opcode(h: &mut Header<'_>, opcode: u16) {
    if !(1..=4).contains(&opcode) {
        h.record_error("opcode", "Opcode should be 1, 2, 3 or 4");
    }
}

fn decode_opcode(h: &mut Header<'_>) -> Result<(), CodecError> {
    let opcode = h.read_u16(6)?;
    h.set("opcode", opcode);
    check_opcode(h, opcode);
    Ok(())
}

fn encode_opcode(h: &mut Header<'_>) -> Result<(), CodecError> {
    let opcode = h.u64_or("opcode", 1) as u16;
    check_opcode(h, opcode);
    h.write_u16(6, opcode);
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Arp;

impl HeaderCodec for Arp {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        fields::prev_type_code_is(probe, "etherType", "0806")
    }
}
