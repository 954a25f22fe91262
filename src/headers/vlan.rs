//! IEEE 802.1Q VLAN tag.

use crate::header::{FieldDescriptor, FieldKind, HeaderCodec, HeaderSchema, Probe};
use crate::headers::fields;

pub const ID: &str = "vlan";

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "802.1Q Virtual LAN",
    nickname: "VLAN",
    is_protocol: true,
    fields: &[
        FieldDescriptor {
            path: "priority",
            label: "Priority",
            kind: FieldKind::Integer { min: 0, max: 7 },
            decode: |h| fields::decode_bits(h, "priority", 0, 2, 0, 3),
            encode: |h| fields::encode_bits(h, "priority", 0, 2, 0, 3, 0),
        },
        FieldDescriptor {
            path: "dei",
            label: "Drop Eligible Indicator",
            kind: FieldKind::Boolean,
            decode: |h| fields::decode_flag(h, "dei", 0, 3),
            encode: |h| fields::encode_flag(h, "dei", 0, 3),
        },
        FieldDescriptor {
            path: "id",
            label: "VLAN Identifier",
            kind: FieldKind::Integer { min: 0, max: 4095 },
            decode: |h| fields::decode_bits(h, "id", 0, 2, 4, 12),
            encode: |h| fields::encode_bits(h, "id", 0, 2, 4, 12, 0),
        },
        FieldDescriptor {
            path: "etherType",
            label: "EtherType",
            kind: FieldKind::Text,
            decode: |h| fields::decode_type_code(h, "etherType", 2),
            encode: |h| fields::encode_type_code(h, "etherType", 2),
        },
    ],
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Vlan;

impl HeaderCodec for Vlan {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        fields::prev_type_code_is(probe, "etherType", "8100")
    }
}
