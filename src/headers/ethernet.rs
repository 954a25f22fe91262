//! Ethernet II frame header.

use crate::header::{FieldDescriptor, FieldKind, HeaderCodec, HeaderSchema, Probe};
use crate::headers::fields;

pub const ID: &str = "eth";

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "Ethernet II",
    nickname: "ETH",
    is_protocol: true,
    fields: &[
        FieldDescriptor {
            path: "dmac",
            label: "Destination",
            kind: FieldKind::Text,
            decode: |h| fields::decode_mac(h, "dmac", 0),
            encode: |h| fields::encode_mac(h, "dmac", 0),
        },
        FieldDescriptor {
            path: "smac",
            label: "Source",
            kind: FieldKind::Text,
            decode: |h| fields::decode_mac(h, "smac", 6),
            encode: |h| fields::encode_mac(h, "smac", 6),
        },
        FieldDescriptor {
            path: "etherType",
            label: "EtherType",
            kind: FieldKind::Text,
            decode: |h| fields::decode_type_code(h, "etherType", 12),
            encode: |h| fields::encode_type_code(h, "etherType", 12),
        },
    ],
};

#[derive(Debug, Clone, Copy, Default)]
pub struct EthernetII;

impl HeaderCodec for EthernetII {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    /// Outermost header only.
    fn matches(&self, probe: &Probe<'_>) -> bool {
        probe.prev_module().is_none()
    }
}
