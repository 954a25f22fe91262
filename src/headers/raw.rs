//! Catch-all payload: whatever no other header claimed.

use crate::codec::CodecError;
use crate::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, Probe};

pub const ID: &str = "raw";

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "Raw Data",
    nickname: "RAW",
    is_protocol: false,
    fields: &[FieldDescriptor {
        path: "data",
        label: "Data",
        kind: FieldKind::Bytes,
        decode: decode_data,
        encode: encode_data,
    }],
};

fn decode_data(h: &mut Header<'_>) -> Result<(), CodecError> {
    let len = h.remaining();
    let data = h.read_bytes(0, len)?.to_vec();
    h.set("data", data);
    Ok(())
}

fn encode_data(h: &mut Header<'_>) -> Result<(), CodecError> {
    let data = h.bytes_or("data", &[]);
    h.write_bytes(0, &data);
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RawData;

impl HeaderCodec for RawData {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    fn matches(&self, _probe: &Probe<'_>) -> bool {
        true
    }
}
