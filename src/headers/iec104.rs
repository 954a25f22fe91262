//! IEC 60870-5-104 supervisory (S) and unnumbered (U) APDUs.
//!
//! Both frames are six bytes: start byte 0x68, APDU length 4, four control octets. The
//! two low bits of the first control octet select the format (`01` S, `11` U).

use crate::codec::CodecError;
use crate::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, Probe};
use crate::headers::fields;

pub const S_FRAME_ID: &str = "IEC104_S_Frame";
pub const U_FRAME_ID: &str = "IEC104_U_Frame";

pub const START_BYTE: u8 = 0x68;
const CONTROL_APDU_LEN: u8 = 4;

const S_FORMAT: &str = "S-Format";

/// U-format control words and their names.
const U_FUNCTIONS: [(u32, &str); 6] = [
    (0x4300_0000, "U-Format Type:Test Frame Activation"),
    (0x8300_0000, "U-Format Type:Test Frame Confirmation"),
    (0x1300_0000, "U-Format Type:Stop Data Transfer Activation"),
    (0x2300_0000, "U-Format Type:Stop Data Transfer Confirmation"),
    (0x0700_0000, "U-Format Type:Start Data Transfer Activation"),
    (0x0b00_0000, "U-Format Type:Start Data Transfer Confirmation"),
];

const START_BYTE_FIELD: FieldDescriptor = FieldDescriptor {
    path: "startByte",
    label: "Start Byte",
    kind: FieldKind::U8,
    decode: |h| fields::decode_u8(h, "startByte", 0),
    encode: |h| fields::encode_u8(h, "startByte", 0, START_BYTE),
};

const APDU_LENGTH_FIELD: FieldDescriptor = FieldDescriptor {
    path: "apduLength",
    label: "APDU Length",
    kind: FieldKind::U8,
    decode: |h| fields::decode_u8(h, "apduLength", 1),
    encode: |h| fields::encode_u8(h, "apduLength", 1, CONTROL_APDU_LEN),
};

const CONTROL_FIELD: FieldDescriptor = FieldDescriptor {
    path: "controlField",
    label: "Control Field",
    kind: FieldKind::Text,
    decode: decode_control_field,
    encode: encode_control_field,
};

static S_SCHEMA: HeaderSchema = HeaderSchema {
    id: S_FRAME_ID,
    name: "IEC 60870-5-104",
    nickname: "iec60870_104",
    is_protocol: true,
    fields: &[
        START_BYTE_FIELD,
        APDU_LENGTH_FIELD,
        CONTROL_FIELD,
        FieldDescriptor {
            path: "apciType",
            label: "APCI Type",
            kind: FieldKind::Text,
            decode: decode_s_type,
            encode: encode_s_type,
        },
    ],
};

static U_SCHEMA: HeaderSchema = HeaderSchema {
    id: U_FRAME_ID,
    name: "IEC 60870-5-104",
    nickname: "iec60870_104",
    is_protocol: true,
    fields: &[
        START_BYTE_FIELD,
        APDU_LENGTH_FIELD,
        CONTROL_FIELD,
        FieldDescriptor {
            path: "apciType",
            label: "APCI Type",
            kind: FieldKind::Text,
            decode: decode_u_type,
            encode: encode_u_type,
        },
    ],
};

fn decode_control_field(h: &mut Header<'_>) -> Result<(), CodecError> {
    let hex = fields::to_hex(h.read_bytes(2, 4)?);
    h.set("controlField", hex);
    Ok(())
}

fn encode_control_field(h: &mut Header<'_>) -> Result<(), CodecError> {
    let s = h.str_or("controlField", "00000000");
    match fields::from_hex(&s) {
        Some(b) if b.len() == 4 => h.write_bytes(2, &b),
        _ => {
            h.record_error("controlField", "Invalid hex value");
            h.write_bytes(2, &[0; 4]);
        }
    }
    Ok(())
}

fn decode_s_type(h: &mut Header<'_>) -> Result<(), CodecError> {
    let format = h.read_bits(2, 1, 6, 2)?;
    if format == 0b01 {
        h.set("apciType", S_FORMAT);
    } else {
        h.record_error("apciType", "Illegal apciType");
        h.set("apciType", format!("{:02b}", format));
    }
    Ok(())
}

fn encode_s_type(h: &mut Header<'_>) -> Result<(), CodecError> {
    let name = h.str_or("apciType", S_FORMAT);
    if name != S_FORMAT {
        h.record_error("apciType", "Illegal apciType");
    }
    h.write_bits(2, 1, 6, 2, 0b01)
}

fn decode_u_type(h: &mut Header<'_>) -> Result<(), CodecError> {
    let word = h.read_u32(2)?;
    match u_function_name(word) {
        Some(name) => h.set("apciType", name),
        None => {
            h.record_error("apciType", "Illegal apciType");
            h.set("apciType", format!("{:08x}", word));
        }
    }
    Ok(())
}

fn encode_u_type(h: &mut Header<'_>) -> Result<(), CodecError> {
    let name = h.str_or("apciType", U_FUNCTIONS[0].1);
    let word = match U_FUNCTIONS.iter().find(|(_, n)| *n == name) {
        Some((w, _)) => *w,
        None => {
            h.record_error("apciType", "Illegal apciType");
            match fields::from_hex(&name) {
                Some(b) if b.len() == 4 => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
                _ => U_FUNCTIONS[0].0,
            }
        }
    };
    h.write_u32(2, word);
    Ok(())
}

fn frame_format(probe: &Probe<'_>) -> Option<u64> {
    if probe.read_u8(0).ok()? != START_BYTE || probe.read_u8(1).ok()? != CONTROL_APDU_LEN {
        return None;
    }
    probe.read_bits(2, 1, 6, 2).ok()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Iec104SFrame;

impl HeaderCodec for Iec104SFrame {
    fn schema(&self) -> &'static HeaderSchema {
        &S_SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        frame_format(probe) == Some(0b01)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Iec104UFrame;

impl HeaderCodec for Iec104UFrame {
    fn schema(&self) -> &'static HeaderSchema {
        &U_SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        frame_format(probe) == Some(0b11)
    }
}

/// Name of a U-format control word, if it is one of the six defined functions.
pub fn u_function_name(word: u32) -> Option<&'static str> {
    U_FUNCTIONS.iter().find(|(w, _)| *w == word).map(|(_, n)| *n)
}

