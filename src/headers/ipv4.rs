//! IPv4 header (RFC 791).
//!
//! `hdrLen` is in bytes. On encode, a missing `hdrLen` is derived from the options, and
//! missing `length` and `checksum` are filled in by post handlers once the payload is
//! known: length first, then the header checksum over the finished header.

use crate::codec::CodecError;
use crate::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, Probe};
use crate::headers::{checksum, fields};

pub const ID: &str = "ipv4";

const MIN_HEADER_LEN: usize = 20;

static SCHEMA: HeaderSchema = HeaderSchema {
    id: ID,
    name: "Internet Protocol Version 4",
    nickname: "IPv4",
    is_protocol: true,
    fields: &[
        FieldDescriptor {
            path: "version",
            label: "Version",
            kind: FieldKind::Integer { min: 0, max: 15 },
            decode: |h| fields::decode_bits(h, "version", 0, 1, 0, 4),
            encode: |h| fields::encode_bits(h, "version", 0, 1, 0, 4, 4),
        },
        FieldDescriptor {
            path: "hdrLen",
            label: "Header Length",
            kind: FieldKind::Integer { min: 20, max: 60 },
            decode: decode_hdr_len,
            encode: encode_hdr_len,
        },
        FieldDescriptor::object("dsfield", "Differentiated Services Field"),
        FieldDescriptor {
            path: "dsfield.dscp",
            label: "Differentiated Services Codepoint",
            kind: FieldKind::Integer { min: 0, max: 63 },
            decode: |h| fields::decode_bits(h, "dsfield.dscp", 1, 1, 0, 6),
            encode: |h| fields::encode_bits(h, "dsfield.dscp", 1, 1, 0, 6, 0),
        },
        FieldDescriptor {
            path: "dsfield.ecn",
            label: "Explicit Congestion Notification",
            kind: FieldKind::Integer { min: 0, max: 3 },
            decode: |h| fields::decode_bits(h, "dsfield.ecn", 1, 1, 6, 2),
            encode: |h| fields::encode_bits(h, "dsfield.ecn", 1, 1, 6, 2, 0),
        },
        FieldDescriptor {
            path: "length",
            label: "Total Length",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "length", 2),
            encode: encode_length,
        },
        FieldDescriptor {
            path: "id",
            label: "Identification",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "id", 4),
            encode: |h| fields::encode_u16(h, "id", 4, 0),
        },
        FieldDescriptor::object("flags", "Flags"),
        FieldDescriptor {
            path: "flags.rb",
            label: "Reserved bit",
            kind: FieldKind::Boolean,
            decode: |h| fields::decode_flag(h, "flags.rb", 6, 0),
            encode: |h| fields::encode_flag(h, "flags.rb", 6, 0),
        },
        FieldDescriptor {
            path: "flags.df",
            label: "Don't fragment",
            kind: FieldKind::Boolean,
            decode: |h| fields::decode_flag(h, "flags.df", 6, 1),
            encode: |h| fields::encode_flag(h, "flags.df", 6, 1),
        },
        FieldDescriptor {
            path: "flags.mf",
            label: "More fragments",
            kind: FieldKind::Boolean,
            decode: |h| fields::decode_flag(h, "flags.mf", 6, 2),
            encode: |h| fields::encode_flag(h, "flags.mf", 6, 2),
        },
        FieldDescriptor {
            path: "fragOffset",
            label: "Fragment Offset",
            kind: FieldKind::Integer { min: 0, max: 8191 },
            decode: |h| fields::decode_bits(h, "fragOffset", 6, 2, 3, 13),
            encode: |h| fields::encode_bits(h, "fragOffset", 6, 2, 3, 13, 0),
        },
        FieldDescriptor {
            path: "ttl",
            label: "Time to Live",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "ttl", 8),
            encode: |h| fields::encode_u8(h, "ttl", 8, 64),
        },
        FieldDescriptor {
            path: "protocol",
            label: "Protocol",
            kind: FieldKind::U8,
            decode: |h| fields::decode_u8(h, "protocol", 9),
            encode: |h| fields::encode_u8(h, "protocol", 9, 0),
        },
        FieldDescriptor {
            path: "checksum",
            label: "Header Checksum",
            kind: FieldKind::U16,
            decode: |h| fields::decode_u16(h, "checksum", 10),
            encode: encode_checksum,
        },
        FieldDescriptor {
            path: "sip",
            label: "Source Address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_ipv4(h, "sip", 12),
            encode: |h| fields::encode_ipv4(h, "sip", 12),
        },
        FieldDescriptor {
            path: "dip",
            label: "Destination Address",
            kind: FieldKind::Text,
            decode: |h| fields::decode_ipv4(h, "dip", 16),
            encode: |h| fields::encode_ipv4(h, "dip", 16),
        },
        FieldDescriptor {
            path: "options",
            label: "Options",
            kind: FieldKind::Bytes,
            decode: decode_options,
            encode: encode_options,
        },
    ],
};

fn header_len(h: &Header<'_>) -> usize {
    h.get("hdrLen")
        .and_then(|v| v.as_u64())
        .map_or(MIN_HEADER_LEN, |n| n as usize)
}

fn decode_hdr_len(h: &mut Header<'_>) -> Result<(), CodecError> {
    let len = h.read_bits(0, 1, 4, 4)? as usize * 4;
    h.set("hdrLen", len as u8);
    if len < MIN_HEADER_LEN {
        h.record_error("hdrLen", format!("Minimum value is {}", MIN_HEADER_LEN));
    }
    Ok(())
}

fn padded_options(h: &Header<'_>) -> Vec<u8> {
    let mut options = h.get("options").and_then(|v| v.as_bytes().map(<[u8]>::to_vec)).unwrap_or_default();
    while options.len() % 4 != 0 {
        options.push(0);
    }
    options
}

fn encode_hdr_len(h: &mut Header<'_>) -> Result<(), CodecError> {
    let len = if h.is_undefined("hdrLen") {
        let len = MIN_HEADER_LEN + padded_options(h).len();
        h.set("hdrLen", len as u8);
        len
    } else {
        header_len(h)
    };
    if len % 4 != 0 {
        h.record_error("hdrLen", "Header length must be a multiple of 4");
    }
    h.write_bits(0, 1, 4, 4, (len / 4) as u64)
}

fn decode_options(h: &mut Header<'_>) -> Result<(), CodecError> {
    let len = header_len(h);
    if len > MIN_HEADER_LEN {
        let options = h.read_bytes(MIN_HEADER_LEN, len - MIN_HEADER_LEN)?.to_vec();
        h.set("options", options);
    }
    Ok(())
}

fn encode_options(h: &mut Header<'_>) -> Result<(), CodecError> {
    let len = header_len(h);
    if !h.is_undefined("options") {
        let mut options = padded_options(h);
        let room = len.saturating_sub(MIN_HEADER_LEN);
        if options.len() > room {
            h.record_error("options", "Options exceed header length");
            options.truncate(room);
            h.set("options", options.clone());
        }
        h.write_bytes(MIN_HEADER_LEN, &options);
    }
    if len > h.length() {
        // Declared header length beyond the options: zero fill.
        h.write_bytes(len - 1, &[0]);
    }
    Ok(())
}

fn encode_length(h: &mut Header<'_>) -> Result<(), CodecError> {
    if !h.is_undefined("length") {
        return fields::encode_u16(h, "length", 2, 0);
    }
    h.write_u16(2, 0);
    h.add_post_packet_handler(1, |h| {
        let total = h.length_with_following();
        let total = u16::try_from(total)
            .map_err(|_| CodecError::InvalidValue(format!("IPv4 total length {} exceeds 65535", total)))?;
        h.set("length", total);
        h.write_u16(2, total);
        Ok(())
    });
    Ok(())
}

fn encode_checksum(h: &mut Header<'_>) -> Result<(), CodecError> {
    if !h.is_undefined("checksum") {
        return fields::encode_u16(h, "checksum", 10, 0);
    }
    h.write_u16(10, 0);
    h.add_post_packet_handler(2, |h| {
        let len = h.length();
        let sum = checksum::internet_checksum(&[h.read_bytes(0, len)?]);
        h.set("checksum", sum);
        h.write_u16(10, sum);
        Ok(())
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv4;

impl HeaderCodec for Ipv4 {
    fn schema(&self) -> &'static HeaderSchema {
        &SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        fields::prev_type_code_is(probe, "etherType", "0800")
    }
}
