//! Engine behaviour: matching order, catch-all, termination, defined-field omission,
//! decode/encode round-trip.

use layercodec::codec::CodecError;
use layercodec::header::{FieldDescriptor, FieldKind, HeaderCodec, HeaderSchema, Probe};
use layercodec::headers::{fields, EthernetII, RawData};
use layercodec::value::object;
use layercodec::{Codec, CodecConfig, EncodeInput, HeaderRegistry, RegistryBuilder, Value};

/// One-byte header claiming bytes equal to 0xAA.
struct Marker;

const MARKER_FIELDS: &[FieldDescriptor] = &[FieldDescriptor {
    path: "tag",
    label: "Tag",
    kind: FieldKind::U8,
    decode: |h| fields::decode_u8(h, "tag", 0),
    encode: |h| fields::encode_u8(h, "tag", 0, 0xaa),
}];

static MARKER_SCHEMA: HeaderSchema = HeaderSchema {
    id: "marker",
    name: "Marker",
    nickname: "MRK",
    is_protocol: true,
    fields: MARKER_FIELDS,
};

impl HeaderCodec for Marker {
    fn schema(&self) -> &'static HeaderSchema {
        &MARKER_SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        probe.read_u8(0).map_or(false, |b| b == 0xaa)
    }
}

/// Same bytes as `Marker`, different id.
struct OtherMarker;

static OTHER_MARKER_SCHEMA: HeaderSchema = HeaderSchema {
    id: "other_marker",
    name: "Other Marker",
    nickname: "MRK2",
    is_protocol: true,
    fields: MARKER_FIELDS,
};

impl HeaderCodec for OtherMarker {
    fn schema(&self) -> &'static HeaderSchema {
        &OTHER_MARKER_SCHEMA
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        Marker.matches(probe)
    }
}

/// Matches everything, reads nothing.
struct Hollow;

static HOLLOW_SCHEMA: HeaderSchema = HeaderSchema {
    id: "hollow",
    name: "Hollow",
    nickname: "HOL",
    is_protocol: true,
    fields: &[],
};

impl HeaderCodec for Hollow {
    fn schema(&self) -> &'static HeaderSchema {
        &HOLLOW_SCHEMA
    }

    fn matches(&self, _probe: &Probe<'_>) -> bool {
        true
    }
}

const UDP_FRAME: [u8; 47] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0x08, 0x00, 0x45, 0x00,
    0x00, 0x21, 0x1c, 0x46, 0x40, 0x00, 0x40, 0x11, 0x9c, 0x6d, 0xc0, 0xa8, 0x00, 0x01, 0xc0, 0xa8,
    0x00, 0xc7, 0x04, 0xd2, 0x00, 0x35, 0x00, 0x0d, 0x34, 0xe2, 0x68, 0x65, 0x6c, 0x6c, 0x6f,
];

fn ids(results: &[layercodec::DecodeResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn test_catch_all_only_catalogue() {
    let codec = Codec::new(RegistryBuilder::new().catch_all(RawData).build());
    let results = codec.decode(&[0x01, 0x02]).expect("decode");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "raw");
    assert!(!results[0].protocol);
    assert!(results[0].errors.is_empty());
    assert_eq!(results[0].data.get_path("data"), Some(&Value::Bytes(vec![0x01, 0x02])));
}

#[test]
fn test_empty_input_yields_no_headers() {
    let codec = Codec::default();
    assert!(codec.decode(&[]).expect("decode").is_empty());
}

#[test]
fn test_no_available_codec_is_fatal() {
    let codec = Codec::new(RegistryBuilder::new().register(Marker).build());
    assert!(matches!(codec.decode(&[0x01]), Err(CodecError::NoAvailableCodec)));
    // Marker consumes the first byte, nothing claims the second.
    assert!(matches!(codec.decode(&[0xaa, 0x01]), Err(CodecError::NoAvailableCodec)));
}

#[test]
fn test_catch_all_is_always_last() {
    let registry = RegistryBuilder::new()
        .register(RawData)
        .catch_all(RawData)
        .register(Marker)
        .build();
    let order: Vec<&str> = registry.iter().map(|c| c.id()).collect();
    assert_eq!(order, vec!["marker", "raw"]);

    let results = Codec::new(registry).decode(&[0xaa, 0xaa, 0x01]).expect("decode");
    assert_eq!(ids(&results), vec!["marker", "marker", "raw"]);
    assert_eq!(results[2].data.get_path("data"), Some(&Value::Bytes(vec![0x01])));
}

#[test]
fn test_first_registered_match_wins() {
    let codec = Codec::new(
        RegistryBuilder::new()
            .register(OtherMarker)
            .register(Marker)
            .catch_all(RawData)
            .build(),
    );
    let results = codec.decode(&[0xaa]).expect("decode");
    assert_eq!(ids(&results), vec!["other_marker"]);
}

#[test]
fn test_replace_keeps_position() {
    let registry = RegistryBuilder::new()
        .register(Marker)
        .register(EthernetII)
        .replace(EthernetII)
        .catch_all(RawData)
        .build();
    let order: Vec<&str> = registry.iter().map(|c| c.id()).collect();
    assert_eq!(order, vec!["marker", "eth", "raw"]);
    assert_eq!(registry.len(), 3);
    assert!(registry.find("eth").is_some());
    assert!(registry.find("vlan").is_none());
}

#[test]
fn test_zero_length_header_ends_pass() {
    let codec = Codec::new(RegistryBuilder::new().register(Hollow).catch_all(RawData).build());
    let results = codec.decode(&[1, 2, 3]).expect("decode");
    assert_eq!(ids(&results), vec!["hollow"]);
    assert_eq!(results[0].errors.len(), 1);
    assert_eq!(results[0].errors[0].message, "Header consumed no bytes");
}

#[test]
fn test_header_limit_bounds_the_pass() {
    let config = CodecConfig {
        max_headers: 2,
        ..CodecConfig::default()
    };
    let registry = RegistryBuilder::new().register(Marker).catch_all(RawData).build();
    let codec = Codec::with_config(registry, config).expect("config");
    let results = codec.decode(&[0xaa; 5]).expect("decode");
    assert_eq!(results.len(), 2);
    assert!(results[1].errors[0].message.contains("Header limit"));
}

#[test]
fn test_truncated_header_records_errors_and_stops() {
    let codec = Codec::default();
    let results = codec.decode(&[0u8; 10]).expect("decode");
    assert_eq!(ids(&results), vec!["eth"]);
    let paths: Vec<&str> = results[0].errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["smac", "etherType"]);
    assert!(results[0].errors[0].message.starts_with("Out of bounds"));
    // Only the field that could be read is present.
    let data = results[0].data.as_struct().expect("struct");
    assert_eq!(data.len(), 1);
    assert!(data.contains_key("dmac"));
}

#[test]
fn test_decode_ipv4_udp_chain() {
    let codec = Codec::default();
    let results = codec.decode(&UDP_FRAME).expect("decode");
    assert_eq!(ids(&results), vec!["eth", "ipv4", "udp", "raw"]);
    assert!(results.iter().all(|r| r.errors.is_empty()));

    let eth = &results[0].data;
    assert_eq!(eth.get_path("dmac"), Some(&Value::from("00:11:22:33:44:55")));
    assert_eq!(eth.get_path("etherType"), Some(&Value::from("0800")));

    let ip = &results[1].data;
    assert_eq!(ip.get_path("hdrLen"), Some(&Value::U8(20)));
    assert_eq!(ip.get_path("length"), Some(&Value::U16(33)));
    assert_eq!(ip.get_path("flags.df"), Some(&Value::Bool(true)));
    assert_eq!(ip.get_path("ttl"), Some(&Value::U8(64)));
    assert_eq!(ip.get_path("sip"), Some(&Value::from("192.168.0.1")));
    assert_eq!(ip.get_path("dip"), Some(&Value::from("192.168.0.199")));
    // No options on the wire, no options key.
    assert!(ip.get_path("options").is_none());

    let udp = &results[2].data;
    assert_eq!(udp.get_path("srcport"), Some(&Value::U16(1234)));
    assert_eq!(udp.get_path("dstport"), Some(&Value::U16(53)));
    assert_eq!(udp.get_path("checksum"), Some(&Value::U16(0x34e2)));

    assert_eq!(results[3].data.get_path("data"), Some(&Value::Bytes(b"hello".to_vec())));
}

#[test]
fn test_round_trip() {
    let codec = Codec::default();
    let results = codec.decode(&UDP_FRAME).expect("decode");
    let inputs: Vec<EncodeInput> = results.iter().map(EncodeInput::from).collect();
    let encoded = codec.encode(&inputs).expect("encode");
    assert!(encoded.errors.is_empty(), "{:?}", encoded.errors);
    assert_eq!(encoded.packet, UDP_FRAME.to_vec());
    // And again from the re-encoded bytes.
    assert_eq!(codec.decode(&encoded.packet).expect("decode"), results);
}

#[test]
fn test_encode_skips_unknown_ids() {
    let codec = Codec::default();
    let inputs = vec![
        EncodeInput::new("nonexistent", object([("x", Value::U8(1))])),
        EncodeInput::new("raw", object([("data", Value::Bytes(vec![9, 8, 7]))])),
    ];
    let encoded = codec.encode(&inputs).expect("encode");
    assert_eq!(encoded.packet, vec![9, 8, 7]);
    assert!(encoded.errors.is_empty());
}

#[test]
fn test_encode_errors_in_header_order() {
    let codec = Codec::default();
    let inputs = vec![
        EncodeInput::new(
            "eth",
            object([
                ("dmac", Value::from("ff:ff:ff:ff:ff:ff")),
                ("smac", Value::from("00:11:22:33:44:55")),
                ("etherType", Value::from("88b5")),
                ("bogus", Value::U8(1)),
            ]),
        ),
        EncodeInput::new("raw", object([("data", Value::U8(3))])),
    ];
    let encoded = codec.encode(&inputs).expect("encode");
    let errors: Vec<(&str, &str, &str)> = encoded
        .errors
        .iter()
        .map(|e| (e.id.as_str(), e.path.as_str(), e.message.as_str()))
        .collect();
    assert_eq!(
        errors,
        vec![
            ("eth", "bogus", "Unexpected field"),
            ("raw", "data", "Expected bytes"),
            ("raw", "data", "Not Found"),
        ]
    );
    assert_eq!(encoded.packet.len(), 14);
}

#[test]
fn test_schemas_describe_the_catalogue() {
    let schemas = HeaderRegistry::with_defaults().schemas();
    let ids: Vec<&str> = schemas.iter().map(|s| s.id).collect();
    assert_eq!(ids.first(), Some(&"eth"));
    assert_eq!(ids.last(), Some(&"raw"));
    let udp = schemas.iter().find(|s| s.id == "udp").expect("udp schema");
    let paths: Vec<&str> = udp.fields.iter().map(|f| f.path).collect();
    assert_eq!(paths, vec!["srcport", "dstport", "length", "checksum"]);
    assert_eq!(Codec::default().schemas().len(), schemas.len());
}
