//! Post-handler scheduling as seen through full decode and encode passes.

use layercodec::codec::CodecError;
use layercodec::header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, Probe};
use layercodec::headers::fields;
use layercodec::value::object;
use layercodec::{Codec, EncodeInput, RegistryBuilder, Value};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// Two packet handlers per header, registered at priorities 2 then 1.
    Packet,
    /// Two self handlers, registered at priorities 5 then 1.
    SelfHandlers,
    /// One packet handler that fails.
    Failing,
    /// A packet handler that registers more handlers while running.
    Late,
}

static RECORDER_SCHEMA: HeaderSchema = HeaderSchema {
    id: "recorder",
    name: "Recorder",
    nickname: "REC",
    is_protocol: true,
    fields: &[FieldDescriptor {
        path: "tag",
        label: "Tag",
        kind: FieldKind::U8,
        decode: |h| fields::decode_u8(h, "tag", 0),
        encode: |h| fields::encode_u8(h, "tag", 0, 0),
    }],
};

/// One-byte header that logs when its handlers run.
struct Recorder {
    log: Log,
    mode: Mode,
}

fn push(log: &Log, entry: String) {
    log.lock().expect("log lock").push(entry);
}

impl Recorder {
    fn new(mode: Mode) -> (Self, Log) {
        let log: Log = Arc::default();
        (
            Recorder {
                log: Arc::clone(&log),
                mode,
            },
            log,
        )
    }

    fn register(&self, header: &mut Header<'_>) {
        match self.mode {
            Mode::Packet => {
                for priority in [2, 1] {
                    let log = Arc::clone(&self.log);
                    header.add_post_packet_handler(priority, move |h| {
                        push(
                            &log,
                            format!("{}:{}/{}", h.index(), priority, h.following_modules().len()),
                        );
                        Ok(())
                    });
                }
            }
            Mode::SelfHandlers => {
                for priority in [5, 1] {
                    let log = Arc::clone(&self.log);
                    header.add_post_self_handler(priority, move |h| {
                        let tag = h.get("tag").and_then(|v| v.as_u64()).unwrap_or(0);
                        push(&log, format!("self-{}:{}:{}", priority, h.index(), tag));
                        Ok(())
                    });
                }
            }
            Mode::Failing => {
                header.add_post_packet_handler(1, |_| Err(CodecError::InvalidValue("boom".to_string())));
            }
            Mode::Late => {
                let log = Arc::clone(&self.log);
                header.add_post_packet_handler(1, move |h| {
                    push(&log, format!("post:{}", h.index()));
                    let late = Arc::clone(&log);
                    h.add_post_packet_handler(0, move |_| {
                        push(&late, "late".to_string());
                        Ok(())
                    });
                    let after = Arc::clone(&log);
                    h.add_post_self_handler(0, move |h| {
                        push(&after, format!("self-after:{}", h.index()));
                        Ok(())
                    });
                    Ok(())
                });
            }
        }
    }
}

impl HeaderCodec for Recorder {
    fn schema(&self) -> &'static HeaderSchema {
        &RECORDER_SCHEMA
    }

    fn matches(&self, _probe: &Probe<'_>) -> bool {
        true
    }

    fn decode(&self, header: &mut Header<'_>) {
        match header.read_u8(0) {
            Ok(tag) => header.set("tag", tag),
            Err(e) => header.record_error("tag", e.to_string()),
        }
        self.register(header);
        header.run_self_handlers();
    }

    fn encode(&self, header: &mut Header<'_>) {
        let tag = header.u64_or("tag", 0) as u8;
        header.write_u8(0, tag);
        self.register(header);
        header.run_self_handlers();
    }
}

fn codec(recorder: Recorder) -> Codec {
    Codec::new(RegistryBuilder::new().register(recorder).build())
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().expect("log lock").clone()
}

#[test]
fn test_decode_runs_groups_in_physical_order() {
    let (recorder, log) = Recorder::new(Mode::Packet);
    let results = codec(recorder).decode(&[1, 2, 3]).expect("decode");
    assert_eq!(results.len(), 3);
    assert_eq!(
        entries(&log),
        vec!["0:1/2", "0:2/2", "1:1/1", "1:2/1", "2:1/0", "2:2/0"]
    );
}

#[test]
fn test_encode_runs_innermost_group_first() {
    let (recorder, log) = Recorder::new(Mode::Packet);
    let inputs: Vec<EncodeInput> = (1u8..=3)
        .map(|tag| EncodeInput::new("recorder", object([("tag", Value::U8(tag))])))
        .collect();
    let encoded = codec(recorder).encode(&inputs).expect("encode");
    assert_eq!(encoded.packet, vec![1, 2, 3]);
    assert!(encoded.errors.is_empty());
    // Rank order inside a group is the same in both directions.
    assert_eq!(
        entries(&log),
        vec!["2:1/0", "2:2/0", "1:1/1", "1:2/1", "0:1/2", "0:2/2"]
    );
}

#[test]
fn test_self_handlers_run_after_own_fields() {
    let (recorder, log) = Recorder::new(Mode::SelfHandlers);
    codec(recorder).decode(&[7, 9]).expect("decode");
    assert_eq!(
        entries(&log),
        vec!["self-1:0:7", "self-5:0:7", "self-1:1:9", "self-5:1:9"]
    );
}

#[test]
fn test_failing_handler_is_recorded_on_its_header() {
    let (recorder, _log) = Recorder::new(Mode::Failing);
    let results = codec(recorder).decode(&[1, 2]).expect("decode");
    for result in &results {
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "");
        assert_eq!(result.errors[0].message, "Invalid value: boom");
    }
    // Fields decoded before the failure stay in the result.
    assert_eq!(results[1].data.get_path("tag"), Some(&Value::U8(2)));
}

#[test]
fn test_handlers_registered_while_running_are_not_scheduled() {
    let (recorder, log) = Recorder::new(Mode::Late);
    codec(recorder).decode(&[1, 2]).expect("decode");
    assert_eq!(
        entries(&log),
        vec!["post:0", "self-after:0", "post:1", "self-after:1"]
    );
}

#[test]
fn test_lengths_are_final_before_checksums() {
    // The IPv4 header checksum depends on the total length written before it.
    let codec = Codec::default();
    let inputs = vec![
        EncodeInput::new(
            "eth",
            object([
                ("dmac", Value::from("00:11:22:33:44:55")),
                ("smac", Value::from("66:77:88:99:aa:bb")),
                ("etherType", Value::from("0800")),
            ]),
        ),
        EncodeInput::new(
            "ipv4",
            object([
                ("version", Value::U8(4)),
                ("dsfield", object([("dscp", Value::U8(0)), ("ecn", Value::U8(0))])),
                ("id", Value::U16(0x1c46)),
                (
                    "flags",
                    object([
                        ("rb", Value::Bool(false)),
                        ("df", Value::Bool(true)),
                        ("mf", Value::Bool(false)),
                    ]),
                ),
                ("fragOffset", Value::U16(0)),
                ("ttl", Value::U8(64)),
                ("protocol", Value::U8(17)),
                ("sip", Value::from("192.168.0.1")),
                ("dip", Value::from("192.168.0.199")),
            ]),
        ),
        EncodeInput::new(
            "udp",
            object([("srcport", Value::U16(1234)), ("dstport", Value::U16(53))]),
        ),
        EncodeInput::new("raw", object([("data", Value::Bytes(b"hello".to_vec()))])),
    ];
    let encoded = codec.encode(&inputs).expect("encode");
    assert!(encoded.errors.is_empty(), "{:?}", encoded.errors);
    assert_eq!(&encoded.packet[16..18], &[0x00, 0x21]);
    assert_eq!(&encoded.packet[24..26], &[0x9c, 0x6d]);
    assert_eq!(&encoded.packet[38..40], &[0x00, 0x0d]);
    assert_eq!(&encoded.packet[40..42], &[0x34, 0xe2]);
}
