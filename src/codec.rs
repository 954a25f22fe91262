//! Decode/encode engine: walks a packet header by header.
//!
//! Decoding picks, at each cursor position, the first codec in the registry whose
//! `matches` accepts the bytes and the headers already seen, lets it fill its field tree,
//! and moves the cursor to its end. Encoding walks a list of `(id, data)` inputs and
//! appends each header to a growing buffer. Both passes finish by running the deferred
//! post-handlers (checksums, lengths) in their scheduled order.
//!
//! Malformed input never aborts a pass: problems are collected as [`CodecErrorInfo`]
//! records on the header that hit them. Only a catalogue with no matching codec is fatal.

use crate::config::CodecConfig;
use crate::header::{CodecData, Header, HeaderCodec, ModuleState, Probe};
use crate::post_handler::{schedule, Direction};
use crate::registry::{CodecSchema, HeaderRegistry};
use crate::value::Value;
use std::fmt;
use tracing::{debug, trace, warn};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Out of bounds: {len} byte(s) at offset {offset}, buffer has {buffer_len}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },
    #[error("Invalid bit range: {bit_len} bit(s) at bit {bit_offset} of a {byte_len}-byte window")]
    BitRange {
        byte_len: usize,
        bit_offset: usize,
        bit_len: usize,
    },
    #[error("No available codec")]
    NoAvailableCodec,
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Config: {0}")]
    Config(String),
}

/// A non-fatal problem attached to one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecErrorInfo {
    /// Header id.
    pub id: String,
    /// Dotted field path; empty for the header as a whole.
    pub path: String,
    pub message: String,
}

impl fmt::Display for CodecErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.id, self.message)
        } else {
            write!(f, "{}.{}: {}", self.id, self.path, self.message)
        }
    }
}

/// One decoded header.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub id: String,
    pub name: String,
    pub nickname: String,
    /// False for the catch-all payload.
    pub protocol: bool,
    pub errors: Vec<CodecErrorInfo>,
    /// Defined fields only.
    pub data: Value,
}

impl From<ModuleState> for DecodeResult {
    fn from(m: ModuleState) -> Self {
        DecodeResult {
            id: m.id.to_string(),
            name: m.name.to_string(),
            nickname: m.nickname.to_string(),
            protocol: m.is_protocol,
            errors: m.errors,
            data: m.instance.to_value(),
        }
    }
}

/// One header to encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeInput {
    pub id: String,
    pub data: Value,
}

impl EncodeInput {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        EncodeInput { id: id.into(), data }
    }
}

impl From<DecodeResult> for EncodeInput {
    fn from(r: DecodeResult) -> Self {
        EncodeInput { id: r.id, data: r.data }
    }
}

impl From<&DecodeResult> for EncodeInput {
    fn from(r: &DecodeResult) -> Self {
        EncodeInput {
            id: r.id.clone(),
            data: r.data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeResult {
    pub packet: Vec<u8>,
    /// Errors of every encoded header, in header order.
    pub errors: Vec<CodecErrorInfo>,
}

/// The engine. Holds an immutable catalogue, so one instance can serve many threads.
#[derive(Debug)]
pub struct Codec {
    registry: HeaderRegistry,
    config: CodecConfig,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(HeaderRegistry::with_defaults())
    }
}

impl Codec {
    pub fn new(registry: HeaderRegistry) -> Self {
        Codec {
            registry,
            config: CodecConfig::default(),
        }
    }

    pub fn with_config(registry: HeaderRegistry, config: CodecConfig) -> Result<Self, CodecError> {
        config.validate()?;
        Ok(Codec { registry, config })
    }

    pub fn registry(&self) -> &HeaderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn schemas(&self) -> Vec<CodecSchema> {
        self.registry.schemas()
    }

    /// Decode a packet into its header chain.
    ///
    /// Empty input gives an empty list. Fails only when no codec, not even the catch-all,
    /// accepts the bytes at the cursor.
    pub fn decode(&self, packet: &[u8]) -> Result<Vec<DecodeResult>, CodecError> {
        let mut data = CodecData::new(packet.to_vec());
        let mut modules: Vec<ModuleState> = Vec::new();

        while data.start_pos < data.packet.len() {
            if modules.len() >= self.config.max_headers {
                warn!(max_headers = self.config.max_headers, "header limit reached, decode stopped");
                if let Some(last) = modules.last_mut() {
                    last.record_error("", format!("Header limit of {} reached", self.config.max_headers));
                }
                break;
            }
            let codec: &dyn HeaderCodec = {
                let probe = Probe::new(&data.packet, data.start_pos, &modules);
                self.registry.select(&probe).ok_or(CodecError::NoAvailableCodec)?
            };
            let start = data.start_pos;
            let mut state = ModuleState::new(codec.schema(), start);
            let end = {
                let mut header = Header::new(&mut data, &mut state, &modules, &[]);
                codec.decode(&mut header);
                codec.end_pos(&header)
            };
            debug!(id = state.id, start, end, errors = state.errors.len(), "decoded header");
            if end <= start {
                warn!(id = state.id, start, "header consumed no bytes, decode stopped");
                state.record_error("", "Header consumed no bytes");
                modules.push(state);
                break;
            }
            data.start_pos = end;
            modules.push(state);
        }

        run_post_handlers(&mut data, &mut modules, Direction::Decode);
        Ok(modules.into_iter().map(DecodeResult::from).collect())
    }

    /// Encode a header chain. Inputs with an unknown id are skipped.
    pub fn encode(&self, inputs: &[EncodeInput]) -> Result<EncodeResult, CodecError> {
        let mut data = CodecData::with_capacity(self.config.encode_capacity);
        let mut modules: Vec<ModuleState> = Vec::with_capacity(inputs.len());

        for input in inputs {
            let Some(codec) = self.registry.find(&input.id) else {
                debug!(id = %input.id, "no codec for id, input skipped");
                continue;
            };
            let start = data.start_pos;
            let mut state = ModuleState::new(codec.schema(), start);
            let end = {
                let mut header = Header::new(&mut data, &mut state, &modules, &[]);
                let sanitized = codec.validate(&mut header, input.data.clone());
                header.load(sanitized);
                codec.encode(&mut header);
                codec.end_pos(&header)
            };
            debug!(id = state.id, start, end, "encoded header");
            data.start_pos = end.max(start);
            modules.push(state);
        }

        run_post_handlers(&mut data, &mut modules, Direction::Encode);
        let errors = modules.iter().flat_map(|m| m.errors.iter().cloned()).collect();
        Ok(EncodeResult {
            packet: data.packet,
            errors,
        })
    }
}

/// Run every registered post-packet handler once, in scheduled order.
fn run_post_handlers(data: &mut CodecData, modules: &mut [ModuleState], direction: Direction) {
    let groups = std::mem::take(&mut data.post_handlers);
    for scheduled in schedule(groups, direction) {
        if scheduled.module_index >= modules.len() {
            continue;
        }
        trace!(module = scheduled.module_index, priority = scheduled.priority, "post handler");
        let (prev, rest) = modules.split_at_mut(scheduled.module_index);
        let Some((state, next)) = rest.split_first_mut() else {
            continue;
        };
        let mut header = Header::new(data, state, prev, next);
        if let Err(e) = (scheduled.handler)(&mut header) {
            header.record_error("", e.to_string());
        }
        header.run_self_handlers();
    }
    if !data.post_handlers.is_empty() {
        warn!("post handlers registered by post handlers are ignored");
        data.post_handlers.clear();
    }
}
