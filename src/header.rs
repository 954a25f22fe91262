//! Header module contract and the per-header buffer accessor.
//!
//! A header type is a [`HeaderCodec`]: static identity plus an ordered list of
//! [`FieldDescriptor`]s, each carrying a decode and an encode function. The engine hands
//! every field function a [`Header`], which exposes the shared packet buffer relative to
//! the header's own start, the header's [`FieldTree`], error recording, the headers
//! processed earlier in the pass, and post-handler registration.
//!
//! Field functions return `Result`; an `Err` is recorded against the field's path and the
//! pass moves on to the next field, so one malformed field never hides its siblings.

use crate::buffer;
use crate::codec::{CodecError, CodecErrorInfo};
use crate::field_tree::FieldTree;
use crate::post_handler::{sort_by_priority, PostHandlerItem};
use crate::value::Value;
use std::collections::HashMap;

/// Shared mutable state of one decode or encode pass.
#[derive(Debug, Default)]
pub struct CodecData {
    pub packet: Vec<u8>,
    /// Start of the header being processed. Only moves forward.
    pub start_pos: usize,
    /// One handler list per header occurrence, in processing order.
    pub post_handlers: Vec<Vec<PostHandlerItem>>,
}

impl CodecData {
    pub fn new(packet: Vec<u8>) -> Self {
        CodecData {
            packet,
            ..Default::default()
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Vec::with_capacity(capacity))
    }
}

/// One recognized header occurrence.
#[derive(Debug, Clone)]
pub struct ModuleState {
    pub id: &'static str,
    pub name: &'static str,
    pub nickname: &'static str,
    pub is_protocol: bool,
    pub errors: Vec<CodecErrorInfo>,
    pub instance: FieldTree,
    pub start_pos: usize,
    pub header_length: usize,
}

impl ModuleState {
    pub fn new(schema: &HeaderSchema, start_pos: usize) -> Self {
        ModuleState {
            id: schema.id,
            name: schema.name,
            nickname: schema.nickname,
            is_protocol: schema.is_protocol,
            errors: Vec::new(),
            instance: FieldTree::new(),
            start_pos,
            header_length: 0,
        }
    }

    pub fn length(&self) -> usize {
        self.header_length
    }

    pub fn end_pos(&self) -> usize {
        self.start_pos + self.header_length
    }

    pub fn field(&self, path: &str) -> Option<Value> {
        self.instance.get_value(path)
    }

    pub fn record_error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(CodecErrorInfo {
            id: self.id.to_string(),
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Field value kinds, used to sanitize encode input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer { min: i64, max: i64 },
    Text,
    Bytes,
    Boolean,
    List,
    Object,
}

impl FieldKind {
    pub const U8: FieldKind = FieldKind::Integer { min: 0, max: 0xff };
    pub const U16: FieldKind = FieldKind::Integer { min: 0, max: 0xffff };
    pub const U32: FieldKind = FieldKind::Integer { min: 0, max: 0xffff_ffff };

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Integer { .. } => "integer",
            FieldKind::Text => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Boolean => "boolean",
            FieldKind::List => "list",
            FieldKind::Object => "object",
        }
    }
}

pub type FieldFn = fn(&mut Header<'_>) -> Result<(), CodecError>;

/// One schema entry. `path` is dotted; object entries precede their children.
#[derive(Clone, Copy)]
pub struct FieldDescriptor {
    pub path: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub decode: FieldFn,
    pub encode: FieldFn,
}

impl FieldDescriptor {
    /// Object entry whose children do all the work.
    pub const fn object(path: &'static str, label: &'static str) -> Self {
        FieldDescriptor {
            path,
            label,
            kind: FieldKind::Object,
            decode: no_op,
            encode: no_op,
        }
    }
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("path", &self.path)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .finish()
    }
}

pub fn no_op(_: &mut Header<'_>) -> Result<(), CodecError> {
    Ok(())
}

/// Static identity and field layout of a header type.
#[derive(Debug)]
pub struct HeaderSchema {
    pub id: &'static str,
    pub name: &'static str,
    pub nickname: &'static str,
    pub is_protocol: bool,
    pub fields: &'static [FieldDescriptor],
}

/// A pluggable header type.
pub trait HeaderCodec: Send + Sync {
    fn schema(&self) -> &'static HeaderSchema;

    /// Does the buffer at the probe's position hold this header? Must be pure.
    fn matches(&self, probe: &Probe<'_>) -> bool;

    fn id(&self) -> &'static str {
        self.schema().id
    }

    /// Run every field decoder in declaration order (objects before their children).
    fn decode(&self, header: &mut Header<'_>) {
        for field in self.schema().fields {
            if let Err(e) = (field.decode)(header) {
                header.record_error(field.path, e.to_string());
            }
        }
        header.run_self_handlers();
    }

    /// Run every field encoder, children before the object that holds them.
    fn encode(&self, header: &mut Header<'_>) {
        let fields = self.schema().fields;
        for idx in encode_order(fields) {
            let field = &fields[idx];
            if let Err(e) = (field.encode)(header) {
                header.record_error(field.path, e.to_string());
            }
        }
        header.run_self_handlers();
    }

    /// Sanitize caller input against the schema before it becomes the field tree.
    fn validate(&self, header: &mut Header<'_>, data: Value) -> Value {
        validate_fields(header, self.schema().fields, data)
    }

    /// Where the next header starts. Defaults to the furthest byte this header touched.
    fn end_pos(&self, header: &Header<'_>) -> usize {
        header.start_pos() + header.length()
    }
}

fn is_descendant(path: &str, parent: &str) -> bool {
    path.len() > parent.len() && path.starts_with(parent) && path.as_bytes()[parent.len()] == b'.'
}

/// Post-order over the flat descriptor list.
pub fn encode_order(fields: &[FieldDescriptor]) -> Vec<usize> {
    let mut order = Vec::with_capacity(fields.len());
    let mut open: Vec<usize> = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        while let Some(&top) = open.last() {
            if is_descendant(field.path, fields[top].path) {
                break;
            }
            order.push(top);
            open.pop();
        }
        if field.kind == FieldKind::Object {
            open.push(i);
        } else {
            order.push(i);
        }
    }
    while let Some(top) = open.pop() {
        order.push(top);
    }
    order
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn integer_of(v: &Value) -> Option<i128> {
    match v {
        Value::I64(x) => Some(*x as i128),
        Value::Bool(_) => None,
        other => other.as_u64().map(|x| x as i128),
    }
}

/// Schema-shaped sanitation: unknown keys and mistyped values are dropped, integers are
/// clamped into range. Every correction is recorded.
pub fn validate_fields(header: &mut Header<'_>, fields: &[FieldDescriptor], data: Value) -> Value {
    match data {
        Value::Struct(map) => Value::Struct(sanitize_object(header, fields, "", map)),
        _ => {
            header.record_error("", "Expected an object");
            Value::Struct(HashMap::new())
        }
    }
}

fn sanitize_object(
    header: &mut Header<'_>,
    fields: &[FieldDescriptor],
    prefix: &str,
    map: HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut entries: Vec<_> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = HashMap::new();
    for (key, value) in entries {
        let path = join(prefix, &key);
        let kind = match fields.iter().find(|f| f.path == path) {
            Some(f) => f.kind,
            None if fields.iter().any(|f| is_descendant(f.path, &path)) => FieldKind::Object,
            None => {
                header.record_error(&path, "Unexpected field");
                continue;
            }
        };
        if let Some(v) = sanitize_value(header, fields, &path, kind, value) {
            out.insert(key, v);
        }
    }
    out
}

fn sanitize_value(
    header: &mut Header<'_>,
    fields: &[FieldDescriptor],
    path: &str,
    kind: FieldKind,
    value: Value,
) -> Option<Value> {
    match (kind, value) {
        (FieldKind::Object, Value::Struct(m)) => Some(Value::Struct(sanitize_object(header, fields, path, m))),
        (FieldKind::Integer { min, max }, v) => match integer_of(&v) {
            Some(n) if n > max as i128 => {
                header.record_error(path, format!("Maximum value is {}", max));
                Some(Value::I64(max))
            }
            Some(n) if n < min as i128 => {
                header.record_error(path, format!("Minimum value is {}", min));
                Some(Value::I64(min))
            }
            Some(_) => Some(v),
            None => {
                header.record_error(path, "Expected integer");
                None
            }
        },
        (FieldKind::Text, v @ Value::Str(_))
        | (FieldKind::Bytes, v @ Value::Bytes(_))
        | (FieldKind::List, v @ Value::List(_)) => Some(v),
        (FieldKind::Boolean, v) => match v.as_bool() {
            Some(b) => Some(Value::Bool(b)),
            None => {
                header.record_error(path, "Expected boolean");
                None
            }
        },
        (kind, _) => {
            header.record_error(path, format!("Expected {}", kind.name()));
            None
        }
    }
}

/// Read-only view used by [`HeaderCodec::matches`].
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    packet: &'a [u8],
    start_pos: usize,
    prev: &'a [ModuleState],
}

impl<'a> Probe<'a> {
    pub fn new(packet: &'a [u8], start_pos: usize, prev: &'a [ModuleState]) -> Self {
        Probe { packet, start_pos, prev }
    }

    pub fn start_pos(&self) -> usize {
        self.start_pos
    }

    pub fn remaining(&self) -> usize {
        self.packet.len().saturating_sub(self.start_pos)
    }

    pub fn prev_module(&self) -> Option<&'a ModuleState> {
        self.prev.last()
    }

    pub fn prev_modules(&self) -> &'a [ModuleState] {
        self.prev
    }

    /// Field of the immediately preceding header.
    pub fn prev_field(&self, path: &str) -> Option<Value> {
        self.prev_module().and_then(|m| m.field(path))
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], CodecError> {
        buffer::read_bytes(self.packet, self.start_pos + offset, len)
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, CodecError> {
        Ok(self.read_bytes(offset, 1)?[0])
    }

    pub fn read_bits(&self, offset: usize, byte_len: usize, bit_offset: usize, bit_len: usize) -> Result<u64, CodecError> {
        buffer::read_bits(self.packet, self.start_pos + offset, byte_len, bit_offset, bit_len)
    }
}

/// Per-header accessor handed to field functions and post-handlers.
pub struct Header<'a> {
    data: &'a mut CodecData,
    state: &'a mut ModuleState,
    prev: &'a [ModuleState],
    next: &'a [ModuleState],
    self_handlers: Vec<PostHandlerItem>,
}

impl<'a> Header<'a> {
    pub fn new(
        data: &'a mut CodecData,
        state: &'a mut ModuleState,
        prev: &'a [ModuleState],
        next: &'a [ModuleState],
    ) -> Self {
        Header {
            data,
            state,
            prev,
            next,
            self_handlers: Vec::new(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.state.id
    }

    /// Position of this header in the pass.
    pub fn index(&self) -> usize {
        self.prev.len()
    }

    pub fn start_pos(&self) -> usize {
        self.state.start_pos
    }

    pub fn length(&self) -> usize {
        self.state.header_length
    }

    pub fn end_pos(&self) -> usize {
        self.state.end_pos()
    }

    /// Override the consumed extent.
    pub fn set_length(&mut self, len: usize) {
        self.state.header_length = len;
    }

    pub fn packet(&self) -> &[u8] {
        &self.data.packet
    }

    /// Bytes from this header's start to the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.packet.len().saturating_sub(self.state.start_pos)
    }

    pub fn state(&self) -> &ModuleState {
        self.state
    }

    pub fn errors(&self) -> &[CodecErrorInfo] {
        &self.state.errors
    }

    fn touch(&mut self, offset: usize, len: usize) {
        self.state.header_length = self.state.header_length.max(offset + len);
    }

    pub fn read_bytes(&mut self, offset: usize, len: usize) -> Result<&[u8], CodecError> {
        self.touch(offset, len);
        buffer::read_bytes(&self.data.packet, self.state.start_pos + offset, len)
    }

    pub fn read_u8(&mut self, offset: usize) -> Result<u8, CodecError> {
        Ok(self.read_bytes(offset, 1)?[0])
    }

    pub fn read_u16(&mut self, offset: usize) -> Result<u16, CodecError> {
        Ok(buffer::bytes_to_u64(self.read_bytes(offset, 2)?) as u16)
    }

    pub fn read_u32(&mut self, offset: usize) -> Result<u32, CodecError> {
        Ok(buffer::bytes_to_u64(self.read_bytes(offset, 4)?) as u32)
    }

    pub fn read_bits(&mut self, offset: usize, byte_len: usize, bit_offset: usize, bit_len: usize) -> Result<u64, CodecError> {
        self.touch(offset, byte_len);
        buffer::read_bits(&self.data.packet, self.state.start_pos + offset, byte_len, bit_offset, bit_len)
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.touch(offset, bytes.len());
        buffer::write_bytes(&mut self.data.packet, self.state.start_pos + offset, bytes);
    }

    pub fn write_u8(&mut self, offset: usize, v: u8) {
        self.write_bytes(offset, &[v]);
    }

    pub fn write_u16(&mut self, offset: usize, v: u16) {
        self.write_bytes(offset, &v.to_be_bytes());
    }

    pub fn write_u32(&mut self, offset: usize, v: u32) {
        self.write_bytes(offset, &v.to_be_bytes());
    }

    pub fn write_bits(
        &mut self,
        offset: usize,
        byte_len: usize,
        bit_offset: usize,
        bit_len: usize,
        value: u64,
    ) -> Result<(), CodecError> {
        self.touch(offset, byte_len);
        buffer::write_bits(&mut self.data.packet, self.state.start_pos + offset, byte_len, bit_offset, bit_len, value)
    }

    pub fn record_error(&mut self, path: &str, message: impl Into<String>) {
        self.state.record_error(path, message);
    }

    pub fn instance(&self) -> &FieldTree {
        &self.state.instance
    }

    /// Replace the whole field tree (encode input after validation).
    pub fn load(&mut self, data: Value) {
        self.state.instance = FieldTree::from_value(data);
    }

    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        self.state.instance.set_value(path, value);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.state.instance.get_value(path)
    }

    pub fn is_undefined(&self, path: &str) -> bool {
        self.state.instance.is_undefined(path)
    }

    /// Value at `path`; records "Not Found" and yields `fallback` when it was never set.
    pub fn value_or(&mut self, path: &str, fallback: Value) -> Value {
        let state = &mut *self.state;
        let mut missing = false;
        let v = state.instance.get_value_or(path, fallback, |_| missing = true);
        if missing {
            state.record_error(path, "Not Found");
        }
        v
    }

    pub fn u64_or(&mut self, path: &str, fallback: u64) -> u64 {
        match self.value_or(path, Value::U64(fallback)).as_u64() {
            Some(n) => n,
            None => {
                self.record_error(path, "Expected integer");
                fallback
            }
        }
    }

    pub fn str_or(&mut self, path: &str, fallback: &str) -> String {
        match self.value_or(path, Value::from(fallback)) {
            Value::Str(s) => s,
            _ => {
                self.record_error(path, "Expected string");
                fallback.to_string()
            }
        }
    }

    pub fn bytes_or(&mut self, path: &str, fallback: &[u8]) -> Vec<u8> {
        match self.value_or(path, Value::from(fallback)) {
            Value::Bytes(b) => b,
            _ => {
                self.record_error(path, "Expected bytes");
                fallback.to_vec()
            }
        }
    }

    pub fn bool_or(&mut self, path: &str, fallback: bool) -> bool {
        match self.value_or(path, Value::Bool(fallback)).as_bool() {
            Some(b) => b,
            None => {
                self.record_error(path, "Expected boolean");
                fallback
            }
        }
    }

    pub fn prev_module(&self) -> Option<&ModuleState> {
        self.prev.last()
    }

    pub fn prev_modules(&self) -> &[ModuleState] {
        self.prev
    }

    /// Closest earlier header with the given id.
    pub fn find_prev(&self, id: &str) -> Option<&ModuleState> {
        self.prev.iter().rev().find(|m| m.id == id)
    }

    /// Headers after this one. Empty until the post-handler phase.
    pub fn following_modules(&self) -> &[ModuleState] {
        self.next
    }

    /// Length of this header plus every header after it.
    pub fn length_with_following(&self) -> usize {
        self.length() + self.next.iter().map(ModuleState::length).sum::<usize>()
    }

    /// Defer `handler` until the whole pass is done.
    pub fn add_post_packet_handler<F>(&mut self, priority: i64, handler: F)
    where
        F: FnOnce(&mut Header<'_>) -> Result<(), CodecError> + 'static,
    {
        let idx = self.index();
        if self.data.post_handlers.len() <= idx {
            self.data.post_handlers.resize_with(idx + 1, Vec::new);
        }
        self.data.post_handlers[idx].push(PostHandlerItem::new(priority, handler));
    }

    /// Defer `handler` until this header's own fields are done.
    pub fn add_post_self_handler<F>(&mut self, priority: i64, handler: F)
    where
        F: FnOnce(&mut Header<'_>) -> Result<(), CodecError> + 'static,
    {
        self.self_handlers.push(PostHandlerItem::new(priority, handler));
    }

    /// Run and clear the self handlers. Codecs that override `decode` or `encode` call this last.
    pub fn run_self_handlers(&mut self) {
        let mut handlers = std::mem::take(&mut self.self_handlers);
        sort_by_priority(&mut handlers);
        for item in handlers {
            if let Err(e) = (item.handler)(self) {
                self.record_error("", e.to_string());
            }
        }
    }
}
