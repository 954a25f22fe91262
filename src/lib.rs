//! # layercodec: layered binary protocol codec
//!
//! Decodes a raw packet into an ordered chain of protocol headers and encodes such a chain
//! back into bytes. Each header type is a pluggable [`HeaderCodec`]: it says whether the
//! bytes at the current position belong to it (given the headers already decoded) and
//! describes its fields as a list of decode/encode functions over a per-header accessor.
//!
//! ## Pieces
//!
//! - [`Codec`]: the engine. `decode` walks the packet header by header, `encode` walks a
//!   list of `(id, data)` inputs. Non-fatal problems are returned as
//!   [`CodecErrorInfo`] records; nothing panics on malformed input.
//! - [`Header`]: bit and byte access relative to the header start, field tree access,
//!   error recording, lookups of earlier headers, post-handler registration.
//! - [`FieldTree`]: path-addressable field values that remember what was set, so results
//!   contain only fields the header variant actually has.
//! - [`post_handler`]: deferred cross-header work (checksums, lengths) run after the main
//!   pass in a header-aware order.
//! - [`HeaderRegistry`]: the immutable catalogue; the raw-payload catch-all is always last.
//!
//! ## Usage
//!
//! ```
//! use layercodec::{Codec, EncodeInput};
//!
//! let codec = Codec::default();
//! let frame = [
//!     0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x12, 0x34,
//!     0xde, 0xad,
//! ];
//! let headers = codec.decode(&frame).unwrap();
//! assert_eq!(headers[0].id, "eth");
//! assert_eq!(headers[1].id, "raw");
//!
//! let inputs: Vec<EncodeInput> = headers.iter().map(EncodeInput::from).collect();
//! assert_eq!(codec.encode(&inputs).unwrap().packet, frame);
//! ```

pub mod buffer;
pub mod codec;
pub mod config;
pub mod dump;
pub mod field_tree;
pub mod header;
pub mod headers;
pub mod post_handler;
pub mod registry;
pub mod value;

pub use codec::{Codec, CodecError, CodecErrorInfo, DecodeResult, EncodeInput, EncodeResult};
pub use config::CodecConfig;
pub use field_tree::{FieldNode, FieldTree};
pub use header::{FieldDescriptor, FieldKind, Header, HeaderCodec, HeaderSchema, ModuleState, Probe};
pub use post_handler::{Direction, PostHandlerItem};
pub use registry::{CodecSchema, FieldSchema, HeaderRegistry, RegistryBuilder};
pub use value::Value;
