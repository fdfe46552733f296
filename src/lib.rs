//! # toastpoint
//!
//! Object-graph serialization with identity, pointers and cycles.
//!
//! A graph of shared, possibly cyclic objects is written as a tree-shaped
//! JSON document. The first time an object is met it is written in full and
//! tagged with an address (`__id__`); every later reference to it becomes a
//! `{ "__pointer__": addr }` node. Decoding rebuilds the same sharing
//! pattern and the same concrete types.
//!
//! ## Architecture
//!
//! ```text
//! Graph → Encoder ──────────────────────────→ Document
//!            ↓
//!     IdentityRegistry (per call)
//!
//! Document → ShapeBuilder → ShapeGraph → PointerResolver → Graph
//!                ↓                             ↓
//!          ClassRegistry                  AddressTable
//! ```
//!
//! ## Guarantees
//!
//! - Addresses are assigned in first-visit order and never reassigned
//! - Every root of the encoded list is written in full exactly once
//! - Encoding never touches the source objects; all bookkeeping is released
//!   on every exit path
//! - Same graph + same options → identical document (and canonical hash)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod registry;
pub mod encoder;
pub mod decoder;
pub mod compare;
pub mod canonical;
pub mod inspect;

// Re-exports
pub use types::{
    AsAny, Conversion, FieldKey, FormatVersion, GraphObject, Identity, ListRef, ObjectRef,
    Record, RecordRef, Trail, TrailEntry, Value,
};
pub use error::CodecError;
pub use registry::{AddressTable, ClassRegistry, IdentityRegistry};
pub use encoder::{encode, encode_single, encode_to_string, EncodeOptions, EncodePass, FieldWriter, PruneMode};
pub use decoder::{
    build_shapes, decode, decode_list, decode_str, resolve_pointers, DecodeOptions, ResolveMode,
    ShapeGraph,
};
pub use compare::{check_schema, equal_shape};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use inspect::{inspect_document, DocumentReport, NodeCounts};

/// Default ceiling on traversal depth for encode and decode.
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Format version written by default.
pub const CURRENT_FORMAT_VERSION: u64 = 2;
