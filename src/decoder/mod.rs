//! Document-to-graph decoder.
//!
//! Decoding runs in two phases:
//!
//! 1. [`build_shapes`]: instantiate every node, leaving pointers as
//!    [`Value::Pointer`] placeholders
//! 2. [`resolve_pointers`]: replace the placeholders, in the mode the
//!    document's format version calls for
//!
//! Splitting the phases is what lets cycles load: an object can be pointed
//! at before every object that points at it has been built.

pub mod resolve;
pub mod shape;

pub use resolve::{resolve_pointers, ResolveMode};
pub use shape::{build_shapes, ShapeGraph};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::CodecError;
use crate::registry::ClassRegistry;
use crate::types::document;
use crate::types::Value;
use crate::DEFAULT_MAX_DEPTH;

/// Options for one decode call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Maximum trail length before the pass fails.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Decode a document (enveloped or bare) into a linked graph.
pub fn decode(doc: &Json, classes: &ClassRegistry, options: &DecodeOptions) -> Result<Value, CodecError> {
    let (version, data) = document::split_envelope(doc)?;
    let mode = ResolveMode::for_version(version);

    let mut graph = build_shapes(data, classes, options)?;
    resolve_pointers(&mut graph, mode, options)?;

    tracing::debug!(version, ?mode, addresses = graph.addresses.len(), "decode finished");
    Ok(graph.root)
}

/// Decode a document whose payload is a root list.
pub fn decode_list(
    doc: &Json,
    classes: &ClassRegistry,
    options: &DecodeOptions,
) -> Result<Vec<Value>, CodecError> {
    let root = decode(doc, classes, options)?;
    let Some(list) = root.as_list() else {
        return Err(CodecError::invalid(format!("expected a root list, got {}", root.kind())));
    };
    let items = list.borrow().clone();
    Ok(items)
}

/// Parse and decode a JSON string.
pub fn decode_str(text: &str, classes: &ClassRegistry, options: &DecodeOptions) -> Result<Value, CodecError> {
    let doc: Json = serde_json::from_str(text)?;
    decode(&doc, classes, options)
}
