//! Core types for the codec.

pub mod value;
pub mod document;
pub mod trail;

pub use value::{
    AsAny, Conversion, GraphObject, Identity, ListRef, ObjectRef, Record, RecordRef, Value,
};
pub use document::FormatVersion;
pub use trail::{FieldKey, Trail, TrailEntry};
