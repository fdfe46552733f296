//! Wire format helpers.
//!
//! A document is a `serde_json::Value` tree. Identity-bearing nodes are
//! records that may carry the reserved fields below; every other key is a
//! user field.
//!
//! ## File Versions
//!
//! | Version | Top level | `__id__` fields | Resolution |
//! |---------|-----------|-----------------|------------|
//! | 1 | bare list | only where a pointer refers to them | recursive from the root |
//! | 2 | `{ "tp_version": 2, "data": ... }` | on every container | flat over every built node |

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};

use crate::error::CodecError;

/// Address of a fully written container.
pub const ID_KEY: &str = "__id__";
/// Logical class name.
pub const CLASS_KEY: &str = "__class__";
/// Elements of an identity-bearing list.
pub const ARRAY_KEY: &str = "__array__";
/// Back-reference to an address.
pub const POINTER_KEY: &str = "__pointer__";
/// Envelope version tag.
pub const VERSION_KEY: &str = "tp_version";
/// Envelope payload.
pub const DATA_KEY: &str = "data";

/// Decimal places kept for numeric literals.
pub const NUMBER_PRECISION: i32 = 3;

/// Whether a record key is reserved by the wire format.
pub fn is_reserved(key: &str) -> bool {
    matches!(key, ID_KEY | CLASS_KEY | ARRAY_KEY | POINTER_KEY)
}

/// Output format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FormatVersion {
    /// Bare list, unreferenced ids elided.
    V1,
    /// Enveloped, all ids retained.
    #[default]
    V2,
}

impl FormatVersion {
    /// Numeric version tag.
    pub fn number(&self) -> u64 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Round to [`NUMBER_PRECISION`] decimal places.
///
/// Values too large to scale are returned unchanged.
pub fn round_number(n: f64) -> f64 {
    let factor = 10f64.powi(NUMBER_PRECISION);
    let scaled = n * factor;
    if !scaled.is_finite() {
        return n;
    }
    scaled.round() / factor
}

/// Encode a numeric literal. Integral results become JSON integers and
/// non-finite values become `null`.
pub fn number_node(n: f64) -> Json {
    if !n.is_finite() {
        return Json::Null;
    }
    let rounded = round_number(n);
    // 2^53: the largest range where every integer is exact.
    if rounded.fract() == 0.0 && rounded.abs() < 9_007_199_254_740_992.0 {
        return Json::from(rounded as i64);
    }
    Number::from_f64(rounded).map(Json::Number).unwrap_or(Json::Null)
}

/// Build a pointer node.
pub fn pointer_node(addr: usize, class: Option<&str>) -> Json {
    let mut node = Map::new();
    node.insert(POINTER_KEY.to_string(), Json::from(addr));
    if let Some(class) = class {
        node.insert(CLASS_KEY.to_string(), Json::from(class));
    }
    Json::Object(node)
}

/// Read a reserved address field (`__id__` or `__pointer__`).
pub fn read_address(node: &Json, key: &str) -> Result<usize, CodecError> {
    node.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CodecError::invalid(format!("{key} must be a non-negative integer, got {node}")))
}

/// Wrap encoded root data for the given format.
pub fn wrap(format: FormatVersion, data: Json) -> Json {
    match format {
        FormatVersion::V1 => data,
        FormatVersion::V2 => {
            let mut envelope = Map::new();
            envelope.insert(VERSION_KEY.to_string(), Json::from(format.number()));
            envelope.insert(DATA_KEY.to_string(), data);
            Json::Object(envelope)
        }
    }
}

/// Split a document into its version and payload.
///
/// Untagged documents are version 1. Numeric tags are floored, so `2.5`
/// reads as version 2. A non-numeric tag logs a warning and falls back to
/// version 1.
pub fn split_envelope(doc: &Json) -> Result<(u64, &Json), CodecError> {
    let Some(map) = doc.as_object() else {
        return Ok((1, doc));
    };
    let Some(tag) = map.get(VERSION_KEY) else {
        return Ok((1, doc));
    };

    let version = match tag.as_f64() {
        Some(v) => v.max(0.0).floor() as u64,
        None => {
            tracing::warn!(tag = %tag, "invalid document version, reverting to 1");
            1
        }
    };

    let data = map
        .get(DATA_KEY)
        .ok_or_else(|| CodecError::invalid("envelope has no data member"))?;

    Ok((version, data))
}

/// Short description of a document node for trail rendering:
/// `(kind, address, is_pointer)`.
pub fn describe_node(node: &Json) -> (String, Option<usize>, bool) {
    match node {
        Json::Null => ("null".to_string(), None, false),
        Json::Array(_) => ("Array".to_string(), None, false),
        Json::Object(map) => {
            let kind = match map.get(CLASS_KEY).and_then(Json::as_str) {
                Some(class) => class.to_string(),
                None if map.contains_key(ARRAY_KEY) => "Array".to_string(),
                None if map.contains_key(POINTER_KEY) => "?".to_string(),
                None => "Object".to_string(),
            };
            if let Some(addr) = map.get(POINTER_KEY).and_then(Json::as_u64) {
                return (kind, Some(addr as usize), true);
            }
            let addr = map.get(ID_KEY).and_then(Json::as_u64).map(|a| a as usize);
            (kind, addr, false)
        }
        _ => ("literal".to_string(), None, false),
    }
}

/// Drop `__id__` fields nobody points at (version 1 output).
pub fn strip_unreferenced_ids(node: &mut Json, referenced: &BTreeSet<usize>) {
    match node {
        Json::Object(map) => {
            let unused = map
                .get(ID_KEY)
                .and_then(Json::as_u64)
                .is_some_and(|addr| !referenced.contains(&(addr as usize)));
            if unused {
                map.remove(ID_KEY);
            }
            for child in map.values_mut() {
                strip_unreferenced_ids(child, referenced);
            }
        }
        Json::Array(items) => {
            for child in items {
                strip_unreferenced_ids(child, referenced);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_number() {
        assert_eq!(round_number(1.0 / 3.0), 0.333);
        assert_eq!(round_number(2.0 / 3.0), 0.667);
        assert_eq!(round_number(-1.23456), -1.235);
        assert_eq!(round_number(f64::MAX), f64::MAX);
    }

    #[test]
    fn test_number_node() {
        assert_eq!(number_node(2.0), json!(2));
        assert_eq!(number_node(1.0 / 3.0), json!(0.333));
        assert_eq!(number_node(0.0004), json!(0));
        assert_eq!(number_node(f64::NAN), Json::Null);
        assert_eq!(number_node(f64::INFINITY), Json::Null);
    }

    #[test]
    fn test_split_envelope() {
        let bare = json!([1, 2]);
        let (version, data) = split_envelope(&bare).unwrap();
        assert_eq!(version, 1);
        assert_eq!(data, &bare);

        let wrapped = wrap(FormatVersion::V2, json!([1]));
        let (version, data) = split_envelope(&wrapped).unwrap();
        assert_eq!(version, 2);
        assert_eq!(data, &json!([1]));

        for (tag, expected) in [(json!(2.0), 2), (json!(2.5), 2), (json!(1.5), 1), (json!(-3), 0)] {
            let doc = json!({ "tp_version": tag, "data": [] });
            assert_eq!(split_envelope(&doc).unwrap().0, expected);
        }

        let bad_tag = json!({ "tp_version": "two", "data": [] });
        assert_eq!(split_envelope(&bad_tag).unwrap().0, 1);

        let no_data = json!({ "tp_version": 2 });
        assert!(matches!(split_envelope(&no_data), Err(CodecError::InvalidDocument(_))));
    }

    #[test]
    fn test_read_address() {
        assert_eq!(read_address(&json!(4), ID_KEY).unwrap(), 4);
        assert!(read_address(&json!(-1), ID_KEY).is_err());
        assert!(read_address(&json!("4"), POINTER_KEY).is_err());
    }

    #[test]
    fn test_strip_unreferenced_ids() {
        let mut doc = json!([
            { "__id__": 0, "next": { "__pointer__": 1 } },
            { "__id__": 1, "items": { "__id__": 2, "__array__": [] } }
        ]);
        let referenced: BTreeSet<usize> = [1].into_iter().collect();
        strip_unreferenced_ids(&mut doc, &referenced);

        assert_eq!(
            doc,
            json!([
                { "next": { "__pointer__": 1 } },
                { "__id__": 1, "items": { "__array__": [] } }
            ])
        );
    }

    #[test]
    fn test_describe_node() {
        assert_eq!(describe_node(&json!({ "__pointer__": 3 })), ("?".to_string(), Some(3), true));
        assert_eq!(
            describe_node(&json!({ "__id__": 1, "__class__": "A" })),
            ("A".to_string(), Some(1), false)
        );
        assert_eq!(describe_node(&json!(5)).0, "literal");
    }
}
