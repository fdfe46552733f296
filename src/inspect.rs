//! Static inspection of encoded documents.
//!
//! Reports what a document contains without instantiating anything, so it
//! works on documents whose classes are not registered.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::CodecError;
use crate::types::document::{self, ARRAY_KEY, CLASS_KEY, ID_KEY, POINTER_KEY};

/// Node counts by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounts {
    /// `null` nodes.
    pub nulls: usize,
    /// Boolean, number and string literals.
    pub literals: usize,
    /// Bare lists and `__array__` records.
    pub lists: usize,
    /// Records without `__class__`.
    pub records: usize,
    /// Records with `__class__`.
    pub objects: usize,
    /// Pointer nodes.
    pub pointers: usize,
}

/// Summary of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Detected format version.
    pub format_version: u64,
    /// Node counts by kind.
    pub nodes: NodeCounts,
    /// Every `__id__` present.
    pub ids: BTreeSet<usize>,
    /// Every address a pointer refers to.
    pub pointer_targets: BTreeSet<usize>,
    /// Pointer targets with no matching `__id__`.
    pub dangling_pointers: BTreeSet<usize>,
    /// Addresses that appear on more than one `__id__`.
    pub duplicate_ids: BTreeSet<usize>,
    /// Deepest nesting level (the payload is level 0).
    pub max_depth: usize,
    /// Instances per class name.
    pub classes: BTreeMap<String, usize>,
}

impl DocumentReport {
    /// Whether the document would decode without collisions or dangling
    /// pointers (class availability aside).
    pub fn is_consistent(&self) -> bool {
        self.dangling_pointers.is_empty() && self.duplicate_ids.is_empty()
    }
}

/// Inspect a document (enveloped or bare).
pub fn inspect_document(doc: &Json) -> Result<DocumentReport, CodecError> {
    let (version, data) = document::split_envelope(doc)?;
    let mut report = DocumentReport {
        format_version: version,
        ..DocumentReport::default()
    };

    visit(data, 0, &mut report);

    report.dangling_pointers = report
        .pointer_targets
        .difference(&report.ids)
        .copied()
        .collect();
    Ok(report)
}

fn visit(node: &Json, depth: usize, report: &mut DocumentReport) {
    report.max_depth = report.max_depth.max(depth);
    match node {
        Json::Null => report.nodes.nulls += 1,
        Json::Bool(_) | Json::Number(_) | Json::String(_) => report.nodes.literals += 1,
        Json::Array(items) => {
            report.nodes.lists += 1;
            for item in items {
                visit(item, depth + 1, report);
            }
        }
        Json::Object(map) => visit_record(map, depth, report),
    }
}

fn visit_record(map: &Map<String, Json>, depth: usize, report: &mut DocumentReport) {
    if let Some(addr) = map.get(POINTER_KEY).and_then(Json::as_u64) {
        report.nodes.pointers += 1;
        report.pointer_targets.insert(addr as usize);
        return;
    }

    if let Some(addr) = map.get(ID_KEY).and_then(Json::as_u64) {
        let addr = addr as usize;
        if !report.ids.insert(addr) {
            report.duplicate_ids.insert(addr);
        }
    }

    if let Some(class) = map.get(CLASS_KEY).and_then(Json::as_str) {
        report.nodes.objects += 1;
        *report.classes.entry(class.to_string()).or_default() += 1;
    } else if map.contains_key(ARRAY_KEY) {
        report.nodes.lists += 1;
    } else {
        report.nodes.records += 1;
    }

    if let Some(Json::Array(items)) = map.get(ARRAY_KEY) {
        for item in items {
            visit(item, depth + 1, report);
        }
    }
    for (name, child) in map {
        if !document::is_reserved(name) {
            visit(child, depth + 1, report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report() {
        let doc = json!({
            "tp_version": 2,
            "data": [
                { "__id__": 0, "__class__": "Hive", "items": { "__id__": 1, "__array__": [
                    { "__id__": 2, "__class__": "Bee", "id": 1 },
                    { "__pointer__": 2 },
                    { "__pointer__": 7 }
                ] } },
                null
            ]
        });

        let report = inspect_document(&doc).unwrap();

        assert_eq!(report.format_version, 2);
        assert_eq!(report.nodes.objects, 2);
        assert_eq!(report.nodes.lists, 2);
        assert_eq!(report.nodes.pointers, 2);
        assert_eq!(report.nodes.nulls, 1);
        assert_eq!(report.nodes.literals, 1);
        assert_eq!(report.ids, [0, 1, 2].into_iter().collect());
        assert_eq!(report.dangling_pointers, [7].into_iter().collect());
        assert_eq!(report.max_depth, 4);
        assert_eq!(report.classes.get("Bee"), Some(&1));
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_duplicate_ids() {
        let report = inspect_document(&json!([{ "__id__": 3 }, { "__id__": 3 }])).unwrap();
        assert_eq!(report.format_version, 1);
        assert_eq!(report.duplicate_ids, [3].into_iter().collect());
        assert!(!report.is_consistent());
    }
}
