//! Canonical serialization of documents for deterministic hashing.
//!
//! ## Determinism Guarantees
//!
//! - Stable key order: document maps are `BTreeMap`-backed, so keys always
//!   serialize sorted
//! - Stable list order: lists serialize in index order
//! - Stable number format: numbers are already rounded by the encoder
//!
//! Encoding the same graph twice therefore yields the same hash.

use serde_json::Value as Json;
use xxhash_rust::xxh64::xxh64;

/// Serialize a document to canonical JSON bytes.
pub fn to_canonical_bytes(doc: &Json) -> Vec<u8> {
    doc.to_string().into_bytes()
}

/// Compute the canonical hash of a document.
pub fn canonical_hash(doc: &Json) -> u64 {
    xxh64(&to_canonical_bytes(doc), 0)
}

/// Compute the canonical hash and return it as a hex string.
pub fn canonical_hash_hex(doc: &Json) -> String {
    format!("{:016x}", canonical_hash(doc))
}
