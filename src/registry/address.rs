//! Address table for the decoder.

use std::collections::{BTreeMap, HashMap};

use crate::error::CodecError;
use crate::types::{Identity, Value};

/// Objects built during decoding, by the address in their `__id__`.
///
/// Addresses come from the document and may be sparse.
#[derive(Debug, Default)]
pub struct AddressTable {
    slots: BTreeMap<usize, Value>,
    reverse: HashMap<Identity, usize>,
}

impl AddressTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a built object at `addr`. An occupied address is a collision.
    pub fn insert(&mut self, addr: usize, value: Value) -> Result<(), CodecError> {
        if let Some(existing) = self.slots.get(&addr) {
            return Err(CodecError::AddressCollision {
                addr,
                detail: format!("{}, {}", existing.kind(), value.kind()),
            });
        }
        if let Some(identity) = value.identity() {
            self.reverse.insert(identity, addr);
        }
        self.slots.insert(addr, value);
        Ok(())
    }

    /// Object at `addr`.
    pub fn get(&self, addr: usize) -> Option<&Value> {
        self.slots.get(&addr)
    }

    /// Address an object was stored under.
    pub fn address_of(&self, value: &Value) -> Option<usize> {
        value.identity().and_then(|id| self.reverse.get(&id).copied())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries in address order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.slots.iter().map(|(addr, value)| (*addr, value))
    }
}
