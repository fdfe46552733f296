//! Identity registry for the encoder.
//!
//! Addresses are handed out in first-visit order and never reassigned. All
//! bookkeeping lives in a side table keyed by [`Identity`]; nothing is ever
//! written onto the source objects. The registry holds a clone of every
//! registered handle, which keeps allocations (and so identities) stable for
//! the whole pass, and releases them when it is finalized or dropped.

use std::collections::{BTreeSet, HashMap};

use crate::error::CodecError;
use crate::types::{Identity, Value};

#[derive(Debug)]
struct Slot {
    value: Value,
    written: bool,
}

/// Per-pass address assignment.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    /// Registered values, indexed by address.
    slots: Vec<Slot>,
    /// Identity -> address.
    index: HashMap<Identity, usize>,
    /// Addresses a pointer was emitted for.
    referenced: BTreeSet<usize>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value.
    ///
    /// Returns `true` if a new address was assigned. Literals are ignored.
    /// A value that is already registered is checked against its slot.
    pub fn register(&mut self, value: &Value, prewritten: bool) -> Result<bool, CodecError> {
        let Some(identity) = value.identity() else {
            return Ok(false);
        };

        if let Some(&addr) = self.index.get(&identity) {
            let occupant = self.slots.get(addr).and_then(|slot| slot.value.identity());
            if occupant != Some(identity) {
                tracing::error!(addr, %identity, "address collision");
                return Err(CodecError::AddressCollision {
                    addr,
                    detail: format!("slot holds {:?}, registering {:?}", occupant, identity),
                });
            }
            return Ok(false);
        }

        let addr = self.slots.len();
        self.slots.push(Slot {
            value: value.clone(),
            written: prewritten,
        });
        self.index.insert(identity, addr);
        Ok(true)
    }

    /// Address of a registered value.
    pub fn address_of(&self, value: &Value) -> Option<usize> {
        value.identity().and_then(|id| self.index.get(&id).copied())
    }

    /// Whether the value has an address and its content was already emitted.
    pub fn should_reference(&self, value: &Value) -> bool {
        self.address_of(value)
            .and_then(|addr| self.slots.get(addr))
            .is_some_and(|slot| slot.written)
    }

    /// Flag a registered value as fully written.
    pub fn mark_written(&mut self, value: &Value) {
        if let Some(addr) = self.address_of(value) {
            if let Some(slot) = self.slots.get_mut(addr) {
                slot.written = true;
            }
        }
    }

    /// Record that a pointer to `addr` was emitted.
    pub fn mark_referenced(&mut self, addr: usize) {
        self.referenced.insert(addr);
    }

    /// Whether a pointer to `addr` was emitted.
    pub fn is_referenced(&self, addr: usize) -> bool {
        self.referenced.contains(&addr)
    }

    /// All referenced addresses.
    pub fn referenced(&self) -> &BTreeSet<usize> {
        &self.referenced
    }

    /// Number of assigned addresses.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no address was assigned.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Release every handle and forget all bookkeeping. Idempotent.
    pub fn finalize(&mut self) {
        if self.slots.is_empty() && self.index.is_empty() {
            return;
        }
        tracing::trace!(
            addresses = self.slots.len(),
            referenced = self.referenced.len(),
            "releasing identity registry"
        );
        self.slots.clear();
        self.index.clear();
        self.referenced.clear();
    }
}

impl Drop for IdentityRegistry {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_addresses_in_first_visit_order() {
        let mut registry = IdentityRegistry::new();
        let a = Value::list([]);
        let b = Value::record([("x", Value::from(1))]);

        assert!(registry.register(&a, false).unwrap());
        assert!(registry.register(&b, false).unwrap());
        assert!(!registry.register(&a, false).unwrap());
        assert!(!registry.register(&Value::from(3), false).unwrap());

        assert_eq!(registry.address_of(&a), Some(0));
        assert_eq!(registry.address_of(&b), Some(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reserved_is_not_written() {
        let mut registry = IdentityRegistry::new();
        let a = Value::list([]);
        let b = Value::list([]);

        registry.register(&a, false).unwrap();
        registry.register(&b, true).unwrap();

        assert!(!registry.should_reference(&a));
        assert!(registry.should_reference(&b));

        registry.mark_written(&a);
        assert!(registry.should_reference(&a));
        assert!(!registry.should_reference(&Value::list([])));
    }

    #[test]
    fn test_collision_is_detected() {
        let mut registry = IdentityRegistry::new();
        let a = Value::list([]);
        let b = Value::list([]);
        registry.register(&a, false).unwrap();
        registry.register(&b, false).unwrap();

        // Corrupt the side table so `b` claims `a`'s slot.
        registry.index.insert(b.identity().unwrap(), 0);

        let err = registry.register(&b, false).unwrap_err();
        assert!(matches!(err, CodecError::AddressCollision { addr: 0, .. }));
    }

    #[test]
    fn test_referenced_tracking() {
        let mut registry = IdentityRegistry::new();
        registry.mark_referenced(3);
        assert!(registry.is_referenced(3));
        assert!(!registry.is_referenced(2));
    }

    #[test]
    fn test_finalize_releases_handles() {
        let list = Value::list([]);
        let rc = Rc::clone(list.as_list().unwrap());
        {
            let mut registry = IdentityRegistry::new();
            registry.register(&list, true).unwrap();
            assert_eq!(Rc::strong_count(&rc), 3);
        }
        assert_eq!(Rc::strong_count(&rc), 2);

        let mut registry = IdentityRegistry::new();
        registry.register(&list, true).unwrap();
        registry.finalize();
        registry.finalize();
        assert!(registry.is_empty());
        assert_eq!(Rc::strong_count(&rc), 2);
    }
}
