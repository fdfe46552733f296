//! Class registry: logical class names, factories and name remapping.
//!
//! Each reconstructable Rust type is registered once under a stable string
//! tag. The encoder looks the tag up by `TypeId`; the decoder builds a fresh
//! default instance from the tag found in `__class__`.
//!
//! ## Name remapping
//!
//! [`ClassRegistry::alias`] maps an alternate name to a canonical one. The
//! mapping is applied in both directions: a type registered under the
//! alternate name is written with the canonical name, and documents that
//! still use the alternate name are read with the canonical factory.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::types::{GraphObject, ObjectRef};

type Factory = Box<dyn Fn() -> ObjectRef>;

/// Mapping between logical class names and Rust types.
#[derive(Default)]
pub struct ClassRegistry {
    /// Class name -> factory.
    factories: BTreeMap<String, Factory>,
    /// Rust type -> class name.
    names: HashMap<TypeId, String>,
    /// Alternate name -> canonical name.
    name_map: BTreeMap<String, String>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`, built with `T::default()`.
    pub fn register<T: GraphObject + Default>(&mut self, name: impl Into<String>) -> &mut Self {
        self.register_with(name, T::default)
    }

    /// Register `T` under `name` with a custom factory.
    pub fn register_with<T, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        T: GraphObject,
        F: Fn() -> T + 'static,
    {
        let name = name.into();
        self.names.insert(TypeId::of::<T>(), name.clone());
        self.factories.insert(
            name,
            Box::new(move || -> ObjectRef { Rc::new(RefCell::new(factory())) }),
        );
        self
    }

    /// Builder form of [`ClassRegistry::register`].
    pub fn with_class<T: GraphObject + Default>(mut self, name: impl Into<String>) -> Self {
        self.register::<T>(name);
        self
    }

    /// Map an alternate class name to a canonical one.
    pub fn alias(&mut self, alternate: impl Into<String>, canonical: impl Into<String>) -> &mut Self {
        self.name_map.insert(alternate.into(), canonical.into());
        self
    }

    /// Whether a class name (or alias) can be instantiated.
    pub fn contains(&self, name: &str) -> bool {
        self.factory(name).is_some()
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no class is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Logical class name of an object, after remapping.
    ///
    /// `None` means the object's type was never registered.
    pub fn name_of(&self, object: &dyn GraphObject) -> Option<&str> {
        let type_id = (*object.as_any()).type_id();
        let name = self.names.get(&type_id)?;
        Some(self.canonical(name))
    }

    /// Build a fresh instance of a class.
    pub fn instantiate(&self, name: &str) -> Option<ObjectRef> {
        self.factory(name).map(|factory| factory())
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.name_map.get(name).map(String::as_str).unwrap_or(name)
    }

    fn factory(&self, name: &str) -> Option<&Factory> {
        self.factories
            .get(name)
            .or_else(|| self.factories.get(self.canonical(name)))
            .or_else(|| {
                // Canonical name of a type registered under an alternate name.
                self.name_map
                    .iter()
                    .find(|(_, canonical)| canonical.as_str() == name)
                    .and_then(|(alternate, _)| self.factories.get(alternate))
            })
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.factories.keys().collect::<Vec<_>>())
            .field("name_map", &self.name_map)
            .finish()
    }
}
