//! Decode phase 2: replace placeholders with the objects they name.
//!
//! ## Modes
//!
//! - [`ResolveMode::Recursive`] walks the shape from the root. Before entering
//!   a container it checks whether that container is already on the trail:
//!   the immediate parent is skipped, any other ancestor is a structural
//!   loop and fails the decode. Pointer targets are linked but not entered,
//!   since every target is inlined somewhere else in the tree.
//! - [`ResolveMode::Flat`] links every container the shape builder created,
//!   one level deep, then runs the post-link hooks in build order. Structures
//!   a factory creates on its own are never walked.

use std::collections::HashMap;

use super::shape::ShapeGraph;
use super::DecodeOptions;
use crate::error::CodecError;
use crate::registry::AddressTable;
use crate::types::{FieldKey, Identity, Trail, TrailEntry, Value};

/// How placeholders are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Walk from the root with loop detection (format version 1).
    Recursive,
    /// Shallow pass over every built container (format version 2).
    Flat,
}

impl ResolveMode {
    /// Mode used for a document version.
    pub fn for_version(version: u64) -> Self {
        if version >= 2 {
            Self::Flat
        } else {
            Self::Recursive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Resolving,
    Resolved,
}

/// Resolve every placeholder in `graph`, in place.
///
/// `options.max_depth` bounds the recursive walk the same way it bounds the
/// shape builder.
pub fn resolve_pointers(
    graph: &mut ShapeGraph,
    mode: ResolveMode,
    options: &DecodeOptions,
) -> Result<(), CodecError> {
    let mut resolver = Resolver {
        addresses: &graph.addresses,
        max_depth: options.max_depth,
        trail: Trail::new(),
        states: HashMap::new(),
    };

    let root = resolver.link(graph.root.clone());
    match mode {
        ResolveMode::Recursive => {
            let entry = TrailEntry::new(FieldKey::Root, root.kind())
                .with_addr(resolver.addresses.address_of(&root))
                .with_identity(root.identity());
            resolver.trail.push(entry);
            resolver.resolve_node(&root)?;
            resolver.trail.pop();
        }
        ResolveMode::Flat => {
            for value in &graph.built {
                resolver.link_fields(value);
            }
            for value in &graph.built {
                if let Value::Object(object) = value {
                    object.borrow_mut().on_linked();
                }
            }
        }
    }

    tracing::debug!(?mode, containers = graph.built.len(), "pointers resolved");
    graph.root = root;
    Ok(())
}

struct Resolver<'g> {
    addresses: &'g AddressTable,
    max_depth: usize,
    trail: Trail,
    states: HashMap<Identity, State>,
}

impl Resolver<'_> {
    /// Replace a placeholder with its target. Dangling pointers become null.
    fn link(&self, value: Value) -> Value {
        let Value::Pointer(addr) = value else {
            return value;
        };
        match self.addresses.get(addr) {
            Some(target) => target.clone(),
            None => {
                tracing::warn!(addr, trail = %self.trail, "dangling pointer; field set to null");
                Value::Null
            }
        }
    }

    /// Link the direct children of one container. Returns the children that
    /// were not placeholders, with their keys.
    fn link_fields(&self, value: &Value) -> Vec<(FieldKey, Value)> {
        let mut inline = Vec::new();
        match value {
            Value::List(list) => {
                let mut items = list.borrow_mut();
                for (i, item) in items.iter_mut().enumerate() {
                    if item.as_pointer().is_some() {
                        *item = self.link(std::mem::take(item));
                    } else {
                        inline.push((FieldKey::Index(i), item.clone()));
                    }
                }
            }
            Value::Record(record) => {
                let mut record = record.borrow_mut();
                for (name, field) in record.iter_mut() {
                    if field.as_pointer().is_some() {
                        *field = self.link(std::mem::take(field));
                    } else {
                        inline.push((FieldKey::Name(name.clone()), field.clone()));
                    }
                }
            }
            Value::Object(object) => {
                let fields = object.borrow().fields();
                for (name, field) in fields {
                    if field.as_pointer().is_some() {
                        let target = self.link(field);
                        object.borrow_mut().set_field(&name, target);
                    } else {
                        inline.push((FieldKey::Name(name), field));
                    }
                }
            }
            _ => {}
        }
        inline
    }

    fn resolve_node(&mut self, value: &Value) -> Result<(), CodecError> {
        let Some(identity) = value.identity() else {
            return Ok(());
        };
        if self.states.get(&identity) == Some(&State::Resolved) {
            return Ok(());
        }
        self.states.insert(identity, State::Resolving);

        tracing::trace!(step = %self.trail.render_step(), "resolve");

        for (key, child) in self.link_fields(value) {
            self.visit(key, &child)?;
        }
        if let Value::Object(object) = value {
            object.borrow_mut().on_linked();
        }

        self.states.insert(identity, State::Resolved);
        Ok(())
    }

    fn visit(&mut self, key: FieldKey, child: &Value) -> Result<(), CodecError> {
        let Some(identity) = child.identity() else {
            return Ok(());
        };

        let entry = TrailEntry::new(key, child.kind())
            .with_addr(self.addresses.address_of(child))
            .with_identity(Some(identity));

        if let Some(position) = self.trail.position(identity) {
            if position + 1 == self.trail.len() {
                return Ok(());
            }
            self.trail.push(entry);
            let path = self.trail.render_loop(position);
            self.trail.pop();
            tracing::error!(trail = %path, "loop detected");
            return Err(CodecError::LoopDetected(path));
        }

        // Checked before the push: the root entry has no counterpart in the
        // shape builder's trail.
        if self.trail.exceeds(self.max_depth) {
            self.trail.push(entry);
            let trail = self.trail.render();
            self.trail.pop();
            tracing::error!(trail = %trail, "maximum recursion depth exceeded");
            return Err(CodecError::DepthExceeded {
                max_depth: self.max_depth,
                trail,
            });
        }

        self.trail.push(entry);
        let result = self.resolve_node(child);
        self.trail.pop();
        result
    }
}
