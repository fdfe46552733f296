//! Decode phase 1: build the graph shape.
//!
//! Every node of the document becomes a fresh value. Pointer nodes become
//! [`Value::Pointer`] placeholders; nothing is linked yet. Containers that
//! carry `__id__` are stored in the address table once their children are
//! built, so an object always sits in the table fully shaped.

use serde_json::{Map, Value as Json};

use super::DecodeOptions;
use crate::error::CodecError;
use crate::registry::{AddressTable, ClassRegistry};
use crate::types::document::{self, ARRAY_KEY, CLASS_KEY, ID_KEY, POINTER_KEY};
use crate::types::{FieldKey, Record, Trail, TrailEntry, Value};

/// Output of phase 1.
#[derive(Debug, Default)]
pub struct ShapeGraph {
    /// Top-level value, possibly still a placeholder.
    pub root: Value,
    /// Containers by the address in their `__id__`.
    pub addresses: AddressTable,
    /// Every container the builder created, children before parents.
    pub built: Vec<Value>,
}

impl ShapeGraph {
    /// Number of placeholders still present in built containers.
    pub fn pending_pointers(&self) -> usize {
        let root = usize::from(self.root.as_pointer().is_some());
        root + self.built.iter().map(count_placeholders).sum::<usize>()
    }
}

fn count_placeholders(value: &Value) -> usize {
    let is_pointer = |v: &Value| v.as_pointer().is_some();
    match value {
        Value::List(list) => list.borrow().iter().filter(|v| is_pointer(v)).count(),
        Value::Record(record) => record.borrow().values().filter(|v| is_pointer(v)).count(),
        Value::Object(object) => object.borrow().fields().iter().filter(|(_, v)| is_pointer(v)).count(),
        _ => 0,
    }
}

/// Build the shape of a document payload.
pub fn build_shapes(
    data: &Json,
    classes: &ClassRegistry,
    options: &DecodeOptions,
) -> Result<ShapeGraph, CodecError> {
    let mut builder = ShapeBuilder {
        classes,
        max_depth: options.max_depth,
        graph: ShapeGraph::default(),
        trail: Trail::new(),
    };
    let root = builder.build(data)?;
    let mut graph = builder.graph;
    graph.root = root;

    tracing::debug!(
        addresses = graph.addresses.len(),
        built = graph.built.len(),
        "shape built"
    );
    Ok(graph)
}

struct ShapeBuilder<'r> {
    classes: &'r ClassRegistry,
    max_depth: usize,
    graph: ShapeGraph,
    trail: Trail,
}

impl ShapeBuilder<'_> {
    fn descend(&mut self, key: FieldKey, node: &Json) -> Result<Value, CodecError> {
        let (kind, addr, pointer) = document::describe_node(node);
        self.trail
            .push(TrailEntry::new(key, kind).with_addr(addr).with_pointer(pointer));
        let result = self.build(node);
        self.trail.pop();
        result
    }

    fn build(&mut self, node: &Json) -> Result<Value, CodecError> {
        if self.trail.exceeds(self.max_depth) {
            let trail = self.trail.render();
            tracing::error!(trail = %trail, "maximum recursion depth exceeded");
            return Err(CodecError::DepthExceeded {
                max_depth: self.max_depth,
                trail,
            });
        }

        tracing::trace!(step = %self.trail.render_step(), "build");

        match node {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => Ok(n.as_f64().map_or(Value::Null, Value::Number)),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => {
                let list = Value::list(self.build_items(items)?);
                self.graph.built.push(list.clone());
                Ok(list)
            }
            Json::Object(map) => self.build_record(map),
        }
    }

    fn build_items(&mut self, items: &[Json]) -> Result<Vec<Value>, CodecError> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.descend(FieldKey::Index(i), item))
            .collect()
    }

    fn build_record(&mut self, map: &Map<String, Json>) -> Result<Value, CodecError> {
        if let Some(addr) = map.get(POINTER_KEY) {
            return Ok(Value::Pointer(document::read_address(addr, POINTER_KEY)?));
        }

        let id = map
            .get(ID_KEY)
            .map(|node| document::read_address(node, ID_KEY))
            .transpose()?;
        let class = match map.get(CLASS_KEY) {
            None => None,
            Some(Json::String(name)) => Some(name.as_str()),
            Some(other) => return Err(CodecError::invalid(format!("{CLASS_KEY} must be a string, got {other}"))),
        };
        let array = map.get(ARRAY_KEY);

        let value = match (class, array) {
            (Some(class), Some(_)) => {
                return Err(CodecError::invalid(format!(
                    "{CLASS_KEY} {class} combined with {ARRAY_KEY} at {}",
                    self.trail
                )));
            }
            (None, Some(Json::Array(items))) => Value::list(self.build_items(items)?),
            (None, Some(other)) => {
                return Err(CodecError::invalid(format!("{ARRAY_KEY} must be a list, got {other}")));
            }
            (Some(class), None) => self.build_object(class, map)?,
            (None, None) => {
                let mut record = Record::new();
                for (name, child) in user_fields(map) {
                    let value = self.descend(FieldKey::Name(name.clone()), child)?;
                    record.insert(name.clone(), value);
                }
                Value::record(record)
            }
        };

        if let Some(addr) = id {
            if let Err(err) = self.graph.addresses.insert(addr, value.clone()) {
                tracing::error!(addr, trail = %self.trail, "address collision");
                return Err(err);
            }
        }
        self.graph.built.push(value.clone());
        Ok(value)
    }

    fn build_object(&mut self, class: &str, map: &Map<String, Json>) -> Result<Value, CodecError> {
        let Some(object) = self.classes.instantiate(class) else {
            return Err(CodecError::UnhandledClass {
                class: class.to_string(),
                trail: self.trail.render(),
            });
        };

        for (name, child) in user_fields(map) {
            let value = self.descend(FieldKey::Name(name.clone()), child)?;
            if !object.borrow_mut().set_field(name, value) {
                tracing::warn!(class, field = %name, "class has no such field; skipped");
            }
        }
        Ok(Value::Object(object))
    }
}

fn user_fields(map: &Map<String, Json>) -> impl Iterator<Item = (&String, &Json)> {
    map.iter().filter(|(name, _)| !document::is_reserved(name))
}
