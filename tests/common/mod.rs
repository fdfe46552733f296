//! Shared fixture classes for the integration tests.

#![allow(dead_code)]

use serde_json::Map;
use toastpoint::{ClassRegistry, CodecError, Conversion, FieldWriter, GraphObject, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Fixture Classes
// ─────────────────────────────────────────────────────────────────────────────

/// Container with a logical id and a list of members.
#[derive(Default)]
pub struct Hive {
    pub id: Value,
    pub items: Value,
}

impl GraphObject for Hive {
    fn fields(&self) -> Vec<(String, Value)> {
        vec![("id".to_string(), self.id.clone()), ("items".to_string(), self.items.clone())]
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match name {
            "id" => self.id = value,
            "items" => self.items = value,
            _ => return false,
        }
        true
    }
}

/// Leaf with a logical id.
#[derive(Default)]
pub struct Bee {
    pub id: Value,
    pub name: Value,
}

impl GraphObject for Bee {
    fn fields(&self) -> Vec<(String, Value)> {
        vec![("id".to_string(), self.id.clone()), ("name".to_string(), self.name.clone())]
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match name {
            "id" => self.id = value,
            "name" => self.name = value,
            _ => return false,
        }
        true
    }
}

/// Two untyped slots, for aliasing and self-reference.
#[derive(Default)]
pub struct Pair {
    pub first: Value,
    pub second: Value,
}

impl GraphObject for Pair {
    fn fields(&self) -> Vec<(String, Value)> {
        vec![("first".to_string(), self.first.clone()), ("second".to_string(), self.second.clone())]
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match name {
            "first" => self.first = value,
            "second" => self.second = value,
            _ => return false,
        }
        true
    }
}

/// Link of a ring built by [`Sensor`]'s constructor.
#[derive(Default)]
pub struct Loop {
    pub next: Value,
}

impl GraphObject for Loop {
    fn fields(&self) -> Vec<(String, Value)> {
        vec![("next".to_string(), self.next.clone())]
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        if name == "next" {
            self.next = value;
            return true;
        }
        false
    }
}

/// Writes only `id` and `reading`; its constructor wires two [`Loop`]s
/// into a ring and `on_linked` marks it ready.
pub struct Sensor {
    pub id: Value,
    pub reading: Value,
    pub left: Value,
    pub right: Value,
    pub ready: bool,
}

impl Default for Sensor {
    fn default() -> Self {
        let left = Value::object(Loop::default());
        let right = Value::object(Loop { next: left.clone() });
        left.downcast_mut::<Loop>().unwrap().next = right.clone();
        Self {
            id: Value::Null,
            reading: Value::Null,
            left,
            right,
            ready: false,
        }
    }
}

impl GraphObject for Sensor {
    fn fields(&self) -> Vec<(String, Value)> {
        vec![
            ("id".to_string(), self.id.clone()),
            ("reading".to_string(), self.reading.clone()),
            ("left".to_string(), self.left.clone()),
            ("right".to_string(), self.right.clone()),
        ]
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match name {
            "id" => self.id = value,
            "reading" => self.reading = value,
            "left" => self.left = value,
            "right" => self.right = value,
            _ => return false,
        }
        true
    }

    fn to_document(&self, writer: &mut FieldWriter<'_, '_>) -> Result<Conversion, CodecError> {
        let mut map = Map::new();
        writer.set_many(&mut map, self, &["id", "reading"])?;
        Ok(Conversion::Custom(Some(map)))
    }

    fn on_linked(&mut self) {
        self.ready = true;
    }
}

/// Holds a chain of [`Loop`]s its constructor builds, deeper than the
/// default ceiling.
pub struct Holder {
    pub head: Value,
}

impl Default for Holder {
    fn default() -> Self {
        let mut head = Value::Null;
        for _ in 0..40 {
            head = Value::object(Loop { next: head });
        }
        Self { head }
    }
}

impl GraphObject for Holder {
    fn fields(&self) -> Vec<(String, Value)> {
        vec![("head".to_string(), self.head.clone())]
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        if name == "head" {
            self.head = value;
            return true;
        }
        false
    }
}

/// Never registered.
#[derive(Default)]
pub struct Stray;

impl GraphObject for Stray {
    fn fields(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    fn set_field(&mut self, _name: &str, _value: Value) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn classes() -> ClassRegistry {
    ClassRegistry::new()
        .with_class::<Hive>("Hive")
        .with_class::<Bee>("Bee")
        .with_class::<Pair>("Pair")
        .with_class::<Loop>("Loop")
        .with_class::<Sensor>("Sensor")
        .with_class::<Holder>("Holder")
}

pub fn bee(id: i64, name: &str) -> Value {
    Value::object(Bee {
        id: Value::from(id),
        name: Value::from(name),
    })
}

pub fn hive(id: i64, items: Vec<Value>) -> Value {
    Value::object(Hive {
        id: Value::from(id),
        items: Value::list(items),
    })
}

pub fn pair(first: Value, second: Value) -> Value {
    Value::object(Pair { first, second })
}

/// `depth` records, each nested in the previous one's `next` field.
pub fn nested_records(depth: usize) -> Value {
    let mut value = Value::from(0);
    for _ in 0..depth {
        value = Value::record([("next", value)]);
    }
    value
}
