//! In-memory graph values.
//!
//! A graph is built from [`Value`] nodes. Literals are plain data; lists,
//! records and objects live behind `Rc<RefCell<..>>` so that several fields
//! can share one node and nodes can point back at their ancestors.
//!
//! ## Identity
//!
//! Two values are "the same object" when they share an `Rc` allocation
//! ([`Value::identity`]), never when they merely compare equal. The encoder
//! uses identity to decide between inlining and emitting a pointer, and the
//! decoder restores the same sharing pattern on load.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value as Json};

use crate::encoder::FieldWriter;
use crate::error::CodecError;

/// Fields of a plain record, in stable key order.
pub type Record = BTreeMap<String, Value>;

/// Shared handle to a class instance.
pub type ObjectRef = Rc<RefCell<dyn GraphObject>>;

/// Shared handle to an ordered container.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared handle to a plain record.
pub type RecordRef = Rc<RefCell<Record>>;

/// Allocation identity of a list, record or object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(usize);

impl Identity {
    fn of<T: ?Sized>(rc: &Rc<T>) -> Self {
        Self(Rc::as_ptr(rc) as *const () as usize)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Upcasting support for [`GraphObject`] implementors.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    /// View as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// View as `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Rust type name, used in diagnostics for unregistered types.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Result of an object's custom conversion hook.
#[derive(Debug, Clone)]
pub enum Conversion {
    /// No custom conversion; walk [`GraphObject::fields`].
    Fields,
    /// Use this map as the object's fields. `None` is a failed conversion.
    Custom(Option<Map<String, Json>>),
}

/// A class whose instances can be written to and rebuilt from a document.
///
/// Fields that may hold shared or cyclic references must be stored as
/// [`Value`]: during decoding they temporarily hold [`Value::Pointer`]
/// placeholders until the pointer resolver replaces them.
pub trait GraphObject: AsAny {
    /// All fields in a deterministic order.
    fn fields(&self) -> Vec<(String, Value)>;

    /// Assign one field. Returns `false` if the class has no such field.
    fn set_field(&mut self, name: &str, value: Value) -> bool;

    /// Custom conversion hook.
    ///
    /// Return [`Conversion::Custom`] with a map built through `writer` to
    /// replace the default field walk. Child values must be encoded through
    /// the writer so that identity tracking stays consistent.
    fn to_document(&self, _writer: &mut FieldWriter<'_, '_>) -> Result<Conversion, CodecError> {
        Ok(Conversion::Fields)
    }

    /// Post-link hook, called once every field has been pointer-resolved.
    fn on_linked(&mut self) {}

    /// Logical id used by allow-list pruning. Defaults to a numeric `id` field.
    fn logical_id(&self) -> Option<i64> {
        self.fields()
            .into_iter()
            .find(|(name, _)| name == "id")
            .and_then(|(_, value)| value.as_logical_id())
    }
}

/// A node of an in-memory object graph.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Numeric literal.
    Number(f64),
    /// String literal.
    String(String),
    /// Ordered container with identity.
    List(ListRef),
    /// Plain record with identity and no class.
    Record(RecordRef),
    /// Class instance.
    Object(ObjectRef),
    /// Unresolved reference to an address. Only seen between the two decode
    /// phases; a completed decode never returns one.
    Pointer(usize),
}

impl Value {
    /// Create a new list.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Create a new record.
    pub fn record<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let record: Record = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::Record(Rc::new(RefCell::new(record)))
    }

    /// Wrap a class instance.
    pub fn object<T: GraphObject>(object: T) -> Self {
        Self::Object(Rc::new(RefCell::new(object)))
    }

    /// Wrap an existing shared class instance, keeping its identity.
    pub fn from_rc<T: GraphObject>(object: Rc<RefCell<T>>) -> Self {
        let object: ObjectRef = object;
        Self::Object(object)
    }

    /// Allocation identity, for lists, records and objects.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::List(list) => Some(Identity::of(list)),
            Self::Record(record) => Some(Identity::of(record)),
            Self::Object(object) => Some(Identity::of(object)),
            _ => None,
        }
    }

    /// Whether both values are the same list, record or object.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Whether this value carries identity.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::List(_) | Self::Record(_) | Self::Object(_))
    }

    /// Check for null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get a boolean literal.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get a numeric literal.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the list handle.
    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Get the record handle.
    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Get the object handle.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Get the address of an unresolved pointer.
    pub fn as_pointer(&self) -> Option<usize> {
        match self {
            Self::Pointer(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Borrow the object as a concrete class.
    pub fn downcast<T: GraphObject>(&self) -> Option<Ref<'_, T>> {
        let object = self.as_object()?;
        Ref::filter_map(object.borrow(), |o| o.as_any().downcast_ref::<T>()).ok()
    }

    /// Mutably borrow the object as a concrete class.
    pub fn downcast_mut<T: GraphObject>(&self) -> Option<RefMut<'_, T>> {
        let object = self.as_object()?;
        RefMut::filter_map(object.borrow_mut(), |o| o.as_any_mut().downcast_mut::<T>()).ok()
    }

    /// Element `index` of a list (cloned handle).
    pub fn item(&self, index: usize) -> Option<Value> {
        self.as_list()?.borrow().get(index).cloned()
    }

    /// Field `name` of a record or object (cloned handle).
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Self::Record(record) => record.borrow().get(name).cloned(),
            Self::Object(object) => object
                .borrow()
                .fields()
                .into_iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Number of elements of a list or fields of a record/object.
    pub fn len(&self) -> usize {
        match self {
            Self::List(list) => list.borrow().len(),
            Self::Record(record) => record.borrow().len(),
            Self::Object(object) => object.borrow().fields().len(),
            _ => 0,
        }
    }

    /// Whether [`Value::len`] is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integral, non-fractional number as a logical id.
    pub fn as_logical_id(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "Array",
            Self::Record(_) => "Object",
            Self::Object(object) => (*object.borrow()).type_name(),
            Self::Pointer(_) => "pointer",
        }
    }
}

// Shallow on purpose: graphs may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::List(list) => {
                write!(f, "List(len={}, @{})", list.borrow().len(), Identity::of(list))
            }
            Self::Record(record) => {
                let keys: Vec<String> = record.borrow().keys().cloned().collect();
                write!(f, "Record({keys:?}, @{})", Identity::of(record))
            }
            Self::Object(object) => {
                write!(f, "Object({}, @{})", self.kind(), Identity::of(object))
            }
            Self::Pointer(addr) => write!(f, "Pointer({addr})"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Marker {
        id: Value,
        tag: Value,
    }

    impl GraphObject for Marker {
        fn fields(&self) -> Vec<(String, Value)> {
            vec![("id".to_string(), self.id.clone()), ("tag".to_string(), self.tag.clone())]
        }

        fn set_field(&mut self, name: &str, value: Value) -> bool {
            match name {
                "id" => self.id = value,
                "tag" => self.tag = value,
                _ => return false,
            }
            true
        }
    }

    #[test]
    fn test_identity_follows_allocation() {
        let a = Value::list([Value::from(1)]);
        let b = a.clone();
        let c = Value::list([Value::from(1)]);

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(Value::from(1).identity().is_none());
    }

    #[test]
    fn test_from_rc_keeps_identity() {
        let rc = Rc::new(RefCell::new(Marker::default()));
        let a = Value::from_rc(rc.clone());
        let b = Value::from_rc(rc);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_downcast_and_logical_id() {
        let v = Value::object(Marker { id: Value::from(7), tag: Value::from("x") });

        assert_eq!(v.downcast::<Marker>().unwrap().tag.as_str(), Some("x"));
        v.downcast_mut::<Marker>().unwrap().id = Value::from(8);
        assert_eq!(v.as_object().unwrap().borrow().logical_id(), Some(8));
        assert_eq!(v.field("tag").and_then(|t| t.as_str().map(str::to_string)), Some("x".to_string()));
    }

    #[test]
    fn test_logical_id_rejects_fractions() {
        assert_eq!(Value::from(2.5).as_logical_id(), None);
        assert_eq!(Value::from(-1).as_logical_id(), Some(-1));
        assert_eq!(Value::from("3").as_logical_id(), None);
    }

    #[test]
    fn test_debug_is_shallow_on_cycles() {
        let list = Value::list([]);
        list.as_list().unwrap().borrow_mut().push(list.clone());
        let text = format!("{list:?}");
        assert!(text.starts_with("List(len=1"));
    }
}
