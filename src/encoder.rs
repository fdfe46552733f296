//! Graph-to-document encoder.
//!
//! ## Algorithm
//!
//! 1. Pre-register every root as fully written, so roots get the first
//!    addresses and every other reference to a root becomes a pointer
//! 2. Encode each root with the pointer check disabled for its first
//!    occurrence; a root listed again becomes a pointer
//! 3. For every other container:
//!    - Already fully written → `{ "__pointer__": addr }`
//!    - Otherwise register it, emit `__id__` (and `__class__` for objects),
//!      mark it written and recurse into its fields
//! 4. Round numbers to three decimals
//!
//! Any error aborts the pass. The identity registry is owned by the pass and
//! released on every exit path.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::CodecError;
use crate::registry::{ClassRegistry, IdentityRegistry};
use crate::types::document::{self, ARRAY_KEY, CLASS_KEY, ID_KEY};
use crate::types::{
    Conversion, FieldKey, FormatVersion, GraphObject, Identity, ObjectRef, Trail, TrailEntry, Value,
};
use crate::DEFAULT_MAX_DEPTH;

/// How pruned entries of a list are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PruneMode {
    /// Replace with `null`, keeping indices aligned.
    #[default]
    Null,
    /// Remove from the list.
    Splice,
}

/// Options for one encode call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Maximum trail length before the pass fails.
    pub max_depth: usize,
    /// Output format.
    pub format: FormatVersion,
    /// Logical ids allowed in the output (`None` keeps everything).
    pub allowed_ids: Option<BTreeSet<i64>>,
    /// How pruned list entries are written.
    pub prune_mode: PruneMode,
    /// Whether pointer nodes also carry `__class__`.
    pub write_pointer_class: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            format: FormatVersion::default(),
            allowed_ids: None,
            prune_mode: PruneMode::default(),
            write_pointer_class: false,
        }
    }
}

impl EncodeOptions {
    /// Version 1 output: bare list, unreferenced ids dropped.
    pub fn v1() -> Self {
        Self {
            format: FormatVersion::V1,
            ..Self::default()
        }
    }

    /// Keep only objects whose logical id is in `ids`.
    pub fn with_allowed_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.allowed_ids = Some(ids.into_iter().collect());
        self
    }

    /// Set the prune mode.
    pub fn with_prune_mode(mut self, mode: PruneMode) -> Self {
        self.prune_mode = mode;
        self
    }

    /// Set the depth ceiling.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Encode a list of root objects into a document.
pub fn encode(
    objects: &[Value],
    classes: &ClassRegistry,
    options: &EncodeOptions,
) -> Result<Json, CodecError> {
    let mut pass = EncodePass::new(classes, options);
    let data = pass.encode_roots(objects)?;
    Ok(pass.finish(Json::Array(data)))
}

/// Encode a single root object. The payload is the node itself, not a list.
pub fn encode_single(
    object: &Value,
    classes: &ClassRegistry,
    options: &EncodeOptions,
) -> Result<Json, CodecError> {
    let mut pass = EncodePass::new(classes, options);
    let data = pass.encode_roots(std::slice::from_ref(object))?;
    let node = data.into_iter().next().unwrap_or(Json::Null);
    Ok(pass.finish(node))
}

/// Encode and serialize to a JSON string.
pub fn encode_to_string(
    objects: &[Value],
    classes: &ClassRegistry,
    options: &EncodeOptions,
) -> Result<String, CodecError> {
    let doc = encode(objects, classes, options)?;
    Ok(serde_json::to_string(&doc)?)
}

/// State of one encode call.
pub struct EncodePass<'r> {
    classes: &'r ClassRegistry,
    options: &'r EncodeOptions,
    identities: IdentityRegistry,
    trail: Trail,
    errors: Vec<String>,
}

impl<'r> EncodePass<'r> {
    /// Start a pass.
    pub fn new(classes: &'r ClassRegistry, options: &'r EncodeOptions) -> Self {
        Self {
            classes,
            options,
            identities: IdentityRegistry::new(),
            trail: Trail::new(),
            errors: Vec::new(),
        }
    }

    /// Encode the root list. Rejected roots are left out of the output.
    pub fn encode_roots(&mut self, objects: &[Value]) -> Result<Vec<Json>, CodecError> {
        let result = self.encode_roots_inner(objects);
        if result.is_err() {
            for error in &self.errors {
                tracing::error!(error = %error, "encode aborted");
            }
        }
        result
    }

    fn encode_roots_inner(&mut self, objects: &[Value]) -> Result<Vec<Json>, CodecError> {
        for object in objects {
            if let Value::Object(obj) = object {
                self.class_name(obj)?;
            }
            self.identities.register(object, true)?;
        }

        // Only the first occurrence of a root is inlined; repeats are pointers.
        let mut inlined: HashSet<Identity> = HashSet::new();
        let mut output = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            if self.rejects(object) {
                continue;
            }
            let toplevel = object.identity().map_or(true, |id| inlined.insert(id));
            let node = self.descend(FieldKey::Index(i), object, |pass| pass.encode_value(object, toplevel))?;
            output.push(node);
        }
        Ok(output)
    }

    /// Wrap the payload for the configured format and release the registry.
    pub fn finish(mut self, mut data: Json) -> Json {
        if self.options.format == FormatVersion::V1 {
            document::strip_unreferenced_ids(&mut data, self.identities.referenced());
        }
        tracing::debug!(
            addresses = self.identities.len(),
            pointers = self.identities.referenced().len(),
            format = %self.options.format,
            "encode finished"
        );
        self.identities.finalize();
        document::wrap(self.options.format, data)
    }

    /// Current trail depth.
    pub fn depth(&self) -> usize {
        self.trail.len()
    }

    fn descend<T>(
        &mut self,
        key: FieldKey,
        value: &Value,
        f: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        let entry = TrailEntry::new(key, self.describe(value))
            .with_addr(self.identities.address_of(value))
            .with_identity(value.identity());
        self.trail.push(entry);
        let result = f(self);
        self.trail.pop();
        result
    }

    fn describe(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => "literal".to_string(),
            Value::Object(obj) => {
                let obj = obj.borrow();
                self.classes
                    .name_of(&*obj)
                    .unwrap_or_else(|| (*obj).type_name())
                    .to_string()
            }
            other => other.kind().to_string(),
        }
    }

    fn encode_value(&mut self, value: &Value, toplevel: bool) -> Result<Json, CodecError> {
        if self.trail.exceeds(self.options.max_depth) {
            let trail = self.trail.render();
            tracing::error!(trail = %trail, "maximum recursion depth exceeded");
            return Err(CodecError::DepthExceeded {
                max_depth: self.options.max_depth,
                trail,
            });
        }

        tracing::trace!(step = %self.trail.render_step(), "encode");

        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Number(n) => Ok(document::number_node(*n)),
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::Pointer(addr) => Err(CodecError::UnresolvedPointer(*addr)),
            _ if !toplevel && self.identities.should_reference(value) => self.pointer_to(value),
            _ => self.encode_container(value),
        }
    }

    fn pointer_to(&mut self, value: &Value) -> Result<Json, CodecError> {
        let addr = self
            .identities
            .address_of(value)
            .ok_or_else(|| CodecError::invalid("pointer to unregistered object"))?;
        self.identities.mark_referenced(addr);
        self.trail.set_last_addr(Some(addr));

        let class = match value {
            Value::Object(obj) if self.options.write_pointer_class => Some(self.class_name(obj)?),
            _ => None,
        };
        Ok(document::pointer_node(addr, class.as_deref()))
    }

    fn encode_container(&mut self, value: &Value) -> Result<Json, CodecError> {
        let class = match value {
            Value::Object(obj) => Some(self.class_name(obj)?),
            _ => None,
        };

        self.identities.register(value, false)?;
        let addr = self.identities.address_of(value);
        self.trail.set_last_addr(addr);
        self.identities.mark_written(value);

        let mut flat = Map::new();
        if let Some(addr) = addr {
            flat.insert(ID_KEY.to_string(), Json::from(addr));
        }
        if let Some(class) = &class {
            flat.insert(CLASS_KEY.to_string(), Json::from(class.as_str()));
        }

        match value {
            Value::List(list) => {
                let items = list.borrow();
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    if self.rejects(item) {
                        if self.options.prune_mode == PruneMode::Null {
                            out.push(Json::Null);
                        }
                        continue;
                    }
                    out.push(self.descend(FieldKey::Index(i), item, |pass| pass.encode_value(item, false))?);
                }
                flat.insert(ARRAY_KEY.to_string(), Json::Array(out));
            }
            Value::Record(record) => {
                for (name, field) in record.borrow().iter() {
                    self.write_field(&mut flat, name, field)?;
                }
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                let class = class.unwrap_or_default();
                let conversion = obj.to_document(&mut FieldWriter { pass: &mut *self })?;
                match conversion {
                    Conversion::Fields => {
                        for (name, field) in obj.fields() {
                            self.write_field(&mut flat, &name, &field)?;
                        }
                    }
                    Conversion::Custom(Some(map)) => {
                        for (name, node) in map {
                            if document::is_reserved(&name) {
                                tracing::warn!(class = %class, field = %name, "conversion output uses a reserved key; skipped");
                                continue;
                            }
                            flat.insert(name, node);
                        }
                    }
                    Conversion::Custom(None) => return Err(CodecError::BadConversion(class)),
                }
            }
            _ => {}
        }

        Ok(Json::Object(flat))
    }

    fn write_field(&mut self, flat: &mut Map<String, Json>, name: &str, field: &Value) -> Result<(), CodecError> {
        if document::is_reserved(name) {
            tracing::warn!(field = %name, trail = %self.trail, "field uses a reserved key; skipped");
            return Ok(());
        }
        let node = if self.rejects(field) {
            Json::Null
        } else {
            self.descend(FieldKey::Name(name.to_string()), field, |pass| pass.encode_value(field, false))?
        };
        flat.insert(name.to_string(), node);
        Ok(())
    }

    /// Class name of an object; unregistered types are fatal.
    fn class_name(&mut self, obj: &ObjectRef) -> Result<String, CodecError> {
        let guard = obj.borrow();
        if let Some(name) = self.classes.name_of(&*guard) {
            return Ok(name.to_string());
        }
        let err = CodecError::MissingConstructor {
            class: (*guard).type_name().to_string(),
            trail: self.trail.render(),
        };
        self.errors.push(err.to_string());
        Err(err)
    }

    /// Whether the allow-list excludes this value.
    fn rejects(&self, value: &Value) -> bool {
        let Some(allowed) = &self.options.allowed_ids else {
            return false;
        };
        let id = match value {
            Value::Object(obj) => obj.borrow().logical_id(),
            Value::Record(record) => record.borrow().get("id").and_then(Value::as_logical_id),
            _ => None,
        };
        id.is_some_and(|id| id >= 0 && !allowed.contains(&id))
    }
}

/// Handed to [`GraphObject::to_document`] to encode child values.
pub struct FieldWriter<'p, 'r> {
    pass: &'p mut EncodePass<'r>,
}

impl FieldWriter<'_, '_> {
    /// Encode one child value under the current trail.
    ///
    /// Values excluded by the allow-list encode as `null`.
    pub fn write(&mut self, name: &str, value: &Value) -> Result<Json, CodecError> {
        if self.pass.rejects(value) {
            return Ok(Json::Null);
        }
        self.pass
            .descend(FieldKey::Name(name.to_string()), value, |pass| pass.encode_value(value, false))
    }

    /// Encode `value` and store it in `map` under `name`.
    pub fn set(&mut self, map: &mut Map<String, Json>, name: &str, value: &Value) -> Result<(), CodecError> {
        let node = self.write(name, value)?;
        map.insert(name.to_string(), node);
        Ok(())
    }

    /// Encode the named fields of `object` into `map`.
    pub fn set_many(
        &mut self,
        map: &mut Map<String, Json>,
        object: &dyn GraphObject,
        names: &[&str],
    ) -> Result<(), CodecError> {
        let fields = object.fields();
        for name in names {
            let Some((_, value)) = fields.iter().find(|(n, _)| n == name) else {
                let class = self
                    .pass
                    .classes
                    .name_of(object)
                    .unwrap_or_else(|| object.type_name())
                    .to_string();
                return Err(CodecError::MissingField {
                    class,
                    field: name.to_string(),
                });
            };
            self.set(map, name, value)?;
        }
        Ok(())
    }

    /// Current trail depth.
    pub fn depth(&self) -> usize {
        self.pass.depth()
    }
}
