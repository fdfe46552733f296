//! Structural comparison of two graphs.
//!
//! Used to check round trips: values, classes and the aliasing pattern must
//! all agree. Numbers are compared at document precision, so a graph equals
//! its own decoded copy.

use std::collections::HashMap;

use crate::types::document::round_number;
use crate::types::{FieldKey, Identity, Value};

/// Whether two graphs have the same shape.
///
/// Containers are paired as they are met. A pair that was already compared
/// (or is still on the comparison path) is not compared again, which keeps
/// cyclic graphs finite. A container paired with two different partners
/// means the aliasing differs. The first mismatch is logged at debug level
/// with its path.
pub fn equal_shape(a: &Value, b: &Value) -> bool {
    ShapeComparer::default().compare(a, b)
}

/// Schema check hook. Always passes.
pub fn check_schema(_value: &Value, _schema_name: &str) -> bool {
    true
}

#[derive(Default)]
struct ShapeComparer {
    forward: HashMap<Identity, Identity>,
    backward: HashMap<Identity, Identity>,
    path: Vec<FieldKey>,
}

impl ShapeComparer {
    fn compare(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => self.expect(x == y, || format!("{x} != {y}")),
            (Value::Number(x), Value::Number(y)) => {
                self.expect(round_number(*x) == round_number(*y), || format!("{x} != {y}"))
            }
            (Value::String(x), Value::String(y)) => self.expect(x == y, || format!("{x:?} != {y:?}")),
            (Value::Pointer(x), Value::Pointer(y)) => self.expect(x == y, || format!("pointer {x} != {y}")),
            _ if a.is_container() && b.is_container() => self.compare_containers(a, b),
            _ => self.mismatch(format!("kind {} != {}", a.kind(), b.kind())),
        }
    }

    fn compare_containers(&mut self, a: &Value, b: &Value) -> bool {
        let (Some(ia), Some(ib)) = (a.identity(), b.identity()) else {
            return false;
        };
        match (self.forward.get(&ia), self.backward.get(&ib)) {
            (Some(&paired), Some(&back)) if paired == ib && back == ia => return true,
            (None, None) => {
                self.forward.insert(ia, ib);
                self.backward.insert(ib, ia);
            }
            _ => return self.mismatch("aliasing differs".to_string()),
        }

        match (a, b) {
            (Value::List(x), Value::List(y)) => {
                let x = x.borrow().clone();
                let y = y.borrow().clone();
                if x.len() != y.len() {
                    return self.mismatch(format!("length {} != {}", x.len(), y.len()));
                }
                for (i, (xi, yi)) in x.iter().zip(&y).enumerate() {
                    if !self.descend(FieldKey::Index(i), xi, yi) {
                        return false;
                    }
                }
                true
            }
            (Value::Record(x), Value::Record(y)) => {
                let x: Vec<(String, Value)> = x.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                let y: Vec<(String, Value)> = y.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                self.compare_fields(&x, &y)
            }
            (Value::Object(x), Value::Object(y)) => {
                let tx = (*x.borrow()).type_name();
                let ty = (*y.borrow()).type_name();
                if tx != ty {
                    return self.mismatch(format!("type {tx} != {ty}"));
                }
                let fx = x.borrow().fields();
                let fy = y.borrow().fields();
                self.compare_fields(&fx, &fy)
            }
            _ => self.mismatch(format!("kind {} != {}", a.kind(), b.kind())),
        }
    }

    fn compare_fields(&mut self, x: &[(String, Value)], y: &[(String, Value)]) -> bool {
        for (name, _) in x {
            if !y.iter().any(|(n, _)| n == name) {
                return self.mismatch(format!(".{name} missing from second"));
            }
        }
        for (name, _) in y {
            if !x.iter().any(|(n, _)| n == name) {
                return self.mismatch(format!(".{name} missing from first"));
            }
        }
        for (name, xv) in x {
            let Some((_, yv)) = y.iter().find(|(n, _)| n == name) else {
                continue;
            };
            if !self.descend(FieldKey::Name(name.clone()), xv, yv) {
                return false;
            }
        }
        true
    }

    fn descend(&mut self, key: FieldKey, a: &Value, b: &Value) -> bool {
        self.path.push(key);
        let equal = self.compare(a, b);
        self.path.pop();
        equal
    }

    fn expect(&self, equal: bool, reason: impl FnOnce() -> String) -> bool {
        if !equal {
            return self.mismatch(reason());
        }
        true
    }

    fn mismatch(&self, reason: String) -> bool {
        let path: String = self.path.iter().map(ToString::to_string).collect();
        tracing::debug!(path = %path, reason = %reason, "shape mismatch");
        false
    }
}
