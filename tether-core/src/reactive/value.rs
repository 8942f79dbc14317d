//! Dynamic values stored in a data tree.
//!
//! Scalars compare by value, containers and opaque host objects by
//! identity. That comparison is what decides whether a write counts as a
//! change, so `PartialEq` on [`Value`] is identity equality, not structural
//! equality: two distinct objects with the same contents are not equal.
//!
//! Containers may reference themselves. The recursive renderers (`Display`,
//! `Debug`, `Serialize` and [`Value::to_json`]) detect a container that is
//! already being rendered further up and cut the cycle there.

use std::any::Any;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

use super::array::Array;
use super::object::Object;
use super::observer::Observer;

thread_local! {
    static RENDERING: RefCell<Vec<*const ()>> = const { RefCell::new(Vec::new()) };
}

/// Marks a container as being walked by a recursive renderer. Dropping the
/// guard unmarks it.
pub(crate) struct CycleGuard(*const ());

impl CycleGuard {
    /// `None` when the container is already being walked.
    pub(crate) fn enter(container: *const ()) -> Option<Self> {
        RENDERING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&container) {
                return None;
            }
            stack.push(container);
            Some(Self(container))
        })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        RENDERING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|entry| *entry == self.0) {
                stack.remove(pos);
            }
        });
    }
}

/// A host object carried by identity and never observed.
///
/// This is how DOM-node-like values live inside a data tree.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Rc::as_ptr(&self.0))
    }
}

/// A value in a data tree.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Array(Array),
    Opaque(Opaque),
}

impl Value {
    /// Strict identity: scalars by value (`NaN` is never identical to
    /// itself), everything else by pointer.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// True for objects and arrays, the values the observer walks into.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// True for everything a script would treat as an object: containers
    /// and opaque host objects. Watchers holding such a value fire on every
    /// run, since it may have changed in place.
    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_) | Value::Opaque(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Opaque(_) => "opaque",
        }
    }

    /// The observer attached to this value, if it has been observed.
    pub fn observer(&self) -> Option<Observer> {
        match self {
            Value::Object(object) => object.observer(),
            Value::Array(array) => array.observer(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Untracked conversion into JSON. `Undefined`, opaque values and
    /// back-references to a container being converted become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => match as_integer(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Object(object) => match CycleGuard::enter(object.as_ptr()) {
                Some(_guard) => serde_json::Value::Object(
                    object
                        .entries_untracked()
                        .into_iter()
                        .map(|(key, value)| (key, value.to_json()))
                        .collect(),
                ),
                None => serde_json::Value::Null,
            },
            Value::Array(array) => match CycleGuard::enter(array.as_ptr()) {
                Some(_guard) => {
                    serde_json::Value::Array(array.to_vec().iter().map(Value::to_json).collect())
                }
                None => serde_json::Value::Null,
            },
        }
    }

    /// Ordering used by the default array sort: `Undefined` last, everything
    /// else by its string form.
    pub(crate) fn default_sort_cmp(a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Undefined, Value::Undefined) => Ordering::Equal,
            (Value::Undefined, _) => Ordering::Greater,
            (_, Value::Undefined) => Ordering::Less,
            _ => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_identical(other)
    }
}

/// Integral numbers inside the exactly representable range.
fn as_integer(n: f64) -> Option<i64> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    (n.fract() == 0.0 && n.abs() <= MAX_SAFE).then_some(n as i64)
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        f.write_str("0")
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{n:.0}")
    } else {
        write!(f, "{n}")
    }
}

/// String conversion as a template would render it.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::Object(_) | Value::Opaque(_) => f.write_str("[object Object]"),
            Value::Array(array) => {
                // A nested reference to an array being joined renders empty.
                let Some(_guard) = CycleGuard::enter(array.as_ptr()) else {
                    return Ok(());
                };
                for (i, item) in array.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !matches!(item, Value::Undefined | Value::Null) {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Value::Opaque(opaque)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Builds plain, not yet observed containers.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Array(Array::from_values(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(map) => Value::Object(Object::from_entries(
                map.into_iter().map(|(key, value)| (key, Value::from(value))),
            )),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null | Value::Opaque(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match as_integer(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(object) => {
                let _guard = CycleGuard::enter(object.as_ptr()).ok_or_else(cyclic::<S>)?;
                let entries = object.entries_untracked();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Array(array) => {
                let _guard = CycleGuard::enter(array.as_ptr()).ok_or_else(cyclic::<S>)?;
                let items = array.to_vec();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

fn cyclic<S: Serializer>() -> S::Error {
    <S::Error as ser::Error>::custom("cannot serialize a cyclic structure")
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_compare_by_value() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Null, Value::Undefined);
    }

    #[test]
    fn nan_is_not_identical_to_itself() {
        let nan = Value::from(f64::NAN);
        assert!(!nan.is_identical(&nan.clone()));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::from(json!({"x": 1}));
        let b = Value::from(json!({"x": 1}));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn display_matches_template_rendering() {
        assert_eq!(Value::from(2).to_string(), "2");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::from(json!([1, null, "b"])).to_string(), "1,,b");
        assert_eq!(Value::from(json!({})).to_string(), "[object Object]");
    }

    #[test]
    fn json_roundtrip_through_serde() {
        let source = json!({"user": {"name": "a", "tags": [1, 2]}, "ok": true});
        let value = Value::from(source.clone());
        assert_eq!(serde_json::to_value(&value).unwrap(), source);
        assert_eq!(value.to_json(), source);

        let parsed: Value = serde_json::from_str(r#"{"a": [true]}"#).unwrap();
        assert!(parsed.as_object().is_some());
    }

    #[test]
    fn source_key_order_survives_roundtrip() {
        let source = r#"{"zeta":1,"alpha":2,"mid":{"b":1,"a":2}}"#;
        let parsed: Value = serde_json::from_str(source).unwrap();
        assert_eq!(parsed.as_object().unwrap().keys(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), source);

        let built = Value::from(json!({"zeta": 1, "alpha": 2}));
        assert_eq!(built.as_object().unwrap().keys(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn cyclic_values_render_without_recursing_forever() {
        let object = Object::new();
        object.set("name", "loop").unwrap();
        object.set("me", Value::from(object.clone())).unwrap();
        let array = Array::from_values([Value::from(1)]);
        array.push(Value::from(array.clone())).unwrap();

        let object = Value::from(object);
        let array = Value::from(array);

        assert_eq!(object.to_json(), json!({"name": "loop", "me": null}));
        assert_eq!(array.to_json(), json!([1, null]));
        assert_eq!(array.to_string(), "1,");
        assert!(format!("{object:?}").contains("[Circular]"));
        assert!(format!("{array:?}").contains("[Circular]"));

        let err = serde_json::to_string(&object).unwrap_err();
        assert!(err.to_string().contains("cyclic"));
        assert!(serde_json::to_string(&array).is_err());

        // Sibling references to the same container are not cycles.
        let shared = Value::from(json!({"x": 1}));
        let pair = Value::from(Array::from_values([shared.clone(), shared]));
        assert_eq!(pair.to_json(), json!([{"x": 1}, {"x": 1}]));
    }

    #[test]
    fn object_like_covers_host_objects() {
        assert!(Value::from(Opaque::new(3u8)).is_object_like());
        assert!(Value::from(json!([])).is_object_like());
        assert!(!Value::from(Opaque::new(3u8)).is_container());
        assert!(!Value::Null.is_object_like());
    }

    #[test]
    fn json_containers_start_unobserved() {
        let value = Value::from(json!({"a": 1}));
        assert!(value.observer().is_none());
        assert!(value.is_container());
    }

    #[test]
    fn default_sort_puts_undefined_last() {
        let mut items = vec![Value::Undefined, Value::from(10), Value::from(9), Value::from("a")];
        items.sort_by(Value::default_sort_cmp);
        let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["10", "9", "a", "undefined"]);
    }
}
