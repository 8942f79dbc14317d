//! Dot-path expressions.
//!
//! A path such as `user.profile.name` is resolved by successive property
//! reads starting at a root object. Each read goes through the normal
//! (tracked) accessor, which is how a watcher discovers its dependencies.

use std::fmt;

use smallvec::SmallVec;

use super::object::Object;
use super::value::Value;
use crate::error::{Result, TetherError};

/// A parsed `.`-separated key sequence.
#[derive(Clone, PartialEq, Eq)]
pub struct DotPath {
    source: String,
    segments: SmallVec<[String; 4]>,
}

impl DotPath {
    /// Split `expr` on `.`. Segments are taken verbatim (no trimming); only
    /// the empty expression is rejected.
    pub fn parse(expr: &str) -> Result<Self> {
        if expr.is_empty() {
            return Err(TetherError::EmptyPath);
        }
        Ok(Self {
            source: expr.to_owned(),
            segments: expr.split('.').map(str::to_owned).collect(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Follow the path from `root`.
    ///
    /// Stepping into `undefined` or `null` is an error; stepping into any
    /// other scalar yields `Undefined`.
    pub fn resolve(&self, root: &Object) -> Result<Value> {
        let mut current = Value::Object(root.clone());
        for segment in &self.segments {
            current = self.step(&current, segment)?;
        }
        Ok(current)
    }

    /// Assign `value` at the end of the path.
    ///
    /// Object targets go through the reactive setter. Array targets take a
    /// raw index write, like a plain indexed assignment would.
    pub fn assign(&self, root: &Object, value: Value) -> Result<()> {
        let (last, parents) = self
            .segments
            .split_last()
            .ok_or(TetherError::EmptyPath)?;

        let mut target = Value::Object(root.clone());
        for segment in parents {
            target = self.step(&target, segment)?;
        }

        match &target {
            Value::Object(object) => object.set(last, value),
            Value::Array(array) => {
                match last.parse::<usize>() {
                    Ok(index) => array.write_index(index, value),
                    Err(_) => Ok(()),
                }
            }
            Value::Undefined | Value::Null => Err(TetherError::PropertyOfUndefined {
                path: self.source.clone(),
                segment: last.clone(),
                base: target.type_name(),
            }),
            other => Err(TetherError::NotAContainer {
                path: self.source.clone(),
                segment: last.clone(),
                kind: other.type_name(),
            }),
        }
    }

    fn step(&self, base: &Value, segment: &str) -> Result<Value> {
        match base {
            Value::Object(object) => Ok(object.get(segment)),
            Value::Array(array) => Ok(match segment {
                "length" => Value::from(array.len()),
                _ => segment
                    .parse::<usize>()
                    .map(|index| array.get(index))
                    .unwrap_or_default(),
            }),
            Value::Undefined | Value::Null => Err(TetherError::PropertyOfUndefined {
                path: self.source.clone(),
                segment: segment.to_owned(),
                base: base.type_name(),
            }),
            _ => Ok(Value::Undefined),
        }
    }
}

impl fmt::Debug for DotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DotPath({:?})", self.source)
    }
}

impl fmt::Display for DotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::observer::observe;
    use serde_json::json;

    fn root(json: serde_json::Value) -> Object {
        let value = Value::from(json);
        observe(&value);
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parse_splits_verbatim() {
        let path = DotPath::parse("a. b..c").unwrap();
        assert_eq!(path.segments(), ["a", " b", "", "c"]);
        assert_eq!(path.as_str(), "a. b..c");
        assert_eq!(DotPath::parse(""), Err(TetherError::EmptyPath));
    }

    #[test]
    fn resolve_nested_keys() {
        let data = root(json!({"user": {"name": "a"}}));
        let value = DotPath::parse("user.name").unwrap().resolve(&data).unwrap();
        assert_eq!(value, Value::from("a"));
    }

    #[test]
    fn resolve_missing_leaf_is_undefined() {
        let data = root(json!({"user": {}}));
        let value = DotPath::parse("user.name").unwrap().resolve(&data).unwrap();
        assert!(value.is_undefined());
    }

    #[test]
    fn resolve_through_missing_intermediate_fails() {
        let data = root(json!({}));
        let err = DotPath::parse("user.name").unwrap().resolve(&data).unwrap_err();
        assert_eq!(
            err,
            TetherError::PropertyOfUndefined {
                path: "user.name".into(),
                segment: "name".into(),
                base: "undefined",
            }
        );
    }

    #[test]
    fn resolve_through_null_fails() {
        let data = root(json!({"user": null}));
        let err = DotPath::parse("user.name").unwrap().resolve(&data).unwrap_err();
        assert!(matches!(err, TetherError::PropertyOfUndefined { base: "null", .. }));
    }

    #[test]
    fn resolve_property_of_scalar_is_undefined() {
        let data = root(json!({"n": 5}));
        let value = DotPath::parse("n.x").unwrap().resolve(&data).unwrap();
        assert!(value.is_undefined());
    }

    #[test]
    fn resolve_array_index_and_length() {
        let data = root(json!({"list": [{"id": 7}, 8]}));
        assert_eq!(
            DotPath::parse("list.0.id").unwrap().resolve(&data).unwrap(),
            Value::from(7)
        );
        assert_eq!(
            DotPath::parse("list.length").unwrap().resolve(&data).unwrap(),
            Value::from(2)
        );
        assert!(DotPath::parse("list.x").unwrap().resolve(&data).unwrap().is_undefined());
    }

    #[test]
    fn assign_goes_through_setter() {
        let data = root(json!({"user": {"name": "a"}}));
        DotPath::parse("user.name")
            .unwrap()
            .assign(&data, Value::from("b"))
            .unwrap();
        let user = data.get_untracked("user");
        assert_eq!(user.as_object().unwrap().get_untracked("name"), Value::from("b"));
    }

    #[test]
    fn assign_errors() {
        let data = root(json!({"n": 1}));
        let missing = DotPath::parse("user.name")
            .unwrap()
            .assign(&data, Value::from(1))
            .unwrap_err();
        assert!(matches!(missing, TetherError::PropertyOfUndefined { .. }));

        let scalar = DotPath::parse("n.x")
            .unwrap()
            .assign(&data, Value::from(1))
            .unwrap_err();
        assert!(matches!(scalar, TetherError::NotAContainer { kind: "number", .. }));
    }

    #[test]
    fn assign_array_index_past_limit_fails() {
        let data = root(json!({"list": [1]}));
        let err = DotPath::parse("list.18446744073709551615")
            .unwrap()
            .assign(&data, Value::from(2))
            .unwrap_err();
        assert_eq!(err, TetherError::IndexOutOfRange { index: usize::MAX });

        let list = data.get_untracked("list");
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[test]
    fn assign_array_index_is_raw() {
        let data = root(json!({"list": [1, 2]}));
        DotPath::parse("list.1").unwrap().assign(&data, Value::from(5)).unwrap();
        let list = data.get_untracked("list");
        assert_eq!(list.as_array().unwrap().get(1), Value::from(5));
    }
}
