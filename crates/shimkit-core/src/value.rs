//! Dynamic values flowing through shims
//!
//! `Value` is the currency of every shim operation: backing objects hand
//! values out, coercion reshapes them, and contract consumers receive them.
//! Scalars are held by value; maps, objects, shims and callables are shared
//! handles, so a value read out of a backing map still refers to the same
//! underlying storage.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::map::MapRef;
use crate::object::ObjectRef;
use crate::shim::ShimRef;
use crate::Result;

/// A dynamically typed value
#[derive(Debug, Clone)]
pub enum Value {
    /// Null / absent
    Null,
    Boolean(bool),
    /// Integer value (i64)
    Integer(i64),
    /// Float value (f64)
    Float(f64),
    String(String),
    /// Unique identifier
    Guid(Uuid),
    /// Point in time, always UTC
    DateTime(DateTime<Utc>),
    Array(Vec<Value>),
    /// Shared string-keyed dictionary
    Map(MapRef),
    /// Shared reflective object
    Object(ObjectRef),
    /// Handle satisfying a contract
    Shim(ShimRef),
    /// Callable stored in a dictionary slot
    Function(Callable),
}

impl Value {
    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Guid(_) => "Guid",
            Value::DateTime(_) => "DateTime",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
            Value::Object(_) => "Object",
            Value::Shim(_) => "Shim",
            Value::Function(_) => "Function",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Value::Guid(g) => Some(*g),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_shim(&self) -> Option<&ShimRef> {
        match self {
            Value::Shim(s) => Some(s),
            _ => None,
        }
    }

    /// True when both values are handles to the very same shared instance.
    /// Scalars never share an instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Shim(a), Value::Shim(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Convert from serde_json::Value. Objects become fresh shared maps.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(MapRef::from_entries(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }

    /// Convert to serde_json::Value.
    ///
    /// Guids and dates render as strings, objects and shims as the map of
    /// their readable members, callables as null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::json!(*i),
            Value::Float(f) => serde_json::json!(*f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Guid(g) => serde_json::Value::String(g.to_string()),
            Value::DateTime(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(|v| v.to_json()).collect())
            }
            Value::Map(map) => entries_to_json(map.entries()),
            Value::Object(object) => entries_to_json(object.readable_entries()),
            Value::Shim(shim) => match shim.snapshot() {
                Ok(fields) => entries_to_json(fields),
                Err(_) => serde_json::Value::Null,
            },
            Value::Function(_) => serde_json::Value::Null,
        }
    }
}

fn entries_to_json(entries: impl IntoIterator<Item = (String, Value)>) -> serde_json::Value {
    let obj: serde_json::Map<String, serde_json::Value> = entries
        .into_iter()
        .map(|(k, v)| (k, v.to_json()))
        .collect();
    serde_json::Value::Object(obj)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Maps compare by content so nested documents can be asserted on
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || a.entries() == b.entries(),
            _ => self.same_instance(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Guid(g) => write!(f, "{}", g),
            Value::DateTime(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.entries().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Object(object) => write!(f, "<object {}>", object.type_name()),
            Value::Shim(shim) => write!(f, "<shim {}>", shim.contract().name()),
            Value::Function(_) => write!(f, "<function>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Uuid> for Value {
    fn from(g: Uuid) -> Self {
        Value::Guid(g)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::DateTime(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<MapRef> for Value {
    fn from(map: MapRef) -> Self {
        Value::Map(map)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<ShimRef> for Value {
    fn from(shim: ShimRef) -> Self {
        Value::Shim(shim)
    }
}

impl From<Callable> for Value {
    fn from(f: Callable) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(MapRef::from_entries(map))
    }
}

// ── Callable ──────────────────────────────────────────────

/// A shared function value, invoked by dictionary shims for method members
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(Vec<Value>) -> Result<Value>>);

impl Callable {
    pub fn new(f: impl Fn(Vec<Value>) -> Result<Value> + 'static) -> Self {
        Callable(Rc::new(f))
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_value_from_json_primitives() {
        assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);
        assert_eq!(
            Value::from_json(&serde_json::json!(true)),
            Value::Boolean(true)
        );
        assert_eq!(Value::from_json(&serde_json::json!(42)), Value::Integer(42));
        assert_eq!(
            Value::from_json(&serde_json::json!(3.14)),
            Value::Float(3.14)
        );
        assert_eq!(
            Value::from_json(&serde_json::json!("hello")),
            Value::String("hello".into())
        );
    }

    #[test]
    fn test_value_from_json_objects_become_maps() {
        let value = Value::from_json(&serde_json::json!({"a": 1, "b": {"c": "two"}}));
        let map = value.as_map().expect("object should become a map");
        assert_eq!(map.get("a"), Some(Value::Integer(1)));
        let nested = map.get("b").expect("nested entry");
        assert_eq!(
            nested.as_map().and_then(|m| m.get("c")),
            Some(Value::String("two".into()))
        );
    }

    #[test]
    fn test_value_roundtrip_json() {
        let original = serde_json::json!({
            "name": "test",
            "count": 42,
            "active": true,
            "items": [1, 2, 3],
            "nested": {"x": 1.5}
        });
        assert_eq!(Value::from_json(&original).to_json(), original);
    }

    #[test]
    fn test_guid_and_date_render_as_strings() {
        let id = Uuid::parse_str("3fa85f64-5717-4562-b3fc-2c963f66afa6").unwrap();
        assert_eq!(
            Value::Guid(id).to_json(),
            serde_json::json!("3fa85f64-5717-4562-b3fc-2c963f66afa6")
        );
        let when = DateTime::parse_from_rfc3339("2026-02-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            Value::DateTime(when).to_json(),
            serde_json::json!("2026-02-01T10:00:00+00:00")
        );
    }

    #[test]
    fn test_map_equality_is_by_content() {
        let a = Value::from_json(&serde_json::json!({"k": 1}));
        let b = Value::from_json(&serde_json::json!({"k": 1}));
        assert_eq!(a, b);
        assert!(!a.same_instance(&b));
        assert!(a.same_instance(&a.clone()));
    }

    #[test]
    fn test_callable_identity() {
        let f = Callable::new(|args| Ok(Value::Integer(args.len() as i64)));
        let g = f.clone();
        assert!(f.ptr_eq(&g));
        assert_eq!(f.call(vec![Value::Null, Value::Null]), Ok(Value::Integer(2)));
        assert_eq!(Value::Function(f.clone()), Value::Function(g));
        assert_ne!(
            Value::Function(f),
            Value::Function(Callable::new(|_| Ok(Value::Null)))
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::Boolean(true)), "true");
        assert_eq!(format!("{}", Value::Integer(42)), "42");
        assert_eq!(format!("{}", Value::String("hi".into())), "\"hi\"");
        assert_eq!(
            format!("{}", Value::from_json(&serde_json::json!({"a": [1, 2]}))),
            "{\"a\": [1, 2]}"
        );
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Integer(5));
    }
}
