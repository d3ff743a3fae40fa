//! Declared member types
//!
//! [`TypeDesc`] describes the type a contract member declares. It answers
//! two questions for the rest of the engine: is a value already assignable
//! (coercion rule 1), and what is the type's default value when nothing
//! usable is found.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::Contract;
use crate::map::MapRef;
use crate::{Result, Value};

/// A declared type
#[derive(Debug, Clone)]
pub enum TypeDesc {
    /// Accepts anything
    Any,
    Boolean,
    Integer,
    Float,
    String,
    Guid,
    DateTime,
    /// String-keyed dictionary
    Map,
    /// Reflective object
    Object,
    Nullable(Box<TypeDesc>),
    List(Box<TypeDesc>),
    /// Another contract; values are wrapped in a nested shim
    Contract(Arc<Contract>),
}

impl TypeDesc {
    pub fn nullable(inner: TypeDesc) -> Self {
        TypeDesc::Nullable(Box::new(inner))
    }

    pub fn list(inner: TypeDesc) -> Self {
        TypeDesc::List(Box::new(inner))
    }

    /// The zero value: what reads degrade to when nothing usable is found
    pub fn default_value(&self) -> Value {
        match self {
            TypeDesc::Boolean => Value::Boolean(false),
            TypeDesc::Integer => Value::Integer(0),
            TypeDesc::Float => Value::Float(0.0),
            TypeDesc::String => Value::String(String::new()),
            TypeDesc::Guid => Value::Guid(Uuid::nil()),
            TypeDesc::DateTime => Value::DateTime(DateTime::<Utc>::UNIX_EPOCH),
            TypeDesc::List(_) => Value::Array(Vec::new()),
            TypeDesc::Any
            | TypeDesc::Map
            | TypeDesc::Object
            | TypeDesc::Nullable(_)
            | TypeDesc::Contract(_) => Value::Null,
        }
    }

    /// Whether `value` can be stored as-is under this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeDesc::Any, _) => true,
            (TypeDesc::Boolean, Value::Boolean(_)) => true,
            (TypeDesc::Integer, Value::Integer(_)) => true,
            (TypeDesc::Float, Value::Float(_)) => true,
            (TypeDesc::String, Value::String(_)) => true,
            (TypeDesc::Guid, Value::Guid(_)) => true,
            (TypeDesc::DateTime, Value::DateTime(_)) => true,
            (TypeDesc::Map | TypeDesc::Object | TypeDesc::Contract(_), Value::Null) => true,
            (TypeDesc::Map, Value::Map(_)) => true,
            (TypeDesc::Object, Value::Object(_)) => true,
            (TypeDesc::Nullable(_), Value::Null) => true,
            (TypeDesc::Nullable(inner), v) => inner.accepts(v),
            (TypeDesc::List(inner), Value::Array(items)) => items.iter().all(|v| inner.accepts(v)),
            (TypeDesc::Contract(contract), Value::Shim(shim)) => shim.satisfies(contract),
            _ => false,
        }
    }

    /// The contract behind this type, looking through one nullable layer
    pub fn contract_target(&self) -> Option<&Arc<Contract>> {
        match self {
            TypeDesc::Contract(contract) => Some(contract),
            TypeDesc::Nullable(inner) => match inner.as_ref() {
                TypeDesc::Contract(contract) => Some(contract),
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical text used in fingerprints; nested contracts are pinned
    /// by their own fingerprint rather than their name.
    pub fn canonical(&self) -> String {
        match self {
            TypeDesc::Nullable(inner) => format!("{}?", inner.canonical()),
            TypeDesc::List(inner) => format!("List<{}>", inner.canonical()),
            TypeDesc::Contract(contract) => format!("contract:{}", contract.fingerprint()),
            other => other.to_string(),
        }
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeDesc::Nullable(a), TypeDesc::Nullable(b)) => a == b,
            (TypeDesc::List(a), TypeDesc::List(b)) => a == b,
            (TypeDesc::Contract(a), TypeDesc::Contract(b)) => {
                Arc::ptr_eq(a, b) || a.fingerprint() == b.fingerprint()
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Any => write!(f, "Any"),
            TypeDesc::Boolean => write!(f, "Boolean"),
            TypeDesc::Integer => write!(f, "Integer"),
            TypeDesc::Float => write!(f, "Float"),
            TypeDesc::String => write!(f, "String"),
            TypeDesc::Guid => write!(f, "Guid"),
            TypeDesc::DateTime => write!(f, "DateTime"),
            TypeDesc::Map => write!(f, "Map"),
            TypeDesc::Object => write!(f, "Object"),
            TypeDesc::Nullable(inner) => write!(f, "{}?", inner),
            TypeDesc::List(inner) => write!(f, "List<{}>", inner),
            TypeDesc::Contract(contract) => write!(f, "{}", contract.name()),
        }
    }
}

// ── Typed conversion ──────────────────────────────────────

/// Rust types usable as statically typed contract members.
///
/// `from_value` receives a value the shim already coerced to `type_desc()`;
/// implementations still degrade to a default on anything unexpected.
pub trait ContractValue: Sized {
    fn type_desc() -> TypeDesc;

    fn from_value(value: Value) -> Result<Self>;

    fn into_value(self) -> Value;
}

macro_rules! scalar_contract_value {
    ($ty:ty, $desc:expr, $variant:ident, $default:expr) => {
        impl ContractValue for $ty {
            fn type_desc() -> TypeDesc {
                $desc
            }

            fn from_value(value: Value) -> Result<Self> {
                match crate::coerce::Coercer::default().coerce(value, &$desc) {
                    Value::$variant(v) => Ok(v),
                    _ => Ok($default),
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

scalar_contract_value!(bool, TypeDesc::Boolean, Boolean, false);
scalar_contract_value!(i64, TypeDesc::Integer, Integer, 0);
scalar_contract_value!(f64, TypeDesc::Float, Float, 0.0);
scalar_contract_value!(String, TypeDesc::String, String, String::new());
scalar_contract_value!(Uuid, TypeDesc::Guid, Guid, Uuid::nil());
scalar_contract_value!(
    DateTime<Utc>,
    TypeDesc::DateTime,
    DateTime,
    DateTime::<Utc>::UNIX_EPOCH
);

impl ContractValue for i32 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Integer
    }

    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        Ok(i32::try_from(wide).unwrap_or_default())
    }

    fn into_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl ContractValue for Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

impl ContractValue for () {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }

    fn from_value(_value: Value) -> Result<Self> {
        Ok(())
    }

    fn into_value(self) -> Value {
        Value::Null
    }
}

impl ContractValue for MapRef {
    fn type_desc() -> TypeDesc {
        TypeDesc::Map
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(map) => Ok(map),
            _ => Ok(MapRef::new()),
        }
    }

    fn into_value(self) -> Value {
        Value::Map(self)
    }
}

impl<T: ContractValue> ContractValue for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::nullable(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, T::into_value)
    }
}

impl<T: ContractValue> ContractValue for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::list(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            _ => Ok(Vec::new()),
        }
    }

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(T::into_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(TypeDesc::Integer.default_value(), Value::Integer(0));
        assert_eq!(TypeDesc::String.default_value(), Value::String(String::new()));
        assert_eq!(TypeDesc::Guid.default_value(), Value::Guid(Uuid::nil()));
        assert_eq!(TypeDesc::nullable(TypeDesc::Integer).default_value(), Value::Null);
        assert_eq!(
            TypeDesc::list(TypeDesc::String).default_value(),
            Value::Array(vec![])
        );
    }

    #[test]
    fn test_accepts_is_strict_about_numbers() {
        assert!(TypeDesc::Float.accepts(&Value::Float(1.0)));
        assert!(!TypeDesc::Float.accepts(&Value::Integer(1)));
        assert!(!TypeDesc::Integer.accepts(&Value::String("1".into())));
    }

    #[test]
    fn test_accepts_nullable_and_lists() {
        let maybe_int = TypeDesc::nullable(TypeDesc::Integer);
        assert!(maybe_int.accepts(&Value::Null));
        assert!(maybe_int.accepts(&Value::Integer(3)));
        let ints = TypeDesc::list(TypeDesc::Integer);
        assert!(ints.accepts(&Value::Array(vec![Value::Integer(1)])));
        assert!(!ints.accepts(&Value::Array(vec![Value::String("x".into())])));
    }

    #[test]
    fn test_display_and_canonical() {
        let ty = TypeDesc::list(TypeDesc::nullable(TypeDesc::Guid));
        assert_eq!(ty.to_string(), "List<Guid?>");
        assert_eq!(ty.canonical(), "List<Guid?>");
    }

    #[test]
    fn test_scalar_contract_values() {
        assert_eq!(i64::from_value(Value::String("42".into())), Ok(42));
        assert_eq!(i64::from_value(Value::String("forty".into())), Ok(0));
        assert_eq!(i32::from_value(Value::Integer(i64::MAX)), Ok(0));
        assert_eq!(
            Option::<i64>::from_value(Value::Null),
            Ok(None)
        );
        assert_eq!(
            Vec::<String>::from_value(Value::Array(vec![Value::Integer(7)])),
            Ok(vec!["7".to_string()])
        );
        assert_eq!(true.into_value(), Value::Boolean(true));
    }
}
