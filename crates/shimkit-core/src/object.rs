//! Reflective backing objects
//!
//! Backing objects describe themselves with a contract of their own (their
//! *shape*) and expose members by exact name through [`Reflect`]. Shims
//! resolve contract members against that shape, so a backing object never
//! sees a fuzzy name.
//!
//! [`Record`] is the general-purpose implementation: a property bag with
//! closure-backed methods, used for ad-hoc backing objects and as the plain
//! data behind synthesized instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::contract::{Access, Contract, ContractBuilder, Member};
use crate::types::TypeDesc;
use crate::{Error, Result, Value};

/// A backing object that describes its own members
pub trait Reflect {
    /// The members this object exposes
    fn shape(&self) -> Arc<Contract>;

    /// Read a property by its exact shape name
    fn get_member(&self, name: &str) -> Option<Value>;

    /// Write a property by its exact shape name
    fn set_member(&mut self, name: &str, value: Value) -> Result<()>;

    /// Call a method taken from this object's shape
    fn invoke_member(&mut self, method: &Member, _args: Vec<Value>) -> Result<Value> {
        Err(Error::MethodNotFound {
            method: method.name().to_string(),
            arity: method.arity(),
            target: format!("object '{}'", self.shape().name()),
        })
    }
}

/// Shared handle to a reflective object
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<dyn Reflect>>);

impl ObjectRef {
    pub fn new<R: Reflect + 'static>(object: R) -> Self {
        ObjectRef(Rc::new(RefCell::new(object)))
    }

    pub fn shape(&self) -> Arc<Contract> {
        self.0.borrow().shape()
    }

    pub fn type_name(&self) -> String {
        self.shape().name().to_string()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get_member(name)
    }

    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        self.0
            .try_borrow_mut()
            .map_err(|_| busy(name))?
            .set_member(name, value)
    }

    pub fn invoke(&self, method: &Member, args: Vec<Value>) -> Result<Value> {
        self.0
            .try_borrow_mut()
            .map_err(|_| busy(method.name()))?
            .invoke_member(method, args)
    }

    /// Every readable property with its current value, in shape order
    pub fn readable_entries(&self) -> Vec<(String, Value)> {
        let shape = self.shape();
        let object = self.0.borrow();
        shape
            .catalog()
            .properties()
            .iter()
            .filter(|m| m.is_readable())
            .map(|m| {
                let value = object
                    .get_member(m.name())
                    .unwrap_or_else(|| m.ty().default_value());
                (m.name().to_string(), value)
            })
            .collect()
    }

    /// True when both handles point at the same object
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
    }
}

fn busy(member: &str) -> Error {
    Error::InvalidOperation(format!("object is already in use while accessing '{}'", member))
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "ObjectRef({})", object.shape().name()),
            Err(_) => write!(f, "ObjectRef(<borrowed>)"),
        }
    }
}

// ── Record ────────────────────────────────────────────────

type RecordMethod = Rc<dyn Fn(&mut Record, Vec<Value>) -> Result<Value>>;

/// A property bag with closure-backed methods
pub struct Record {
    shape: Arc<Contract>,
    values: HashMap<String, Value>,
    methods: HashMap<(String, usize), RecordMethod>,
}

impl Record {
    pub fn builder(type_name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            shape: Contract::builder(type_name),
            values: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    /// Plain data satisfying `contract`: every property read-write and set
    /// to its default, nested contract members filled with nested records.
    pub fn from_contract(contract: &Arc<Contract>) -> Record {
        let mut shape = Contract::builder(contract.name());
        let mut values = HashMap::new();
        for member in contract.catalog().properties() {
            let (ty, value) = match member.ty() {
                TypeDesc::Contract(nested) => (
                    TypeDesc::Any,
                    Value::Object(ObjectRef::new(Record::from_contract(nested))),
                ),
                TypeDesc::Nullable(inner) if matches!(**inner, TypeDesc::Contract(_)) => {
                    (TypeDesc::Any, Value::Null)
                }
                other => (other.clone(), other.default_value()),
            };
            shape = shape.property(member.name(), ty, Access::ReadWrite);
            values.insert(member.name().to_string(), value);
        }
        Record {
            shape: shape.build(),
            values,
            methods: HashMap::new(),
        }
    }

    /// Current value of a property, by exact name
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn declared(&self, name: &str) -> Result<Member> {
        self.shape
            .members()
            .iter()
            .find(|m| !m.is_method() && m.name() == name)
            .cloned()
            .ok_or_else(|| Error::MemberNotFound {
                member: name.to_string(),
                target: format!("object '{}'", self.shape.name()),
            })
    }
}

impl Reflect for Record {
    fn shape(&self) -> Arc<Contract> {
        Arc::clone(&self.shape)
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn set_member(&mut self, name: &str, value: Value) -> Result<()> {
        let member = self.declared(name)?;
        if !member.is_writable() {
            return Err(Error::ReadOnlyMember {
                member: name.to_string(),
                contract: self.shape.name().to_string(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn invoke_member(&mut self, method: &Member, args: Vec<Value>) -> Result<Value> {
        let key = (method.name().to_string(), args.len());
        let body = match self.methods.get(&key) {
            Some(body) => Rc::clone(body),
            None => {
                return Err(Error::MethodNotFound {
                    method: method.name().to_string(),
                    arity: args.len(),
                    target: format!("object '{}'", self.shape.name()),
                })
            }
        };
        for (index, (param, arg)) in method.params().iter().zip(&args).enumerate() {
            if !param.ty.accepts(arg) {
                return Err(Error::ArgumentMismatch {
                    method: method.name().to_string(),
                    index,
                    expected: param.ty.to_string(),
                    found: arg.type_name().to_string(),
                });
            }
        }
        body(self, args)
    }
}

/// Builder for [`Record`] objects
pub struct RecordBuilder {
    shape: ContractBuilder,
    values: HashMap<String, Value>,
    methods: HashMap<(String, usize), RecordMethod>,
}

impl RecordBuilder {
    fn with(mut self, name: &str, ty: TypeDesc, access: Access, value: Value) -> Self {
        self.shape = self.shape.property(name, ty, access);
        self.values.insert(name.to_string(), value);
        self
    }

    /// A read-write property
    pub fn property(self, name: &str, ty: TypeDesc, value: impl Into<Value>) -> Self {
        self.with(name, ty, Access::ReadWrite, value.into())
    }

    pub fn read_only(self, name: &str, ty: TypeDesc, value: impl Into<Value>) -> Self {
        self.with(name, ty, Access::ReadOnly, value.into())
    }

    pub fn write_only(self, name: &str, ty: TypeDesc) -> Self {
        let initial = ty.default_value();
        self.with(name, ty, Access::WriteOnly, initial)
    }

    /// A method; the body receives the record itself and the arguments
    pub fn method<F>(mut self, name: &str, params: &[(&str, TypeDesc)], returns: TypeDesc, body: F) -> Self
    where
        F: Fn(&mut Record, Vec<Value>) -> Result<Value> + 'static,
    {
        self.shape = self.shape.method(name, params.iter().cloned(), returns);
        self.methods
            .insert((name.to_string(), params.len()), Rc::new(body));
        self
    }

    pub fn build(self) -> ObjectRef {
        ObjectRef::new(Record {
            shape: self.shape.build(),
            values: self.values,
            methods: self.methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> ObjectRef {
        Record::builder("Counter")
            .property("Count", TypeDesc::Integer, 0)
            .read_only("Label", TypeDesc::String, "clicks")
            .method("Add", &[("n", TypeDesc::Integer)], TypeDesc::Integer, |record, args| {
                let current = record.value("Count").and_then(Value::as_i64).unwrap_or(0);
                let next = current + args[0].as_i64().unwrap_or(0);
                record.set_member("Count", Value::Integer(next))?;
                Ok(Value::Integer(next))
            })
            .build()
    }

    fn add_member(object: &ObjectRef) -> Member {
        object.shape().catalog().method("Add", 1, crate::MatchMode::Strict).unwrap().clone()
    }

    #[test]
    fn test_record_get_set() {
        let object = counter();
        assert_eq!(object.get("Count"), Some(Value::Integer(0)));
        object.set("Count", Value::Integer(5)).unwrap();
        assert_eq!(object.get("Count"), Some(Value::Integer(5)));
        assert_eq!(object.type_name(), "Counter");
    }

    #[test]
    fn test_record_rejects_read_only_and_unknown() {
        let object = counter();
        assert!(matches!(
            object.set("Label", Value::from("x")),
            Err(Error::ReadOnlyMember { .. })
        ));
        assert!(matches!(
            object.set("Missing", Value::Null),
            Err(Error::MemberNotFound { .. })
        ));
    }

    #[test]
    fn test_record_method_mutates_state() {
        let object = counter();
        let add = add_member(&object);
        assert_eq!(object.invoke(&add, vec![Value::Integer(3)]), Ok(Value::Integer(3)));
        assert_eq!(object.invoke(&add, vec![Value::Integer(4)]), Ok(Value::Integer(7)));
        assert_eq!(object.get("Count"), Some(Value::Integer(7)));
    }

    #[test]
    fn test_record_method_checks_argument_types() {
        let object = counter();
        let add = add_member(&object);
        let err = object.invoke(&add, vec![Value::from("3")]).unwrap_err();
        assert!(err.is_argument_mismatch());
    }

    #[test]
    fn test_readable_entries_skip_write_only() {
        let object = Record::builder("Secretive")
            .property("Open", TypeDesc::Integer, 1)
            .write_only("Hidden", TypeDesc::String)
            .build();
        assert_eq!(
            object.readable_entries(),
            vec![("Open".to_string(), Value::Integer(1))]
        );
    }

    #[test]
    fn test_from_contract_fills_defaults_and_nested_records() {
        let leaf = Contract::builder("Leaf").read_only("Legs", TypeDesc::Integer).build();
        let root = Contract::builder("Root")
            .read_only("Name", TypeDesc::String)
            .read_write("Leaf", TypeDesc::Contract(leaf))
            .read_write("Maybe", TypeDesc::nullable(TypeDesc::Contract(Contract::builder("M").build())))
            .build();
        let object = ObjectRef::new(Record::from_contract(&root));
        assert_eq!(object.get("Name"), Some(Value::String(String::new())));
        assert_eq!(object.get("Maybe"), Some(Value::Null));
        let nested = object.get("Leaf").unwrap();
        assert_eq!(nested.as_object().unwrap().get("Legs"), Some(Value::Integer(0)));
        object.set("Name", Value::from("writable underneath")).unwrap();
    }

    #[test]
    fn test_object_identity() {
        let a = counter();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&counter()));
    }
}
