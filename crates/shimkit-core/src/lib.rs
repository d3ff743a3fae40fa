//! shimkit core - structural-capability shims
//!
//! Given one or more backing values (reflective objects or string-keyed
//! maps) and a contract, build a value at runtime that satisfies the
//! contract by forwarding reads, writes and calls to the backing values.
//!
//! # Architecture
//!
//! ```text
//! Contract (builder / contract! / Schema) → Validate → MemberCatalog
//!                                                ↓
//!   backing chain → wrap → Shim / DictionaryShim → NameResolver → Coercer
//!                                ↓                                  ↓
//!                          ShimRef (Adapter)  ←──  nested contract children
//!                                ↓
//!             ContractTypeFactory → SynthesizedType → Instance
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: name resolution always picks the same candidate
//! - **Forgiving reads**: missing or unconvertible data yields the declared
//!   type's default, never an error
//! - **Built once**: catalogs and synthesized types are cached per contract
//! - **Shared**: contracts and synthesized types are `Send + Sync`

pub mod catalog;
pub mod coerce;
pub mod config;
pub mod contract;
pub mod dictionary;
pub mod error;
pub mod factory;
pub mod macros;
pub mod map;
pub mod object;
pub mod resolver;
pub mod schema;
pub mod shim;
pub mod translate;
pub mod types;
pub mod validate;
pub mod value;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::OnceCell;
}

pub use catalog::MemberCatalog;
pub use coerce::Coercer;
pub use config::ShimConfig;
pub use contract::{Access, Annotations, Contract, ContractBuilder, Member, MemberKind, Param};
pub use dictionary::DictionaryShim;
pub use error::{Error, Result};
pub use factory::{ContractTypeFactory, Instance, SynthesizedType};
pub use map::{Dictionary, MapRef, ReadOnlyMap};
pub use object::{ObjectRef, Record, Reflect};
pub use resolver::{MatchMode, MatchTier, NameIndex, NameResolver, Resolution};
pub use schema::Schema;
pub use shim::{wrap, wrap_with, Adapter, Shim, ShimRef};
pub use translate::KeyTranslatingMap;
pub use types::{ContractValue, TypeDesc};
pub use validate::{Diagnostic, DiagnosticKind, Severity, ValidationResult};
pub use value::{Callable, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn named() -> Arc<Contract> {
        Contract::builder("Named").read_write("Name", TypeDesc::String).build()
    }

    fn identified() -> Arc<Contract> {
        Contract::builder("Identified").read_write("Id", TypeDesc::Guid).build()
    }

    fn nested() -> Arc<Contract> {
        let legs = Contract::builder("Legged").read_write("Legs", TypeDesc::Integer).build();
        Contract::builder("Outer")
            .read_write("Sub", TypeDesc::Contract(legs))
            .build()
    }

    // ── Name resolution ───────────────────────────────────

    #[test]
    fn test_lowercase_backing_name_fuzzy_vs_strict() {
        let backing = Record::builder("Person").property("name", TypeDesc::String, "Ada").build();

        let fuzzy = wrap(vec![Value::Object(backing.clone())], &named(), MatchMode::Fuzzy).unwrap();
        assert_eq!(fuzzy.get("Name"), Ok(Value::from("Ada")));
        backing.set("name", Value::from("Grace")).unwrap();
        assert_eq!(fuzzy.get("Name"), Ok(Value::from("Grace")));

        let strict = wrap(vec![Value::Object(backing)], &named(), MatchMode::Strict).unwrap();
        assert!(matches!(strict.get("Name"), Err(Error::MemberNotFound { .. })));
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let map = MapRef::new();
        let shim = wrap(vec![Value::Map(map.clone())], &named(), MatchMode::Fuzzy).unwrap();
        shim.set("Name", "Linus").unwrap();
        assert_eq!(shim.get("Name"), Ok(Value::from("Linus")));
        assert_eq!(map.get("Name"), Some(Value::from("Linus")));
    }

    // ── Coercion ──────────────────────────────────────────

    #[test]
    fn test_guid_parse_and_degrade() {
        let id = Uuid::parse_str("3fa85f64-5717-4562-b3fc-2c963f66afa6").unwrap();
        let good = Record::builder("Row")
            .property("id", TypeDesc::String, id.to_string())
            .build();
        let shim = wrap(vec![Value::Object(good)], &identified(), MatchMode::Fuzzy).unwrap();
        assert_eq!(shim.get("Id"), Ok(Value::Guid(id)));

        let bad = Record::builder("Row").property("id", TypeDesc::String, "not a guid").build();
        let shim = wrap(vec![Value::Object(bad)], &identified(), MatchMode::Fuzzy).unwrap();
        assert_eq!(shim.get("Id"), Ok(Value::Guid(Uuid::nil())));
    }

    #[test]
    fn test_empty_map_reads_defaults() {
        let contract = Contract::builder("Sparse")
            .read_write("Count", TypeDesc::Integer)
            .read_write("Label", TypeDesc::String)
            .read_write("Maybe", TypeDesc::nullable(TypeDesc::Float))
            .build();
        let shim = wrap(vec![Value::Map(MapRef::new())], &contract, MatchMode::Fuzzy).unwrap();
        assert_eq!(shim.get("Count"), Ok(Value::Integer(0)));
        assert_eq!(shim.get("Label"), Ok(Value::from("")));
        assert_eq!(shim.get("Maybe"), Ok(Value::Null));
    }

    // ── Nesting ───────────────────────────────────────────

    #[test]
    fn test_nested_dictionary_write_creates_submap() {
        let map = MapRef::new();
        let shim = wrap(vec![Value::Map(map.clone())], &nested(), MatchMode::Fuzzy).unwrap();
        let sub = shim.get("Sub").unwrap();
        let sub = sub.as_shim().unwrap();
        sub.set("Legs", 4).unwrap();

        let json = Value::Map(map).to_json();
        assert_eq!(json, serde_json::json!({ "Sub": { "Legs": 4 } }));
        assert_eq!(
            shim.get("Sub").unwrap().as_shim().unwrap().get("Legs"),
            Ok(Value::Integer(4))
        );
    }

    #[test]
    fn test_nested_child_is_stable_until_backing_changes() {
        let inner = MapRef::from_entries([("Legs", Value::from(2))]);
        let map = MapRef::from_entries([("Sub", Value::Map(inner))]);
        let shim = wrap(vec![Value::Map(map.clone())], &nested(), MatchMode::Fuzzy).unwrap();

        let first = shim.get("Sub").unwrap();
        let second = shim.get("Sub").unwrap();
        assert!(first.same_instance(&second));

        map.insert("Sub", MapRef::from_entries([("Legs", Value::from(6))])).unwrap();
        let fresh = shim.get("Sub").unwrap();
        assert!(!first.same_instance(&fresh));
        assert_eq!(fresh.as_shim().unwrap().get("Legs"), Ok(Value::Integer(6)));
    }

    // ── Typed access ──────────────────────────────────────

    #[test]
    fn test_schema_to_typed_instance() {
        let schema = Schema::from_json(
            r#"{ "contracts": [{ "name": "Person", "members": [
                { "kind": "property", "name": "Name", "type": "String" },
                { "kind": "property", "name": "Age", "type": "Integer", "access": "read_only" }
            ] }] }"#,
        )
        .unwrap();
        let person = schema.contract("Person").unwrap();
        let ty = ContractTypeFactory::global().make_type_for(&person, MatchMode::Fuzzy).unwrap();

        let data = MapRef::from_entries([("name", Value::from("Ada")), ("age", Value::from("36"))]);
        let instance = ty.instantiate_over(vec![Value::Map(data)]).unwrap();
        assert_eq!(instance.get_as::<String>("Name"), Ok("Ada".to_string()));
        assert_eq!(instance.get_as::<i64>("Age"), Ok(36));
        assert!(matches!(instance.set("Age", 37), Err(Error::ReadOnlyMember { .. })));
    }
}
