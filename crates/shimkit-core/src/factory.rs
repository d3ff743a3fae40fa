//! Synthesized contract types
//!
//! The factory turns a contract into a [`SynthesizedType`]: an ordered slot
//! table with the contract's annotations copied over, from which
//! [`Instance`]s are made. Types are built once per (contract fingerprint,
//! match mode) and cached for the life of the factory; the global factory
//! lives for the whole process.
//!
//! Building is guarded per key, so concurrent requests for the same type
//! wait for a single build while requests for other types proceed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::{Lazy, OnceCell};

use crate::contract::{Annotations, Contract, Member};
use crate::object::{ObjectRef, Record};
use crate::resolver::MatchMode;
use crate::shim::{wrap, Shim, ShimRef};
use crate::types::ContractValue;
use crate::{Result, Value};

type TypeKey = (String, MatchMode);

static GLOBAL: Lazy<ContractTypeFactory> = Lazy::new(ContractTypeFactory::new);

/// Cache of synthesized types
#[derive(Debug, Default)]
pub struct ContractTypeFactory {
    types: RwLock<HashMap<TypeKey, Arc<OnceCell<Arc<SynthesizedType>>>>>,
}

impl ContractTypeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide factory
    pub fn global() -> &'static ContractTypeFactory {
        &GLOBAL
    }

    /// The synthesized type for `contract` under `mode`.
    ///
    /// # Errors
    /// `InvalidContract` when the contract fails validation; nothing is
    /// cached in that case.
    pub fn make_type_for(&self, contract: &Arc<Contract>, mode: MatchMode) -> Result<Arc<SynthesizedType>> {
        contract.validate()?;
        let key = (contract.fingerprint().to_string(), mode);
        let cell = self.cell_for(key);
        let ty = cell.get_or_try_init(|| {
            tracing::debug!(contract = contract.name(), %mode, "synthesizing contract type");
            Ok::<_, crate::Error>(Arc::new(SynthesizedType::new(Arc::clone(contract), mode)))
        })?;
        Ok(Arc::clone(ty))
    }

    fn cell_for(&self, key: TypeKey) -> Arc<OnceCell<Arc<SynthesizedType>>> {
        if let Some(cell) = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(cell);
        }
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(types.entry(key).or_default())
    }

    /// Number of types requested so far
    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Synthesized type ──────────────────────────────────────

/// Accessor table generated for one contract and match mode
#[derive(Debug)]
pub struct SynthesizedType {
    contract: Arc<Contract>,
    mode: MatchMode,
    type_name: String,
    /// Properties first, then method overloads, in catalog order
    slots: Vec<Member>,
    slot_index: HashMap<String, usize>,
    annotations: Annotations,
}

impl SynthesizedType {
    fn new(contract: Arc<Contract>, mode: MatchMode) -> Self {
        let catalog = contract.catalog();
        let slots: Vec<Member> = catalog
            .properties()
            .iter()
            .chain(catalog.all_methods())
            .cloned()
            .collect();
        let mut slot_index = HashMap::new();
        for (i, member) in slots.iter().enumerate() {
            slot_index.entry(member.name().to_string()).or_insert(i);
        }
        SynthesizedType {
            type_name: format!("{}Shim", contract.name()),
            annotations: contract.annotations().clone(),
            contract,
            mode,
            slots,
            slot_index,
        }
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Generated type name, e.g. `PersonShim`
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn slots(&self) -> &[Member] {
        &self.slots
    }

    /// Slot by exact member name; for overloaded methods the first overload
    pub fn slot(&self, name: &str) -> Option<&Member> {
        self.slot_index.get(name).map(|&i| &self.slots[i])
    }

    /// Contract-level annotations
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn member_annotations(&self, name: &str) -> Option<&Annotations> {
        self.slot(name).map(Member::annotations)
    }

    /// A new instance over fresh plain data
    pub fn instantiate(self: &Arc<Self>) -> Result<Instance> {
        let data = ObjectRef::new(Record::from_contract(&self.contract));
        let shim = Shim::new(vec![Value::Object(data)], Arc::clone(&self.contract), self.mode)?;
        Ok(Instance {
            ty: Arc::clone(self),
            shim: ShimRef::new(shim),
        })
    }

    /// A new instance forwarding to `chain`
    pub fn instantiate_over(self: &Arc<Self>, chain: Vec<Value>) -> Result<Instance> {
        Ok(Instance {
            ty: Arc::clone(self),
            shim: wrap(chain, &self.contract, self.mode)?,
        })
    }

    /// Adopt an existing shim, re-wrapping it if it presents another contract
    pub fn attach(self: &Arc<Self>, shim: ShimRef) -> Result<Instance> {
        self.instantiate_over(vec![Value::Shim(shim)])
    }
}

// ── Instance ──────────────────────────────────────────────

/// A value of a synthesized type
#[derive(Debug, Clone)]
pub struct Instance {
    ty: Arc<SynthesizedType>,
    shim: ShimRef,
}

impl Instance {
    pub fn synthesized_type(&self) -> &Arc<SynthesizedType> {
        &self.ty
    }

    pub fn shim(&self) -> &ShimRef {
        &self.shim
    }

    pub fn into_shim(self) -> ShimRef {
        self.shim
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.shim.get(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.shim.set(name, value)
    }

    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.shim.invoke(name, args)
    }

    pub fn get_as<T: ContractValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.get(name)?)
    }

    pub fn set_as<T: ContractValue>(&self, name: &str, value: T) -> Result<()> {
        self.shim.set(name, value.into_value())
    }

    pub fn call_as<R: ContractValue>(&self, name: &str, args: Vec<Value>) -> Result<R> {
        R::from_value(self.invoke(name, args)?)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Shim(instance.shim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapRef;
    use crate::types::TypeDesc;
    use crate::Error;
    use uuid::Uuid;

    fn person() -> Arc<Contract> {
        Contract::builder("Person")
            .doc("A person")
            .read_write("Name", TypeDesc::String)
            .read_only("Id", TypeDesc::Guid)
            .member(
                Member::method("Greet", [("who", TypeDesc::String)], TypeDesc::String)
                    .doc("Say hello"),
            )
            .build()
    }

    // ── Caching ───────────────────────────────────────────

    #[test]
    fn test_types_are_cached_per_fingerprint_and_mode() {
        let factory = ContractTypeFactory::new();
        let a = factory.make_type_for(&person(), MatchMode::Fuzzy).unwrap();
        let b = factory.make_type_for(&person(), MatchMode::Fuzzy).unwrap();
        let strict = factory.make_type_for(&person(), MatchMode::Strict).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &strict));
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn test_invalid_contract_fails_fast() {
        let factory = ContractTypeFactory::new();
        let broken = Contract::builder("Broken").read_write("", TypeDesc::Integer).build();
        assert!(matches!(
            factory.make_type_for(&broken, MatchMode::Fuzzy),
            Err(Error::InvalidContract { .. })
        ));
        assert!(factory.is_empty());
    }

    #[test]
    fn test_concurrent_requests_share_one_type() {
        let factory = Arc::new(ContractTypeFactory::new());
        let contract = person();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                let contract = Arc::clone(&contract);
                std::thread::spawn(move || factory.make_type_for(&contract, MatchMode::Fuzzy).unwrap())
            })
            .collect();
        let types: Vec<Arc<SynthesizedType>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(types.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn test_global_factory() {
        let a = ContractTypeFactory::global().make_type_for(&person(), MatchMode::Fuzzy).unwrap();
        let b = ContractTypeFactory::global().make_type_for(&person(), MatchMode::Fuzzy).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    // ── Slots ─────────────────────────────────────────────

    #[test]
    fn test_slot_table_and_annotations() {
        let ty = ContractTypeFactory::new().make_type_for(&person(), MatchMode::Fuzzy).unwrap();
        assert_eq!(ty.type_name(), "PersonShim");
        let names: Vec<&str> = ty.slots().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Name", "Id", "Greet"]);
        assert_eq!(ty.annotations().get("doc").map(String::as_str), Some("A person"));
        assert_eq!(
            ty.member_annotations("Greet").and_then(|a| a.get("doc")).map(String::as_str),
            Some("Say hello")
        );
        assert!(ty.slot("Missing").is_none());
    }

    // ── Instances ─────────────────────────────────────────

    #[test]
    fn test_instantiate_plain_data() {
        let ty = ContractTypeFactory::new().make_type_for(&person(), MatchMode::Strict).unwrap();
        let instance = ty.instantiate().unwrap();
        assert_eq!(instance.get_as::<String>("Name"), Ok(String::new()));
        instance.set_as("Name", "Ada".to_string()).unwrap();
        assert_eq!(instance.get_as::<String>("Name"), Ok("Ada".to_string()));
        assert_eq!(instance.get_as::<Uuid>("Id"), Ok(Uuid::nil()));
        assert!(matches!(instance.set("Id", Uuid::nil()), Err(Error::ReadOnlyMember { .. })));
        assert!(instance.invoke("Greet", vec![Value::from("x")]).is_err());
    }

    #[test]
    fn test_instantiate_over_map() {
        let ty = ContractTypeFactory::new().make_type_for(&person(), MatchMode::Fuzzy).unwrap();
        let map = MapRef::from_entries([("name", Value::from("Grace"))]);
        let instance = ty.instantiate_over(vec![Value::Map(map)]).unwrap();
        assert_eq!(instance.get_as::<String>("Name"), Ok("Grace".to_string()));
    }

    #[test]
    fn test_attach_existing_shim() {
        let ty = ContractTypeFactory::new().make_type_for(&person(), MatchMode::Fuzzy).unwrap();
        let shim = wrap(vec![Value::Map(MapRef::new())], &person(), MatchMode::Fuzzy).unwrap();
        let instance = ty.attach(shim.clone()).unwrap();
        assert!(instance.shim().ptr_eq(&shim));
    }

    #[test]
    fn test_types_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SynthesizedType>();
        assert_send_sync::<ContractTypeFactory>();
        assert_send_sync::<Contract>();
    }
}
