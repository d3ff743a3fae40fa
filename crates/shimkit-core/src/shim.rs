//! Object-backed shims
//!
//! A [`Shim`] makes an ordered chain of reflective objects look like one
//! value satisfying a contract. Every access first resolves the requested
//! name against the contract, then walks the backing chain looking for an
//! object whose own shape declares a matching member. Earlier entries win.
//!
//! Members whose declared type is itself a contract come back as child
//! shims. Children are cached per member and rebuilt only when the backing
//! value they wrap is replaced, so repeated reads return the same handle
//! while a swapped-out nested object is never served stale.

use std::cell::{RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::coerce::{first_mismatch, Coercer};
use crate::config::ShimConfig;
use crate::contract::{Contract, Member};
use crate::dictionary::DictionaryShim;
use crate::object::ObjectRef;
use crate::resolver::MatchMode;
use crate::{Error, Result, Value};

/// Behaviour shared by every shim flavour
pub trait Adapter {
    fn contract(&self) -> &Arc<Contract>;

    fn config(&self) -> ShimConfig;

    /// The backing chain, earliest first
    fn backing(&self) -> Vec<Value>;

    /// Swap the backing chain; cached children are dropped
    fn replace_backing(&mut self, chain: Vec<Value>) -> Result<()>;

    fn get_member(&mut self, name: &str) -> Result<Value>;

    fn set_member(&mut self, name: &str, value: Value) -> Result<()>;

    fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;

    /// True for a nested view not yet attached to any backing storage
    fn is_detached(&self) -> bool {
        false
    }
}

// ── Shared handle ─────────────────────────────────────────

/// Shared handle to a shim
#[derive(Clone)]
pub struct ShimRef(Rc<RefCell<dyn Adapter>>);

impl ShimRef {
    pub fn new<A: Adapter + 'static>(adapter: A) -> Self {
        ShimRef(Rc::new(RefCell::new(adapter)))
    }

    fn adapter(&self) -> Result<RefMut<'_, dyn Adapter + 'static>> {
        self.0
            .try_borrow_mut()
            .map_err(|_| Error::InvalidOperation("shim is already in use".into()))
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.adapter()?.get_member(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.adapter()?.set_member(name, value.into())
    }

    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.adapter()?.invoke(name, args)
    }

    pub fn replace_backing(&self, chain: Vec<Value>) -> Result<()> {
        self.adapter()?.replace_backing(chain)
    }

    pub fn contract(&self) -> Arc<Contract> {
        Arc::clone(self.0.borrow().contract())
    }

    pub fn mode(&self) -> MatchMode {
        self.0.borrow().config().mode
    }

    pub fn config(&self) -> ShimConfig {
        self.0.borrow().config()
    }

    pub fn backing(&self) -> Vec<Value> {
        self.0.borrow().backing()
    }

    /// First non-null backing value, or null
    pub fn primary_backing(&self) -> Value {
        self.backing()
            .into_iter()
            .find(|v| !v.is_null())
            .unwrap_or(Value::Null)
    }

    pub fn is_detached(&self) -> bool {
        self.0.borrow().is_detached()
    }

    /// Whether this shim already presents `contract`
    pub fn satisfies(&self, contract: &Contract) -> bool {
        self.0.borrow().contract().same_shape(contract)
    }

    /// Every readable contract property, read through the shim
    pub fn snapshot(&self) -> Result<BTreeMap<String, Value>> {
        let contract = self.contract();
        contract
            .catalog()
            .properties()
            .iter()
            .filter(|m| m.is_readable())
            .map(|m| Ok((m.name().to_string(), self.get(m.name())?)))
            .collect()
    }

    /// True when both handles point at the same shim
    pub fn ptr_eq(&self, other: &ShimRef) -> bool {
        Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
    }
}

impl fmt::Debug for ShimRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(shim) => write!(f, "ShimRef({})", shim.contract().name()),
            Err(_) => write!(f, "ShimRef(<borrowed>)"),
        }
    }
}

// ── Front door ────────────────────────────────────────────

/// Wrap a backing chain in the shim flavour that fits it.
///
/// Maps get a [`DictionaryShim`], objects (and nulls) a [`Shim`]. A lone
/// shim already presenting `contract` is returned as-is; other shims in the
/// chain are replaced by their own backing values.
pub fn wrap(chain: Vec<Value>, contract: &Arc<Contract>, mode: MatchMode) -> Result<ShimRef> {
    wrap_with(chain, contract, ShimConfig::from(mode))
}

pub fn wrap_with(chain: Vec<Value>, contract: &Arc<Contract>, config: ShimConfig) -> Result<ShimRef> {
    if chain.is_empty() {
        return Err(empty_chain());
    }
    if let [Value::Shim(shim)] = chain.as_slice() {
        if shim.satisfies(contract) {
            return Ok(shim.clone());
        }
    }

    let mut flat = Vec::with_capacity(chain.len());
    for value in chain {
        match value {
            Value::Shim(shim) => flat.extend(shim.backing()),
            other => flat.push(other),
        }
    }

    if !flat.is_empty() && flat.iter().all(|v| matches!(v, Value::Map(_))) {
        let maps = flat
            .into_iter()
            .filter_map(|v| match v {
                Value::Map(map) => Some(map),
                _ => None,
            })
            .collect();
        return Ok(ShimRef::new(DictionaryShim::with_config(
            maps,
            Arc::clone(contract),
            config,
        )?));
    }
    Ok(ShimRef::new(Shim::with_config(flat, Arc::clone(contract), config)?))
}

fn empty_chain() -> Error {
    Error::InvalidOperation("backing chain must not be empty".into())
}

pub(crate) fn contract_target(contract: &Contract) -> String {
    format!("contract '{}'", contract.name())
}

pub(crate) fn chain_target(contract: &Contract) -> String {
    format!("backing chain of contract '{}'", contract.name())
}

// ── Object shim ───────────────────────────────────────────

struct CachedChild {
    /// Backing value the child wraps
    source: Value,
    handle: Value,
}

/// A contract view over a chain of reflective objects
pub struct Shim {
    contract: Arc<Contract>,
    chain: Vec<Value>,
    config: ShimConfig,
    children: HashMap<String, CachedChild>,
}

impl Shim {
    pub fn new(chain: Vec<Value>, contract: Arc<Contract>, mode: MatchMode) -> Result<Self> {
        Self::with_config(chain, contract, ShimConfig::from(mode))
    }

    pub fn with_config(chain: Vec<Value>, contract: Arc<Contract>, config: ShimConfig) -> Result<Self> {
        contract.validate()?;
        check_object_chain(&chain)?;
        Ok(Shim {
            contract,
            chain,
            config,
            children: HashMap::new(),
        })
    }

    fn coercer(&self) -> Coercer {
        Coercer::with_config(self.config)
    }

    fn resolve_property(&self, name: &str) -> Result<Member> {
        self.contract
            .catalog()
            .property(name, self.config.mode)
            .cloned()
            .ok_or_else(|| Error::MemberNotFound {
                member: name.to_string(),
                target: contract_target(&self.contract),
            })
    }

    fn objects(&self) -> impl Iterator<Item = &ObjectRef> {
        self.chain.iter().filter_map(Value::as_object)
    }

    /// Raw value of the first backing object with a readable match
    fn read_backing(&self, member: &Member) -> Option<Value> {
        self.objects().find_map(|object| {
            let shape = object.shape();
            let found = shape.catalog().property(member.name(), self.config.mode)?;
            if !found.is_readable() {
                return None;
            }
            Some(
                object
                    .get(found.name())
                    .unwrap_or_else(|| found.ty().default_value()),
            )
        })
    }

    fn read_child(&mut self, member: &Member, raw: Value) -> Value {
        if raw.is_null() {
            self.children.remove(member.name());
            return Value::Null;
        }
        if let Some(cached) = self.children.get(member.name()) {
            if cached.source.same_instance(&raw) {
                return cached.handle.clone();
            }
        }
        let handle = self.coercer().coerce(raw.clone(), member.ty());
        if handle.as_shim().is_some() {
            self.children.insert(
                member.name().to_string(),
                CachedChild {
                    source: raw,
                    handle: handle.clone(),
                },
            );
        }
        handle
    }

    fn call_backing(
        &self,
        object: &ObjectRef,
        contract_method: &Member,
        callee: &Member,
        args: Vec<Value>,
    ) -> Result<Value> {
        let coercer = self.coercer();
        let args = match first_mismatch(&args, callee.params()) {
            None => args,
            Some(_) if self.config.allows_call_through() => {
                tracing::debug!(method = callee.name(), "coercing arguments for call-through");
                coercer.coerce_args(args, callee.params())
            }
            Some(index) => {
                return Err(Error::ArgumentMismatch {
                    method: callee.name().to_string(),
                    index,
                    expected: callee.params()[index].ty.to_string(),
                    found: args[index].type_name().to_string(),
                })
            }
        };
        let result = match object.invoke(callee, args.clone()) {
            Err(err) if err.is_argument_mismatch() && self.config.allows_call_through() => {
                tracing::debug!(method = callee.name(), %err, "retrying call with coerced arguments");
                object.invoke(callee, coercer.coerce_args(args, callee.params()))?
            }
            other => other?,
        };
        Ok(coercer.coerce(result, contract_method.ty()))
    }
}

fn check_object_chain(chain: &[Value]) -> Result<()> {
    if chain.is_empty() {
        return Err(empty_chain());
    }
    match chain
        .iter()
        .find(|v| !matches!(v, Value::Object(_) | Value::Null))
    {
        Some(other) => Err(Error::InvalidOperation(format!(
            "object shim cannot be backed by {}",
            other.type_name()
        ))),
        None => Ok(()),
    }
}

impl Adapter for Shim {
    fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    fn config(&self) -> ShimConfig {
        self.config
    }

    fn backing(&self) -> Vec<Value> {
        self.chain.clone()
    }

    fn replace_backing(&mut self, chain: Vec<Value>) -> Result<()> {
        check_object_chain(&chain)?;
        self.chain = chain;
        self.children.clear();
        Ok(())
    }

    fn get_member(&mut self, name: &str) -> Result<Value> {
        let member = self.resolve_property(name)?;
        if !member.is_readable() {
            return Err(Error::WriteOnlyMember {
                member: member.name().to_string(),
                contract: self.contract.name().to_string(),
            });
        }
        let raw = match self.read_backing(&member) {
            Some(raw) => raw,
            // only null entries: nothing to consult
            None if self.objects().next().is_none() => return Ok(member.ty().default_value()),
            None => {
                return Err(Error::MemberNotFound {
                    member: member.name().to_string(),
                    target: chain_target(&self.contract),
                })
            }
        };
        if member.ty().contract_target().is_some() {
            return Ok(self.read_child(&member, raw));
        }
        Ok(self.coercer().coerce(raw, member.ty()))
    }

    fn set_member(&mut self, name: &str, value: Value) -> Result<()> {
        let member = self.resolve_property(name)?;
        if !member.is_writable() {
            return Err(Error::ReadOnlyMember {
                member: member.name().to_string(),
                contract: self.contract.name().to_string(),
            });
        }
        let coercer = self.coercer();
        let destination = self.objects().find_map(|object| {
            let shape = object.shape();
            let found = shape.catalog().property(member.name(), self.config.mode)?;
            found.is_writable().then(|| (object.clone(), found.clone()))
        });
        let (object, slot) = destination.ok_or_else(|| Error::MemberNotFound {
            member: member.name().to_string(),
            target: chain_target(&self.contract),
        })?;
        let value = coercer.prepare_write(value, member.ty(), slot.ty());
        object.set(slot.name(), value)?;
        self.children.remove(member.name());
        Ok(())
    }

    fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let arity = args.len();
        let method = self
            .contract
            .catalog()
            .method(name, arity, self.config.mode)
            .cloned()
            .ok_or_else(|| Error::MethodNotFound {
                method: name.to_string(),
                arity,
                target: contract_target(&self.contract),
            })?;
        let args = self.coercer().coerce_args(args, method.params());
        for object in self.objects() {
            let shape = object.shape();
            if let Some(callee) = shape.catalog().method(method.name(), arity, self.config.mode) {
                return self.call_backing(object, &method, callee, args);
            }
        }
        Err(Error::MethodNotFound {
            method: method.name().to_string(),
            arity,
            target: chain_target(&self.contract),
        })
    }
}

impl fmt::Debug for Shim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shim")
            .field("contract", &self.contract.name())
            .field("chain", &self.chain)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
