//! Dictionary-backed shims
//!
//! [`DictionaryShim`] presents a chain of string-keyed maps as a contract.
//! Contract member names are resolved among each map's keys (in sorted key
//! order) with the same tiers objects use. Method members are callables
//! stored under the method's key.
//!
//! # Nested members
//!
//! A contract-typed member backed by a nested map or object reads as a
//! child shim over it. When the entry is missing, the child is *detached*:
//! it wraps a fresh empty map and remembers where that map belongs. The
//! first write through the child attaches the map to its parent (and, for
//! deeper nesting, every detached ancestor), so reading a nested member
//! never mutates the backing maps.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::coerce::Coercer;
use crate::config::ShimConfig;
use crate::contract::{Contract, Member};
use crate::map::{read_only_error, MapRef};
use crate::resolver::{MatchMode, NameResolver};
use crate::shim::{chain_target, contract_target, Adapter, ShimRef};
use crate::translate::KeyTranslatingMap;
use crate::types::TypeDesc;
use crate::{Error, Result, Value};

/// Where a detached child's map goes once it is first written
#[derive(Debug)]
struct PendingLink {
    parent: MapRef,
    key: String,
    /// Link of the parent map itself, when the parent is detached too
    upstream: Option<Rc<PendingLink>>,
}

impl PendingLink {
    /// Make sure `own` is reachable from the root; returns the map that
    /// actually sits at this position, which differs from `own` when some
    /// other writer created the nested map first.
    fn attach(&self, own: &MapRef) -> Result<MapRef> {
        let parent = match &self.upstream {
            Some(upstream) => upstream.attach(&self.parent)?,
            None => self.parent.clone(),
        };
        match parent.get(&self.key) {
            Some(Value::Map(existing)) => Ok(existing),
            _ => {
                if parent.is_read_only() {
                    return Err(read_only_error());
                }
                parent.insert(self.key.clone(), Value::Map(own.clone()))?;
                tracing::debug!(key = %self.key, "attached nested map to parent");
                Ok(own.clone())
            }
        }
    }

    fn is_attached(&self, own: &MapRef) -> bool {
        let linked = matches!(self.parent.get(&self.key), Some(Value::Map(m)) if m.ptr_eq(own));
        linked
            && self
                .upstream
                .as_ref()
                .map_or(true, |upstream| upstream.is_attached(&self.parent))
    }
}

struct CachedChild {
    /// Backing value the child wraps
    source: Value,
    handle: ShimRef,
}

/// A contract view over a chain of string-keyed maps
pub struct DictionaryShim {
    contract: Arc<Contract>,
    maps: Vec<MapRef>,
    config: ShimConfig,
    pending: Option<Rc<PendingLink>>,
    children: HashMap<String, CachedChild>,
}

impl DictionaryShim {
    pub fn new(maps: Vec<MapRef>, contract: Arc<Contract>, mode: MatchMode) -> Result<Self> {
        Self::with_config(maps, contract, ShimConfig::from(mode))
    }

    pub fn with_config(maps: Vec<MapRef>, contract: Arc<Contract>, config: ShimConfig) -> Result<Self> {
        contract.validate()?;
        if maps.is_empty() {
            return Err(Error::InvalidOperation("backing chain must not be empty".into()));
        }
        Ok(DictionaryShim {
            contract,
            maps,
            config,
            pending: None,
            children: HashMap::new(),
        })
    }

    /// Shim over the keys of `map` that start with `prefix`
    pub fn with_key_prefix(
        map: MapRef,
        prefix: &str,
        contract: Arc<Contract>,
        mode: MatchMode,
    ) -> Result<Self> {
        let view = MapRef::from_dictionary(KeyTranslatingMap::with_prefix(map, prefix));
        Self::new(vec![view], contract, mode)
    }

    fn detached(contract: Arc<Contract>, config: ShimConfig, link: PendingLink) -> Result<Self> {
        let mut shim = Self::with_config(vec![MapRef::new()], contract, config)?;
        shim.pending = Some(Rc::new(link));
        Ok(shim)
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

    /// Key in `map` matching a contract member name
    fn find_key(&self, map: &MapRef, name: &str) -> Option<String> {
        let mut keys = map.keys();
        keys.sort();
        NameResolver::new(self.config.mode)
            .resolve(name, &keys)
            .map(|resolution| resolution.name)
    }

    /// First map holding a key for `name`, with that key
    fn locate(&self, name: &str) -> Option<(MapRef, String)> {
        self.maps
            .iter()
            .find_map(|map| self.find_key(map, name).map(|key| (map.clone(), key)))
    }

    fn read_child(&mut self, member: &Member, nested: Arc<Contract>) -> Result<Value> {
        let located = self.locate(member.name());
        let raw = located
            .as_ref()
            .and_then(|(map, key)| map.get(key))
            .filter(|v| !v.is_null());

        if let Some(cached) = self.children.get(member.name()) {
            let fresh = match &raw {
                Some(raw) => cached.source.same_instance(raw),
                None => cached.handle.is_detached(),
            };
            if fresh {
                return Ok(Value::Shim(cached.handle.clone()));
            }
        }

        let (source, handle) = match raw {
            Some(raw) => match self.coercer().coerce(raw.clone(), member.ty()) {
                Value::Shim(handle) => (raw, handle),
                other => return Ok(other),
            },
            None if matches!(member.ty(), TypeDesc::Nullable(_)) => return Ok(Value::Null),
            None => {
                let (parent, key) = located.unwrap_or_else(|| (self.maps[0].clone(), member.name().to_string()));
                let link = PendingLink {
                    parent,
                    key,
                    upstream: self.pending.clone(),
                };
                let child = DictionaryShim::detached(nested, self.config, link)?;
                let source = Value::Map(child.maps[0].clone());
                (source, ShimRef::new(child))
            }
        };
        self.children.insert(
            member.name().to_string(),
            CachedChild {
                source,
                handle: handle.clone(),
            },
        );
        Ok(Value::Shim(handle))
    }

    fn ensure_attached(&mut self) -> Result<()> {
        if let Some(link) = self.pending.clone() {
            let attached = link.attach(&self.maps[0])?;
            if !attached.ptr_eq(&self.maps[0]) {
                tracing::debug!(contract = self.contract.name(), "retargeted to existing nested map");
                self.maps = vec![attached];
                self.children.clear();
            }
            self.pending = None;
        }
        Ok(())
    }
}

impl Adapter for DictionaryShim {
    fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    fn config(&self) -> ShimConfig {
        self.config
    }

    fn backing(&self) -> Vec<Value> {
        self.maps.iter().cloned().map(Value::Map).collect()
    }

    fn replace_backing(&mut self, chain: Vec<Value>) -> Result<()> {
        if chain.is_empty() {
            return Err(Error::InvalidOperation("backing chain must not be empty".into()));
        }
        let maps = chain
            .into_iter()
            .map(|value| match value {
                Value::Map(map) => Ok(map),
                other => Err(Error::InvalidOperation(format!(
                    "dictionary shim cannot be backed by {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        self.maps = maps;
        self.pending = None;
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
        if let Some(nested) = member.ty().contract_target() {
            return self.read_child(&member, Arc::clone(nested));
        }
        let raw = self
            .locate(member.name())
            .and_then(|(map, key)| map.get(&key));
        Ok(match raw {
            Some(raw) => self.coercer().coerce(raw, member.ty()),
            None => member.ty().default_value(),
        })
    }

    fn set_member(&mut self, name: &str, value: Value) -> Result<()> {
        let member = self.resolve_property(name)?;
        if !member.is_writable() {
            return Err(Error::ReadOnlyMember {
                member: member.name().to_string(),
                contract: self.contract.name().to_string(),
            });
        }
        let value = self.coercer().prepare_write(value, member.ty(), &TypeDesc::Any);
        self.ensure_attached()?;
        let (map, key) = self
            .locate(member.name())
            .unwrap_or_else(|| (self.maps[0].clone(), member.name().to_string()));
        map.insert(key, value.clone())?;
        let stale = self
            .children
            .get(member.name())
            .is_some_and(|cached| !cached.source.same_instance(&value));
        if stale {
            self.children.remove(member.name());
        }
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
        let coercer = self.coercer();
        let args = coercer.coerce_args(args, method.params());
        let (map, key) = self.locate(method.name()).ok_or_else(|| Error::MethodNotFound {
            method: method.name().to_string(),
            arity,
            target: chain_target(&self.contract),
        })?;
        match map.get(&key) {
            Some(Value::Function(callable)) => Ok(coercer.coerce(callable.call(args)?, method.ty())),
            other => Err(Error::InvocationFailed {
                method: method.name().to_string(),
                reason: format!(
                    "value under key '{}' is {}, not a function",
                    key,
                    other.map_or("missing", |v| v.type_name())
                ),
            }),
        }
    }

    fn is_detached(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|link| !link.is_attached(&self.maps[0]))
    }
}

impl fmt::Debug for DictionaryShim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryShim")
            .field("contract", &self.contract.name())
            .field("maps", &self.maps)
            .field("config", &self.config)
            .field("detached", &self.is_detached())
            .finish_non_exhaustive()
    }
}
