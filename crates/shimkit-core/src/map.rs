//! String-keyed dictionaries used as backing stores
//!
//! [`Dictionary`] is the full mutable-map contract shared by plain maps,
//! read-only maps and translating views. [`MapRef`] is the shared handle
//! that values, shims and views hold onto, so a nested map read out of a
//! parent is the same storage the parent keeps.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::{Error, Result, Value};

/// Mutable string-keyed map contract
pub trait Dictionary {
    fn get(&self, key: &str) -> Option<Value>;

    /// Insert a value, returning the previous one
    fn insert(&mut self, key: String, value: Value) -> Result<Option<Value>>;

    fn remove(&mut self, key: &str) -> Result<Option<Value>>;

    fn clear(&mut self) -> Result<()>;

    /// Keys in iteration order
    fn keys(&self) -> Vec<String>;

    /// Entries in iteration order
    fn entries(&self) -> Vec<(String, Value)>;

    fn len(&self) -> usize;

    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_read_only(&self) -> bool {
        false
    }
}

/// The error every write against a read-only collection produces
pub fn read_only_error() -> Error {
    Error::InvalidOperation("collection is read-only".into())
}

impl Dictionary for BTreeMap<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        BTreeMap::get(self, key).cloned()
    }

    fn insert(&mut self, key: String, value: Value) -> Result<Option<Value>> {
        Ok(BTreeMap::insert(self, key, value))
    }

    fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        Ok(BTreeMap::remove(self, key))
    }

    fn clear(&mut self) -> Result<()> {
        BTreeMap::clear(self);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        BTreeMap::keys(self).cloned().collect()
    }

    fn entries(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn contains_key(&self, key: &str) -> bool {
        BTreeMap::contains_key(self, key)
    }
}

/// A frozen map: reads pass through, every write fails
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyMap(BTreeMap<String, Value>);

impl ReadOnlyMap {
    pub fn new(entries: BTreeMap<String, Value>) -> Self {
        ReadOnlyMap(entries)
    }
}

impl Dictionary for ReadOnlyMap {
    fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key).cloned()
    }

    fn insert(&mut self, _key: String, _value: Value) -> Result<Option<Value>> {
        Err(read_only_error())
    }

    fn remove(&mut self, _key: &str) -> Result<Option<Value>> {
        Err(read_only_error())
    }

    fn clear(&mut self) -> Result<()> {
        Err(read_only_error())
    }

    fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    fn entries(&self) -> Vec<(String, Value)> {
        Dictionary::entries(&self.0)
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

// ── Shared handle ─────────────────────────────────────────

/// Shared, interior-mutable handle to a dictionary
#[derive(Clone)]
pub struct MapRef(Rc<RefCell<dyn Dictionary>>);

impl MapRef {
    /// A fresh, empty, writable map
    pub fn new() -> Self {
        Self::from_dictionary(BTreeMap::<String, Value>::new())
    }

    pub fn from_dictionary<D: Dictionary + 'static>(dictionary: D) -> Self {
        MapRef(Rc::new(RefCell::new(dictionary)))
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map: BTreeMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        Self::from_dictionary(map)
    }

    pub fn read_only<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map: BTreeMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        Self::from_dictionary(ReadOnlyMap::new(map))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key)
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.0.borrow_mut().remove(key)
    }

    pub fn clear(&self) -> Result<()> {
        self.0.borrow_mut().clear()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.borrow().entries()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn is_read_only(&self) -> bool {
        self.0.borrow().is_read_only()
    }

    /// True when both handles point at the same storage
    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
    }
}

impl Default for MapRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(map) => f.debug_map().entries(map.entries()).finish(),
            Err(_) => write!(f, "MapRef(<borrowed>)"),
        }
    }
}
