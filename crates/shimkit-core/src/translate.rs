//! Key-translating dictionary views
//!
//! A [`KeyTranslatingMap`] presents an underlying map under different key
//! names. Callers see *logical* keys; the underlying map stores *native*
//! keys. `to_native` maps every logical key to its native form, and
//! `from_native` maps back, returning `None` for native keys the view hides.
//! Values are never transformed and nothing is cached, so the view always
//! reflects the underlying map's current contents.

use std::fmt;
use std::rc::Rc;

use crate::map::{read_only_error, Dictionary, MapRef};
use crate::{Result, Value};

type ToNative = Rc<dyn Fn(&str) -> String>;
type FromNative = Rc<dyn Fn(&str) -> Option<String>>;

/// A dictionary view that renames keys on the way in and out
#[derive(Clone)]
pub struct KeyTranslatingMap {
    inner: MapRef,
    to_native: ToNative,
    from_native: FromNative,
}

impl KeyTranslatingMap {
    pub fn new(
        inner: MapRef,
        to_native: impl Fn(&str) -> String + 'static,
        from_native: impl Fn(&str) -> Option<String> + 'static,
    ) -> Self {
        KeyTranslatingMap {
            inner,
            to_native: Rc::new(to_native),
            from_native: Rc::new(from_native),
        }
    }

    /// View of the keys starting with `prefix`, with the prefix removed
    pub fn with_prefix(inner: MapRef, prefix: &str) -> Self {
        let add = prefix.to_string();
        let strip = prefix.to_string();
        Self::new(
            inner,
            move |key| format!("{}{}", add, key),
            move |native| native.strip_prefix(strip.as_str()).map(str::to_string),
        )
    }

    /// View of the keys ending with `suffix`, with the suffix removed
    pub fn with_suffix(inner: MapRef, suffix: &str) -> Self {
        let add = suffix.to_string();
        let strip = suffix.to_string();
        Self::new(
            inner,
            move |key| format!("{}{}", key, add),
            move |native| native.strip_suffix(strip.as_str()).map(str::to_string),
        )
    }

    pub fn inner(&self) -> &MapRef {
        &self.inner
    }

    fn guard_writable(&self) -> Result<()> {
        if self.inner.is_read_only() {
            Err(read_only_error())
        } else {
            Ok(())
        }
    }

    /// Native key, but only when it maps back into this view
    fn visible_native(&self, key: &str) -> Option<String> {
        let native = (self.to_native)(key);
        match (self.from_native)(&native) {
            Some(logical) if logical == key => Some(native),
            _ => None,
        }
    }
}

impl Dictionary for KeyTranslatingMap {
    fn get(&self, key: &str) -> Option<Value> {
        self.visible_native(key)
            .and_then(|native| self.inner.get(&native))
    }

    fn insert(&mut self, key: String, value: Value) -> Result<Option<Value>> {
        self.guard_writable()?;
        let native = (self.to_native)(&key);
        self.inner.insert(native, value)
    }

    fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        self.guard_writable()?;
        match self.visible_native(key) {
            Some(native) => self.inner.remove(&native),
            None => Ok(None),
        }
    }

    /// Removes only the entries visible through this view
    fn clear(&mut self) -> Result<()> {
        self.guard_writable()?;
        for native in self.inner.keys() {
            if (self.from_native)(&native).is_some() {
                self.inner.remove(&native)?;
            }
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.inner
            .keys()
            .iter()
            .filter_map(|native| (self.from_native)(native))
            .collect()
    }

    fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .entries()
            .into_iter()
            .filter_map(|(native, value)| (self.from_native)(&native).map(|key| (key, value)))
            .collect()
    }

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.visible_native(key)
            .is_some_and(|native| self.inner.contains_key(&native))
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }
}

impl fmt::Debug for KeyTranslatingMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyTranslatingMap")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
