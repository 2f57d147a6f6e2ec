//! The authoritative record of what is programmed.
//!
//! `AuthoritativeTable` maps a change-stream key to whatever the owning orch
//! needs to remember about the programmed object (hardware identity plus the
//! logical attributes it was created with). It never creates entries
//! implicitly: `get` on a missing key returns `None`, and the refcount API
//! fails on a missing key instead of vivifying a zeroed entry.

use std::collections::HashMap;

use thiserror::Error;

/// Error type for AuthoritativeTable operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Reference count underflow: {0}")]
    RefCountUnderflow(String),
}

/// Trait for values that carry a reference count.
pub trait HasRefCount {
    /// Increments the reference count and returns the new value.
    fn increment_ref(&mut self) -> u32;

    /// Decrements the reference count and returns the new value.
    ///
    /// Returns `None` if the count would underflow.
    fn decrement_ref(&mut self) -> Option<u32>;

    /// Returns the current reference count.
    fn ref_count(&self) -> u32;
}

/// Keyed store of programmed objects.
///
/// # Example
///
/// ```
/// use sonic_orch_common::AuthoritativeTable;
///
/// let mut table: AuthoritativeTable<u64> = AuthoritativeTable::new();
/// assert!(table.get("Vnet1").is_none());
/// assert!(table.is_empty());
///
/// table.insert("Vnet1", 0x7a00000000001);
/// assert_eq!(table.get("Vnet1"), Some(&0x7a00000000001));
/// ```
#[derive(Debug, Clone)]
pub struct AuthoritativeTable<V> {
    inner: HashMap<String, V>,
}

impl<V> AuthoritativeTable<V> {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the entry for a key. Never creates entries.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.get(key)
    }

    /// Returns the entry for a key mutably. Never creates entries.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Records a programmed object, returning the entry it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.inner.insert(key.into(), value)
    }

    /// Forgets a programmed object.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.inner.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.inner.keys()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<V: HasRefCount> AuthoritativeTable<V> {
    /// Increments the reference count of an existing entry.
    pub fn increment_ref(&mut self, key: &str) -> Result<u32, TableError> {
        self.inner
            .get_mut(key)
            .map(HasRefCount::increment_ref)
            .ok_or_else(|| TableError::KeyNotFound(key.to_string()))
    }

    /// Decrements the reference count of an existing entry.
    pub fn decrement_ref(&mut self, key: &str) -> Result<u32, TableError> {
        match self.inner.get_mut(key) {
            Some(entry) => entry
                .decrement_ref()
                .ok_or_else(|| TableError::RefCountUnderflow(key.to_string())),
            None => Err(TableError::KeyNotFound(key.to_string())),
        }
    }

    /// Returns the reference count, `None` for a missing key.
    pub fn ref_count(&self, key: &str) -> Option<u32> {
        self.inner.get(key).map(HasRefCount::ref_count)
    }
}

impl<V> Default for AuthoritativeTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct SharedObject {
        ref_count: u32,
    }

    impl HasRefCount for SharedObject {
        fn increment_ref(&mut self) -> u32 {
            self.ref_count += 1;
            self.ref_count
        }

        fn decrement_ref(&mut self) -> Option<u32> {
            self.ref_count = self.ref_count.checked_sub(1)?;
            Some(self.ref_count)
        }

        fn ref_count(&self) -> u32 {
            self.ref_count
        }
    }

    #[test]
    fn test_basic_operations() {
        let mut table: AuthoritativeTable<i32> = AuthoritativeTable::new();
        assert!(table.is_empty());

        assert_eq!(table.insert("key", 42), None);
        assert_eq!(table.insert("key", 43), Some(42));
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove("key"), Some(43));
        assert!(table.is_empty());
    }

    #[test]
    fn test_get_never_creates() {
        let mut table: AuthoritativeTable<i32> = AuthoritativeTable::new();
        assert!(table.get("missing").is_none());
        assert!(table.get_mut("missing").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_refcount_requires_existing_key() {
        let mut table: AuthoritativeTable<SharedObject> = AuthoritativeTable::new();
        assert_eq!(
            table.increment_ref("vnet1:1.1.1.1"),
            Err(TableError::KeyNotFound("vnet1:1.1.1.1".to_string()))
        );
        assert!(table.is_empty());

        table.insert("vnet1:1.1.1.1", SharedObject { ref_count: 1 });
        assert_eq!(table.increment_ref("vnet1:1.1.1.1"), Ok(2));
        assert_eq!(table.ref_count("vnet1:1.1.1.1"), Some(2));
    }

    #[test]
    fn test_refcount_underflow() {
        let mut table: AuthoritativeTable<SharedObject> = AuthoritativeTable::new();
        table.insert("k", SharedObject { ref_count: 1 });

        assert_eq!(table.decrement_ref("k"), Ok(0));
        assert_eq!(
            table.decrement_ref("k"),
            Err(TableError::RefCountUnderflow("k".to_string()))
        );
    }
}
