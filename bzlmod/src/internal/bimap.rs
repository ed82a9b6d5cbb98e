use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// A map that is injective in both directions: every key maps to exactly one
/// value and every value is mapped to by exactly one key.
///
/// Iteration preserves insertion order. Injectivity is enforced at insert
/// time.
#[derive(Clone)]
pub struct BiMap<K, V> {
    forward: IndexMap<K, V>,
    inverse: IndexMap<V, K>,
}

/// Which side of a [`BiMap`] an insert collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Key,
    Value,
}

impl<K, V> BiMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            forward: IndexMap::new(),
            inverse: IndexMap::new(),
        }
    }

    /// Inserts a pair, failing without modification if either the key or
    /// the value is already present.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(), Collision> {
        if self.forward.contains_key(&key) {
            return Err(Collision::Key);
        }
        if self.inverse.contains_key(&value) {
            return Err(Collision::Value);
        }
        self.forward.insert(key.clone(), value.clone());
        self.inverse.insert(value, key);
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.forward.get(key)
    }

    pub fn get_by_value(&self, value: &V) -> Option<&K> {
        self.inverse.get(value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.inverse.contains_key(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.forward.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.forward.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.forward.values()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl<K, V> Default for BiMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> PartialEq for BiMap<K, V>
where
    K: Hash + Eq,
    V: Hash + Eq,
{
    fn eq(&self, other: &Self) -> bool {
        self.forward == other.forward
    }
}

impl<K, V> Eq for BiMap<K, V>
where
    K: Hash + Eq,
    V: Hash + Eq,
{
}

impl<K, V> fmt::Debug for BiMap<K, V>
where
    K: fmt::Debug + Hash + Eq,
    V: fmt::Debug + Hash + Eq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.forward.iter()).finish()
    }
}

impl<K, V> Serialize for BiMap<K, V>
where
    K: Serialize + Hash + Eq,
    V: Serialize + Hash + Eq,
{
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.forward.serialize(s)
    }
}

impl<K, V> FromIterator<(K, V)> for BiMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    /// Panics on duplicate keys or values; use [`BiMap::try_insert`] when
    /// collisions are expected.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            assert!(
                map.try_insert(key, value).is_ok(),
                "duplicate entry in BiMap::from_iter"
            );
        }
        map
    }
}
