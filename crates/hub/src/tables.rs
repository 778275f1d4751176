//! A generic key-value table: a `Table<K, V>` newtype over `ahash::HashMap`,
//! a thin `Deref`/`DerefMut` wrapper, left un-synchronised itself. Callers
//! wrap the whole table in a `parking_lot::RwLock` at the field site, so
//! read-only snapshot access never blocks writers any longer than the
//! snapshot copy takes.

use ahash::{HashMap, HashMapExt};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

pub struct Table<K, V>(HashMap<K, V>);

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<K, V> Deref for Table<K, V> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K, V> DerefMut for Table<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Table<K, V> {
    /// Snapshots every value under the caller's read lock so iteration can
    /// continue without holding it.
    pub fn snapshot(&self) -> Vec<V> {
        self.0.values().cloned().collect()
    }

    /// Snapshots key-value pairs, for callers that need both (e.g. excluding
    /// one connection from a broadcast).
    pub fn snapshot_entries(&self) -> Vec<(K, V)> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}
