//! Shared configuration store.
//!
//! The store is the one mutable resource shared outside the bus. The sync
//! controller pushes and pulls snapshots of it; anyone else (a GUI, an
//! operator) may edit it in between.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use mapbridge_types::ParameterTable;

/// Flat string-keyed, string-valued parameter server.
pub trait ParamStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-process [`ParamStore`].
#[derive(Debug, Default)]
pub struct MemoryParamStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every key currently held, including ones no default knows.
    pub fn snapshot(&self) -> ParameterTable {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl ParamStore for MemoryParamStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let store = MemoryParamStore::new();
        assert!(store.is_empty());
        store.set("Mem/STMSize", "10");
        store.set("Mem/STMSize", "12");
        assert_eq!(store.get("Mem/STMSize").as_deref(), Some("12"));
        assert_eq!(store.get("Kp/MaxFeatures"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_is_ordered_copy() {
        let store = MemoryParamStore::new();
        store.set("b", "2");
        store.set("a", "1");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        store.set("a", "changed");
        assert_eq!(snapshot.get("a"), Some("1"));
    }
}
