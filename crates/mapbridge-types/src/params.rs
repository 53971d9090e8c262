//! Flat engine parameter table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered map of namespaced parameter name to string-encoded value.
///
/// Iteration is in ascending key order, so two tables with the same content
/// always serialise identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTable(BTreeMap<String, String>);

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Treat `self` as the default set and overlay values returned by
    /// `lookup`.
    ///
    /// The result holds exactly the keys of `self`: a key `lookup` knows
    /// takes its value, every other key keeps the default. Keys only
    /// `lookup` knows are never introduced.
    pub fn overlay<F>(&self, mut lookup: F) -> ParameterTable
    where
        F: FnMut(&str) -> Option<String>,
    {
        self.0
            .iter()
            .map(|(key, default)| {
                let value = lookup(key).unwrap_or_else(|| default.clone());
                (key.clone(), value)
            })
            .collect()
    }

    /// [`overlay`](Self::overlay) with another table as the override source.
    pub fn overlay_table(&self, overrides: &ParameterTable) -> ParameterTable {
        self.overlay(|key| overrides.get(key).map(str::to_owned))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for ParameterTable {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
