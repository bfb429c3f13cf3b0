//! Variable Assignments
//!
//! One assignment binds every key of a layer to a value, and becomes one
//! job instance. The order of assignments inside a [`VariableSet`] is the
//! job index, so it must be preserved end to end.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::value::Value;

/// Identifier extracted from a job's argument template.
pub type Key = String;

/// Ordered mapping from key to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableAssignment {
    entries: Vec<(Key, Value)>,
}

/// Ordered sequence of assignments for one layer.
pub type VariableSet = Vec<VariableAssignment>;

impl VariableAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to `value`, replacing an existing binding in place.
    pub fn insert(&mut self, key: impl Into<Key>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Copies every binding of `other` into this assignment.
    pub fn merge(&mut self, other: &VariableAssignment) {
        for (key, value) in &other.entries {
            self.insert(key.clone(), value.clone());
        }
    }

    /// Returns a copy with bindings sorted into `keys` order.
    ///
    /// Keys not listed in `keys` keep their relative order at the end.
    pub fn ordered_by(&self, keys: &[Key]) -> Self {
        let mut entries: Vec<(Key, Value)> = keys
            .iter()
            .filter_map(|k| self.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        entries.extend(
            self.entries
                .iter()
                .filter(|(k, _)| !keys.contains(k))
                .cloned(),
        );
        Self { entries }
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for VariableAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
