// Local Key-Value Store
//
// Per-node primitive map. Success/failure returns carry the operation
// condition (create requires absence, update/delete require presence);
// misses are protocol-level outcomes, not errors.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LocalStore {
    entries: HashMap<String, String>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert; fails when the key already exists.
    pub fn create(&mut self, key: &str, value: &str) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), value.to_string());
        true
    }

    pub fn read(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Overwrite; fails when the key is absent.
    pub fn update(&mut self, key: &str, value: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove; fails when the key is absent.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot iterator for stabilization scans.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
