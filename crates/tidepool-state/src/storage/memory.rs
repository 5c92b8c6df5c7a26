use std::collections::BTreeMap;

use super::Storage;
use crate::error::StateError;

/// In-memory storage with a write overlay.
///
/// `overlay` maps a key to `Some(value)` for a pending put and `None` for a
/// pending delete.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    committed: BTreeMap<Vec<u8>, Vec<u8>>,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Whether any write is waiting for commit
    pub fn has_pending(&self) -> bool {
        !self.overlay.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.overlay.get(key) {
            Some(pending) => pending.clone(),
            None => self.committed.get(key).cloned(),
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.overlay.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.overlay.insert(key.to_vec(), None);
    }

    fn commit(&mut self) -> Result<(), StateError> {
        for (key, value) in std::mem::take(&mut self.overlay) {
            match value {
                Some(v) => self.committed.insert(key, v),
                None => self.committed.remove(&key),
            };
        }
        Ok(())
    }

    fn rollback(&mut self) {
        self.overlay.clear();
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        let mut live: BTreeMap<&[u8], bool> = self
            .committed
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| (k.as_slice(), true))
            .collect();

        for (key, value) in self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            live.insert(key.as_slice(), value.is_some());
        }

        live.into_iter()
            .filter(|(_, alive)| *alive)
            .map(|(k, _)| k.to_vec())
            .collect()
    }
}
