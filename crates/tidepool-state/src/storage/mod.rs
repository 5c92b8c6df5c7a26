pub mod memory;

use crate::error::StateError;

/// Keyed byte store with pending writes
pub trait Storage: Send + Sync {
    /// Get a value by key, observing pending writes
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Put a key-value pair
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Delete a key
    fn delete(&mut self, key: &[u8]);

    /// Check that pending changes can be made durable. After `Ok`, the
    /// next `commit` must not fail.
    fn prepare_commit(&self) -> Result<(), StateError> {
        Ok(())
    }

    /// Commit pending changes
    fn commit(&mut self) -> Result<(), StateError>;

    /// Discard pending changes
    fn rollback(&mut self);

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Get all live keys with a given prefix, in key order
    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>>;
}

pub use memory::MemoryStorage;
