//! In-memory storage adapter for host builds and tests.

use std::collections::HashMap;

use crate::app::ports::{StorageError, StoragePort};

/// HashMap-backed [`StoragePort`].  Writes are trivially atomic.
#[derive(Debug, Default, Clone)]
pub struct MemStorage {
    map: HashMap<String, Vec<u8>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{namespace}/{key}")
    }
}

impl StoragePort for MemStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let value = self
            .map
            .get(&Self::full_key(namespace, key))
            .ok_or(StorageError::NotFound)?;
        if value.len() > buf.len() {
            return Err(StorageError::IoError);
        }
        buf[..value.len()].copy_from_slice(value);
        Ok(value.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.map.insert(Self::full_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.map.contains_key(&Self::full_key(namespace, key))
    }
}
