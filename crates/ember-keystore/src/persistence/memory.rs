use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::Persistence;
use crate::error::KeystoreError;

/// Process-local persistence. Clones share one map, which makes a clone a
/// stand-in for a second process over the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    items: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Raw stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.items.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, KeystoreError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        self.items.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}
