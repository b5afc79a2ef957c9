use std::sync::Arc;

use async_trait::async_trait;

use super::Persistence;
use crate::error::KeystoreError;

/// Namespaces every key with a fixed prefix.
#[derive(Clone)]
pub struct PrefixedPersistence {
    prefix: String,
    inner: Arc<dyn Persistence>,
}

impl PrefixedPersistence {
    pub fn new(prefix: impl Into<String>, inner: Arc<dyn Persistence>) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait]
impl Persistence for PrefixedPersistence {
    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, KeystoreError> {
        self.inner.get_item(&self.key(key)).await
    }

    async fn set_item(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        self.inner.set_item(&self.key(key), value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let backing = InMemoryPersistence::new();
        let alice = PrefixedPersistence::new("keystore/alice/", Arc::new(backing.clone()));
        let bob = PrefixedPersistence::new("keystore/bob/", Arc::new(backing.clone()));

        alice.set_item("topics", b"a").await.unwrap();
        bob.set_item("topics", b"b").await.unwrap();

        assert_eq!(alice.get_item("topics").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(bob.get_item("topics").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(backing.keys(), ["keystore/alice/topics", "keystore/bob/topics"]);
    }
}
