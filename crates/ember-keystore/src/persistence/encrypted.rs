use std::sync::Arc;

use async_trait::async_trait;
use ember_crypto::{decrypt, encrypt, Ciphertext, CryptoProvider, PrivateKey};
use zeroize::Zeroizing;

use super::Persistence;
use crate::error::KeystoreError;

/// Seals every value before handing it to the inner backend.
///
/// The secret is the identity key's ECDH with its own public key, and the
/// storage key is bound as associated data so values cannot be swapped
/// between keys.
pub struct EncryptedPersistence {
    inner: Arc<dyn Persistence>,
    secret: Zeroizing<[u8; 65]>,
    provider: Arc<dyn CryptoProvider>,
}

impl EncryptedPersistence {
    pub fn new(
        inner: Arc<dyn Persistence>,
        identity_key: &PrivateKey,
        provider: Arc<dyn CryptoProvider>,
    ) -> Self {
        Self {
            inner,
            secret: identity_key.shared_secret(identity_key.public_key()),
            provider,
        }
    }
}

#[async_trait]
impl Persistence for EncryptedPersistence {
    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, KeystoreError> {
        let Some(sealed) = self.inner.get_item(key).await? else {
            return Ok(None);
        };
        let ciphertext = Ciphertext::from_bytes(&sealed)?;
        let plaintext = decrypt(
            self.provider.as_ref(),
            &ciphertext,
            &*self.secret,
            Some(key.as_bytes()),
        )?;
        Ok(Some(plaintext))
    }

    async fn set_item(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        let ciphertext = encrypt(
            self.provider.as_ref(),
            value,
            &*self.secret,
            Some(key.as_bytes()),
        )?;
        self.inner.set_item(key, &ciphertext.to_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::persistence::InMemoryPersistence;
    use ember_crypto::OsCryptoProvider;

    fn encrypted(backing: &InMemoryPersistence, key: &PrivateKey) -> EncryptedPersistence {
        EncryptedPersistence::new(Arc::new(backing.clone()), key, Arc::new(OsCryptoProvider))
    }

    #[tokio::test]
    async fn values_are_sealed_at_rest() {
        let backing = InMemoryPersistence::new();
        let key = PrivateKey::generate(&OsCryptoProvider).unwrap();
        let store = encrypted(&backing, &key);

        store.set_item("secret", b"plaintext value").await.unwrap();
        let raw = backing.get_item("secret").await.unwrap().unwrap();
        assert!(!raw.windows(15).any(|w| w == b"plaintext value"));
        assert_eq!(
            store.get_item("secret").await.unwrap(),
            Some(b"plaintext value".to_vec())
        );
    }

    #[tokio::test]
    async fn other_identity_cannot_read() {
        let backing = InMemoryPersistence::new();
        let owner = PrivateKey::generate(&OsCryptoProvider).unwrap();
        let other = PrivateKey::generate(&OsCryptoProvider).unwrap();
        encrypted(&backing, &owner).set_item("k", b"v").await.unwrap();

        let err = encrypted(&backing, &other).get_item("k").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DecryptionFailed);
    }

    #[tokio::test]
    async fn values_are_bound_to_their_key() {
        let backing = InMemoryPersistence::new();
        let key = PrivateKey::generate(&OsCryptoProvider).unwrap();
        let store = encrypted(&backing, &key);
        store.set_item("a", b"value for a").await.unwrap();

        let moved = backing.get_item("a").await.unwrap().unwrap();
        backing.set_item("b", &moved).await.unwrap();
        assert!(store.get_item("b").await.is_err());
    }
}
