//! Pluggable key-value persistence.
//!
//! Backends compose: a [`DirectoryPersistence`] wrapped in a
//! [`PrefixedPersistence`] wrapped in an [`EncryptedPersistence`] is the
//! usual on-disk stack.

mod directory;
mod encrypted;
mod memory;
mod prefixed;

use async_trait::async_trait;

use crate::error::KeystoreError;

pub use directory::DirectoryPersistence;
pub use encrypted::EncryptedPersistence;
pub use memory::InMemoryPersistence;
pub use prefixed::PrefixedPersistence;

/// Durable map from string keys to opaque bytes.
///
/// Implementations must make `get_item` after a completed `set_item` on the
/// same key observe the written value.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, KeystoreError>;

    async fn set_item(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError>;
}
