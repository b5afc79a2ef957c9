pub mod api;
pub mod bundle_storage;
pub mod config;
pub mod error;
pub mod keystore;
pub mod persistence;
pub mod proto;
pub mod store;

pub use api::{
    BatchResult, ConversationReference, CreateInviteRequest, CreateInviteResponse,
    DecryptV1Request, DecryptV2Request, EncryptV1Request, EncryptV2Request, SaveInviteRequest,
};
pub use config::{KeystoreConfig, PersistenceConfig};
pub use error::{ErrorCode, KeystoreError};
pub use keystore::Keystore;
pub use persistence::{
    DirectoryPersistence, EncryptedPersistence, InMemoryPersistence, Persistence,
    PrefixedPersistence,
};
pub use store::{StoreKind, TopicData, TopicStore};
