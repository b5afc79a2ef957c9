pub mod bundle;
pub mod ciphertext;
pub mod encrypted_bundle;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod proto;
pub mod provider;
pub mod signature;
pub mod wallet;

pub use bundle::{KeyBundle, PrivateKeyBundle};
pub use ciphertext::Ciphertext;
pub use encrypted_bundle::EncryptedPrivateKeyBundle;
pub use encryption::{decrypt, encrypt};
pub use error::CryptoError;
pub use keys::{PrivateKey, PublicKey};
pub use provider::{CryptoProvider, OsCryptoProvider, SeededCryptoProvider};
pub use signature::{Signature, SignatureKind};
pub use wallet::Signer;
