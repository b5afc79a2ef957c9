use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key length: {0}")]
    InvalidPublicKeyLength(usize),

    #[error("invalid public key prefix: {0}")]
    InvalidPublicKeyPrefix(u8),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature length: {0}")]
    InvalidSignatureLength(usize),

    #[error("invalid signature recovery bit: {0}")]
    InvalidRecoveryBit(u32),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid digest length: {0}")]
    InvalidDigestLength(usize),

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("key is not signed")]
    MissingSignature,

    #[error("peer preKey signature invalid")]
    PreKeySignatureInvalid,

    #[error("could not find matching pre-key")]
    NoMatchingPreKey,

    #[error("invalid ciphertext payload length: {0}")]
    InvalidPayloadLength(usize),

    #[error("invalid ciphertext salt length: {0}")]
    InvalidSaltLength(usize),

    #[error("invalid ciphertext nonce length: {0}")]
    InvalidNonceLength(usize),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed: {0}")]
    EncryptionError(String),

    #[error("decryption failed: {0}")]
    DecryptionError(String),

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("wallet error: {0}")]
    Wallet(String),
}

impl CryptoError {
    /// Whether this error reports a malformed value rejected at construction.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPrivateKey(_)
                | Self::InvalidPublicKeyLength(_)
                | Self::InvalidPublicKeyPrefix(_)
                | Self::InvalidPublicKey(_)
                | Self::InvalidSignatureLength(_)
                | Self::InvalidRecoveryBit(_)
                | Self::InvalidSignature(_)
                | Self::InvalidDigestLength(_)
                | Self::InvalidPayloadLength(_)
                | Self::InvalidSaltLength(_)
                | Self::InvalidNonceLength(_)
                | Self::Malformed(_)
                | Self::Decode(_)
        )
    }
}

impl From<prost::DecodeError> for CryptoError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Decode(e.to_string())
    }
}
