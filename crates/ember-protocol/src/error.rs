use ember_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A required envelope field is absent. Checked before any decryption.
    #[error("missing message {0}")]
    MissingField(&'static str),

    #[error("recipient pre-key mismatch")]
    RecipientPreKeyMismatch,

    #[error("viewer is neither sender nor recipient")]
    NotParticipant,

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("invalid invitation: {0}")]
    InvalidInvitation(String),

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<prost::DecodeError> for ProtocolError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Deserialization(e.to_string())
    }
}
