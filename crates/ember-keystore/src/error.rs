use ember_crypto::CryptoError;
use ember_protocol::ProtocolError;
use thiserror::Error;

/// Stable classification of a [`KeystoreError`], for callers that branch on
/// failure kind rather than message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unspecified,
    InvalidInput,
    NoMatchingPrekey,
    ValidationFailed,
    DecryptionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeystoreError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("batch item panicked: {0}")]
    Panicked(String),
}

impl KeystoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(e) => protocol_code(e),
            Self::InvalidRequest(_) | Self::UnknownTopic(_) => ErrorCode::InvalidInput,
            Self::Persistence(_) | Self::Config(_) | Self::Panicked(_) => ErrorCode::Unspecified,
        }
    }
}

fn protocol_code(e: &ProtocolError) -> ErrorCode {
    match e {
        ProtocolError::RecipientPreKeyMismatch => ErrorCode::NoMatchingPrekey,
        ProtocolError::MissingField(_)
        | ProtocolError::NotParticipant
        | ProtocolError::Deserialization(_)
        | ProtocolError::InvalidInvitation(_)
        | ProtocolError::InvalidTopic(_) => ErrorCode::InvalidInput,
        ProtocolError::Crypto(e) => crypto_code(e),
    }
}

fn crypto_code(e: &CryptoError) -> ErrorCode {
    match e {
        CryptoError::NoMatchingPreKey => ErrorCode::NoMatchingPrekey,
        CryptoError::DecryptionError(_) => ErrorCode::DecryptionFailed,
        CryptoError::Decode(_) => ErrorCode::InvalidInput,
        CryptoError::PreKeySignatureInvalid | CryptoError::MissingSignature => {
            ErrorCode::ValidationFailed
        }
        other if other.is_validation() => ErrorCode::ValidationFailed,
        _ => ErrorCode::Unspecified,
    }
}

impl From<CryptoError> for KeystoreError {
    fn from(e: CryptoError) -> Self {
        Self::Protocol(ProtocolError::Crypto(e))
    }
}

impl From<std::io::Error> for KeystoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for KeystoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_error_kind() {
        let cases = [
            (
                KeystoreError::from(ProtocolError::RecipientPreKeyMismatch),
                ErrorCode::NoMatchingPrekey,
            ),
            (
                KeystoreError::from(CryptoError::NoMatchingPreKey),
                ErrorCode::NoMatchingPrekey,
            ),
            (
                KeystoreError::from(ProtocolError::MissingField("header")),
                ErrorCode::InvalidInput,
            ),
            (
                KeystoreError::from(CryptoError::DecryptionError("tag".into())),
                ErrorCode::DecryptionFailed,
            ),
            (
                KeystoreError::from(CryptoError::InvalidSaltLength(31)),
                ErrorCode::ValidationFailed,
            ),
            (
                KeystoreError::from(CryptoError::PreKeySignatureInvalid),
                ErrorCode::ValidationFailed,
            ),
            (
                KeystoreError::UnknownTopic("/xmtp/0/m-x/proto".into()),
                ErrorCode::InvalidInput,
            ),
            (
                KeystoreError::Persistence("disk full".into()),
                ErrorCode::Unspecified,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code, "{err}");
        }
    }

    #[test]
    fn messages_pass_through() {
        let err = KeystoreError::from(CryptoError::InvalidNonceLength(13));
        assert_eq!(err.to_string(), "invalid ciphertext nonce length: 13");
    }
}
