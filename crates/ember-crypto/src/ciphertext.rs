use prost::Message as _;

use crate::error::CryptoError;
use crate::proto;

/// AES-GCM authentication tag length, appended to every payload.
pub const GCM_TAG_LEN: usize = 16;
/// AES-GCM nonce length.
pub const GCM_NONCE_LEN: usize = 12;
/// HKDF salt length.
pub const HKDF_SALT_LEN: usize = 32;

/// Output of the AEAD primitive: the sealed payload plus the public
/// parameters needed to re-derive the key and open it.
///
/// Lengths are checked at construction, so a `Ciphertext` value is always
/// structurally valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    payload: Vec<u8>,
    hkdf_salt: [u8; HKDF_SALT_LEN],
    gcm_nonce: [u8; GCM_NONCE_LEN],
}

impl Ciphertext {
    pub fn new(payload: Vec<u8>, hkdf_salt: &[u8], gcm_nonce: &[u8]) -> Result<Self, CryptoError> {
        if payload.len() < GCM_TAG_LEN {
            return Err(CryptoError::InvalidPayloadLength(payload.len()));
        }
        let hkdf_salt: [u8; HKDF_SALT_LEN] = hkdf_salt
            .try_into()
            .map_err(|_| CryptoError::InvalidSaltLength(hkdf_salt.len()))?;
        let gcm_nonce: [u8; GCM_NONCE_LEN] = gcm_nonce
            .try_into()
            .map_err(|_| CryptoError::InvalidNonceLength(gcm_nonce.len()))?;
        Ok(Self {
            payload,
            hkdf_salt,
            gcm_nonce,
        })
    }

    /// Sealed bytes including the trailing tag.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn hkdf_salt(&self) -> &[u8; HKDF_SALT_LEN] {
        &self.hkdf_salt
    }

    pub fn gcm_nonce(&self) -> &[u8; GCM_NONCE_LEN] {
        &self.gcm_nonce
    }

    pub fn to_proto(&self) -> proto::Ciphertext {
        proto::Ciphertext {
            union: Some(proto::ciphertext::Union::Aes256GcmHkdfSha256(
                proto::ciphertext::Aes256gcmHkdfsha256 {
                    hkdf_salt: self.hkdf_salt.to_vec(),
                    gcm_nonce: self.gcm_nonce.to_vec(),
                    payload: self.payload.clone(),
                },
            )),
        }
    }

    pub fn from_proto(value: proto::Ciphertext) -> Result<Self, CryptoError> {
        match value.union {
            Some(proto::ciphertext::Union::Aes256GcmHkdfSha256(inner)) => {
                Self::new(inner.payload, &inner.hkdf_salt, &inner.gcm_nonce)
            }
            None => Err(CryptoError::Malformed("ciphertext")),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_proto(proto::Ciphertext::decode(bytes)?)
    }

    #[cfg(test)]
    pub(crate) fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }

    #[cfg(test)]
    pub(crate) fn salt_mut(&mut self) -> &mut [u8; HKDF_SALT_LEN] {
        &mut self.hkdf_salt
    }

    #[cfg(test)]
    pub(crate) fn nonce_mut(&mut self) -> &mut [u8; GCM_NONCE_LEN] {
        &mut self.gcm_nonce
    }
}
