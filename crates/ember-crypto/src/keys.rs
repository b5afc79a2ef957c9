use std::time::{SystemTime, UNIX_EPOCH};

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, ProjectivePoint, Scalar};
use prost::Message as _;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::proto;
use crate::provider::{random_array, CryptoProvider};
use crate::signature::{Signature, SignatureKind};
use crate::wallet;

/// Uncompressed SEC1 point length.
pub const PUBLIC_KEY_LEN: usize = 65;
/// secp256k1 scalar length.
pub const PRIVATE_KEY_LEN: usize = 32;
/// Longest digest accepted by [`PrivateKey::sign`] and [`PublicKey::verify`].
pub const MAX_DIGEST_LEN: usize = 32;

const UNCOMPRESSED_PREFIX: u8 = 0x04;
const MAX_GENERATE_ATTEMPTS: usize = 64;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

fn check_digest(digest: &[u8]) -> Result<(), CryptoError> {
    if digest.is_empty() || digest.len() > MAX_DIGEST_LEN {
        return Err(CryptoError::InvalidDigestLength(digest.len()));
    }
    Ok(())
}

/// secp256k1 private key.
///
/// Digests are always supplied by the caller; `sign` never hashes its input.
#[derive(Clone)]
pub struct PrivateKey {
    timestamp: u64,
    secret: SigningKey,
    public_key: PublicKey,
}

impl PrivateKey {
    /// Generate a new random key, redrawing until the scalar is valid.
    pub fn generate(provider: &dyn CryptoProvider) -> Result<Self, CryptoError> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let candidate = Zeroizing::new(random_array::<PRIVATE_KEY_LEN>(provider));
            if let Ok(secret) = SigningKey::from_slice(candidate.as_slice()) {
                return Ok(Self::from_signing_key(now_ms(), secret));
            }
        }
        Err(CryptoError::KeyGeneration(
            "random source never produced a valid scalar".into(),
        ))
    }

    /// Restore a key from its 32-byte scalar.
    pub fn from_bytes(timestamp: u64, bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "expected {PRIVATE_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let secret = SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidPrivateKey("scalar is zero or out of range".into()))?;
        Ok(Self::from_signing_key(timestamp, secret))
    }

    fn from_signing_key(timestamp: u64, secret: SigningKey) -> Self {
        let public_key = PublicKey::from_verifying_key(timestamp, secret.verifying_key(), None);
        Self {
            timestamp,
            secret,
            public_key,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The raw scalar.
    ///
    /// # Security
    /// This is the private key material. Keep it out of logs.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Sign a caller-supplied digest of at most 32 bytes.
    pub fn sign(&self, digest: &[u8]) -> Result<Signature, CryptoError> {
        self.sign_as(SignatureKind::Ecdsa, digest)
    }

    pub(crate) fn sign_as(
        &self,
        kind: SignatureKind,
        digest: &[u8],
    ) -> Result<Signature, CryptoError> {
        check_digest(digest)?;
        let (sig, recid) = self
            .secret
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;
        Ok(Signature::from_ecdsa(kind, &sig, recid))
    }

    /// Sign another public key, returning a copy of it carrying the signature.
    ///
    /// The digest is `sha256` over the key's unsigned wire encoding.
    pub fn sign_key(&self, key: &PublicKey) -> Result<PublicKey, CryptoError> {
        let digest = Sha256::digest(key.bytes_to_sign());
        let signature = self.sign(&digest)?;
        Ok(key.with_signature(signature))
    }

    /// ECDH with `peer`, returning the full uncompressed shared point.
    pub fn shared_secret(&self, peer: &PublicKey) -> Zeroizing<[u8; PUBLIC_KEY_LEN]> {
        let scalar: &Scalar = self.secret.as_nonzero_scalar().as_ref();
        let shared = AffinePoint::from(ProjectivePoint::from(*peer.key.as_affine()) * scalar);
        let encoded = shared.to_encoded_point(false);
        let mut out = Zeroizing::new([0u8; PUBLIC_KEY_LEN]);
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Whether `key` is this key's public half.
    pub fn matches(&self, key: &PublicKey) -> bool {
        self.public_key.matches(key)
    }

    /// Attach a signature to this key's public half (identity binding).
    pub(crate) fn set_public_key_signature(&mut self, signature: Signature) {
        self.public_key.signature = Some(signature);
    }

    pub fn to_proto(&self) -> proto::PrivateKey {
        proto::PrivateKey {
            timestamp: self.timestamp,
            union: Some(proto::private_key::Union::Secp256k1(
                proto::private_key::Secp256k1 {
                    bytes: self.secret_bytes().to_vec(),
                },
            )),
            public_key: Some(self.public_key.to_proto()),
        }
    }

    pub fn from_proto(value: &proto::PrivateKey) -> Result<Self, CryptoError> {
        let bytes = match &value.union {
            Some(proto::private_key::Union::Secp256k1(k)) => &k.bytes,
            None => return Err(CryptoError::Malformed("private key")),
        };
        let mut key = Self::from_bytes(value.timestamp, bytes)?;
        if let Some(public) = &value.public_key {
            let public = PublicKey::from_proto(public)?;
            if !key.matches(&public) {
                return Err(CryptoError::InvalidPrivateKey(
                    "embedded public key does not match scalar".into(),
                ));
            }
            key.public_key = public;
        }
        Ok(key)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("timestamp", &self.timestamp)
            .field("public_key", &self.public_key.to_hex())
            .finish_non_exhaustive()
    }
}

/// secp256k1 public key, optionally carrying a signature from the key that
/// vouches for it.
#[derive(Clone)]
pub struct PublicKey {
    timestamp: u64,
    bytes: [u8; PUBLIC_KEY_LEN],
    key: VerifyingKey,
    signature: Option<Signature>,
}

impl PublicKey {
    /// Parse a 65-byte uncompressed point. Length, prefix and curve
    /// membership are all checked here.
    pub fn from_bytes(
        timestamp: u64,
        bytes: &[u8],
        signature: Option<Signature>,
    ) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKeyLength(bytes.len()))?;
        if arr[0] != UNCOMPRESSED_PREFIX {
            return Err(CryptoError::InvalidPublicKeyPrefix(arr[0]));
        }
        let key = VerifyingKey::from_sec1_bytes(&arr)
            .map_err(|_| CryptoError::InvalidPublicKey("point is not on the curve".into()))?;
        Ok(Self {
            timestamp,
            bytes: arr,
            key,
            signature,
        })
    }

    fn from_verifying_key(timestamp: u64, key: &VerifyingKey, signature: Option<Signature>) -> Self {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(key.to_encoded_point(false).as_bytes());
        Self {
            timestamp,
            bytes,
            key: key.clone(),
            signature,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.bytes
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// A copy of this key carrying `signature`.
    pub fn with_signature(&self, signature: Signature) -> Self {
        Self {
            signature: Some(signature),
            ..self.clone()
        }
    }

    /// Same curve point, ignoring timestamp and signature.
    pub fn matches(&self, other: &PublicKey) -> bool {
        self.bytes == other.bytes
    }

    /// Wire encoding without the signature field; the input to key signing.
    pub fn bytes_to_sign(&self) -> Vec<u8> {
        proto::PublicKey {
            timestamp: self.timestamp,
            signature: None,
            union: Some(self.point_proto()),
        }
        .encode_to_vec()
    }

    /// Verify `signature` over a caller-supplied digest.
    pub fn verify(&self, signature: &Signature, digest: &[u8]) -> bool {
        if check_digest(digest).is_err() {
            return false;
        }
        match signature.to_ecdsa() {
            Ok((sig, _)) => self.key.verify_prehash(digest, &sig).is_ok(),
            Err(_) => false,
        }
    }

    /// Check that `key` carries a valid signature made by this key.
    pub fn verify_key(&self, key: &PublicKey) -> bool {
        let Some(signature) = key.signature() else {
            return false;
        };
        let digest = Sha256::digest(key.bytes_to_sign());
        self.verify(signature, &digest)
    }

    /// Recover the public key that produced `signature` over `digest`.
    pub fn recover(signature: &Signature, digest: &[u8]) -> Result<Self, CryptoError> {
        check_digest(digest)?;
        let (sig, recid) = signature.to_ecdsa()?;
        let key = VerifyingKey::recover_from_prehash(digest, &sig, recid)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok(Self::from_verifying_key(0, &key, None))
    }

    /// EIP-55 checksummed address of this key.
    pub fn ethereum_address(&self) -> String {
        wallet::address_from_public_bytes(&self.bytes)
    }

    /// Recover the address of the wallet that signed this key.
    ///
    /// The signature must be a personal-sign over the identity request text
    /// built from [`bytes_to_sign`](Self::bytes_to_sign).
    pub fn wallet_signature_address(&self) -> Result<String, CryptoError> {
        let signature = self.signature.as_ref().ok_or(CryptoError::MissingSignature)?;
        let text = wallet::identity_sig_request_text(&self.bytes_to_sign());
        let digest = wallet::personal_sign_digest(text.as_bytes());
        Ok(Self::recover(signature, &digest)?.ethereum_address())
    }

    fn point_proto(&self) -> proto::public_key::Union {
        proto::public_key::Union::Secp256k1Uncompressed(proto::public_key::Secp256k1Uncompressed {
            bytes: self.bytes.to_vec(),
        })
    }

    pub fn to_proto(&self) -> proto::PublicKey {
        proto::PublicKey {
            timestamp: self.timestamp,
            signature: self.signature.as_ref().map(Signature::to_proto),
            union: Some(self.point_proto()),
        }
    }

    pub fn from_proto(value: &proto::PublicKey) -> Result<Self, CryptoError> {
        let bytes = match &value.union {
            Some(proto::public_key::Union::Secp256k1Uncompressed(k)) => &k.bytes,
            None => return Err(CryptoError::Malformed("public key")),
        };
        let signature = value.signature.as_ref().map(Signature::from_proto).transpose()?;
        Self::from_bytes(value.timestamp, bytes, signature)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.bytes == other.bytes
            && self.signature == other.signature
    }
}

impl Eq for PublicKey {}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.to_hex())
            .field("signed", &self.signature.is_some())
            .finish()
    }
}
