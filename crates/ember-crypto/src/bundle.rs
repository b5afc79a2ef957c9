use prost::Message as _;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{PrivateKey, PublicKey, PUBLIC_KEY_LEN};
use crate::proto;
use crate::provider::CryptoProvider;
use crate::wallet::{self, Signer};

/// Length of the triple-DH shared secret.
pub const SHARED_SECRET_LEN: usize = 3 * PUBLIC_KEY_LEN;

/// Public identity a peer advertises: an identity key and a pre-key signed
/// by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBundle {
    identity_key: PublicKey,
    pre_key: PublicKey,
}

impl KeyBundle {
    pub fn new(identity_key: PublicKey, pre_key: PublicKey) -> Self {
        Self {
            identity_key,
            pre_key,
        }
    }

    pub fn identity_key(&self) -> &PublicKey {
        &self.identity_key
    }

    pub fn pre_key(&self) -> &PublicKey {
        &self.pre_key
    }

    /// Whether the pre-key carries a valid signature from the identity key.
    pub fn verify(&self) -> bool {
        self.identity_key.verify_key(&self.pre_key)
    }

    /// Address of the wallet that vouched for the identity key.
    pub fn wallet_address(&self) -> Result<String, CryptoError> {
        self.identity_key.wallet_signature_address()
    }

    /// Same identity and pre-key points, ignoring signatures.
    pub fn matches(&self, other: &KeyBundle) -> bool {
        self.identity_key.matches(&other.identity_key) && self.pre_key.matches(&other.pre_key)
    }

    pub fn to_proto(&self) -> proto::PublicKeyBundle {
        proto::PublicKeyBundle {
            identity_key: Some(self.identity_key.to_proto()),
            pre_key: Some(self.pre_key.to_proto()),
        }
    }

    pub fn from_proto(value: &proto::PublicKeyBundle) -> Result<Self, CryptoError> {
        let identity_key = value
            .identity_key
            .as_ref()
            .ok_or(CryptoError::Malformed("key bundle identity key"))?;
        let pre_key = value
            .pre_key
            .as_ref()
            .ok_or(CryptoError::Malformed("key bundle pre-key"))?;
        Ok(Self::new(
            PublicKey::from_proto(identity_key)?,
            PublicKey::from_proto(pre_key)?,
        ))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_proto(&proto::PublicKeyBundle::decode(bytes)?)
    }
}

/// Private counterpart to [`KeyBundle`]: the identity key plus every pre-key
/// generation this device still holds. The first pre-key is current.
#[derive(Clone)]
pub struct PrivateKeyBundle {
    identity_key: PrivateKey,
    pre_keys: Vec<PrivateKey>,
}

impl PrivateKeyBundle {
    pub fn new(identity_key: PrivateKey, pre_keys: Vec<PrivateKey>) -> Result<Self, CryptoError> {
        if pre_keys.is_empty() {
            return Err(CryptoError::Malformed("private key bundle without pre-keys"));
        }
        Ok(Self {
            identity_key,
            pre_keys,
        })
    }

    /// Generate an identity key vouched for by `signer` and a pre-key signed
    /// by that identity key.
    pub async fn generate(
        signer: &dyn Signer,
        provider: &dyn CryptoProvider,
    ) -> Result<Self, CryptoError> {
        let mut identity_key = PrivateKey::generate(provider)?;
        let text = wallet::identity_sig_request_text(&identity_key.public_key().bytes_to_sign());
        let wallet_signature = signer.sign_message(text.as_bytes()).await?;
        identity_key.set_public_key_signature(wallet_signature);

        let recovered = identity_key.public_key().wallet_signature_address()?;
        if !wallet::same_address(&recovered, &signer.address()) {
            return Err(CryptoError::Wallet(format!(
                "signature recovered {recovered}, expected {}",
                signer.address()
            )));
        }

        let mut pre_key = PrivateKey::generate(provider)?;
        let signed = identity_key.sign_key(pre_key.public_key())?;
        let signature = signed.signature().cloned().ok_or(CryptoError::MissingSignature)?;
        pre_key.set_public_key_signature(signature);

        tracing::debug!(address = %recovered, "generated private key bundle");
        Self::new(identity_key, vec![pre_key])
    }

    pub fn identity_key(&self) -> &PrivateKey {
        &self.identity_key
    }

    /// The current pre-key.
    pub fn pre_key(&self) -> &PrivateKey {
        &self.pre_keys[0]
    }

    pub fn pre_keys(&self) -> &[PrivateKey] {
        &self.pre_keys
    }

    pub fn find_pre_key(&self, public: &PublicKey) -> Option<&PrivateKey> {
        self.pre_keys.iter().find(|k| k.matches(public))
    }

    pub fn public_bundle(&self) -> KeyBundle {
        KeyBundle::new(
            self.identity_key.public_key().clone(),
            self.pre_key().public_key().clone(),
        )
    }

    /// Triple-DH secret with `peer`.
    ///
    /// `my_pre_key` selects which of our pre-key generations the peer used.
    /// Sender (`is_recipient = false`) and recipient sides yield identical
    /// bytes for matching keys.
    pub fn shared_secret(
        &self,
        peer: &KeyBundle,
        my_pre_key: &PublicKey,
        is_recipient: bool,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if !peer.verify() {
            return Err(CryptoError::PreKeySignatureInvalid);
        }
        let pre_key = self
            .find_pre_key(my_pre_key)
            .ok_or(CryptoError::NoMatchingPreKey)?;

        let (dh1, dh2) = if is_recipient {
            (
                pre_key.shared_secret(peer.identity_key()),
                self.identity_key.shared_secret(peer.pre_key()),
            )
        } else {
            (
                self.identity_key.shared_secret(peer.pre_key()),
                pre_key.shared_secret(peer.identity_key()),
            )
        };
        let dh3 = pre_key.shared_secret(peer.pre_key());

        let mut secret = Zeroizing::new(Vec::with_capacity(SHARED_SECRET_LEN));
        secret.extend_from_slice(&*dh1);
        secret.extend_from_slice(&*dh2);
        secret.extend_from_slice(&*dh3);
        Ok(secret)
    }

    pub fn to_proto(&self) -> proto::PrivateKeyBundle {
        proto::PrivateKeyBundle {
            version: Some(proto::private_key_bundle::Version::V1(
                proto::PrivateKeyBundleV1 {
                    identity_key: Some(self.identity_key.to_proto()),
                    pre_keys: self.pre_keys.iter().map(PrivateKey::to_proto).collect(),
                },
            )),
        }
    }

    pub fn from_proto(value: &proto::PrivateKeyBundle) -> Result<Self, CryptoError> {
        let Some(proto::private_key_bundle::Version::V1(v1)) = &value.version else {
            return Err(CryptoError::Malformed("private key bundle"));
        };
        let identity_key = v1
            .identity_key
            .as_ref()
            .ok_or(CryptoError::Malformed("private key bundle identity key"))?;
        let pre_keys = v1
            .pre_keys
            .iter()
            .map(PrivateKey::from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(PrivateKey::from_proto(identity_key)?, pre_keys)
    }

    /// Plaintext wire encoding. Only ever written to storage sealed; see
    /// [`EncryptedPrivateKeyBundle`](crate::EncryptedPrivateKeyBundle).
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.to_proto().encode_to_vec())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_proto(&proto::PrivateKeyBundle::decode(bytes)?)
    }
}

impl std::fmt::Debug for PrivateKeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyBundle")
            .field("identity_key", &self.identity_key.public_key().to_hex())
            .field("pre_keys", &self.pre_keys.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OsCryptoProvider;
    use crate::signature::SignatureKind;

    async fn bundle() -> (PrivateKey, PrivateKeyBundle) {
        let wallet = PrivateKey::generate(&OsCryptoProvider).unwrap();
        let bundle = PrivateKeyBundle::generate(&wallet, &OsCryptoProvider)
            .await
            .unwrap();
        (wallet, bundle)
    }

    #[tokio::test]
    async fn generated_bundle_is_signed() {
        let (wallet, alice) = bundle().await;
        let public = alice.public_bundle();
        assert!(public.verify());
        assert_eq!(
            public.identity_key().signature().unwrap().kind(),
            SignatureKind::Wallet
        );
        assert_eq!(public.wallet_address().unwrap(), wallet.address());
    }

    #[tokio::test]
    async fn shared_secret_is_symmetric() {
        let (_, alice) = bundle().await;
        let (_, bob) = bundle().await;
        let a_pub = alice.public_bundle();
        let b_pub = bob.public_bundle();

        let sender = alice
            .shared_secret(&b_pub, alice.pre_key().public_key(), false)
            .unwrap();
        let recipient = bob
            .shared_secret(&a_pub, bob.pre_key().public_key(), true)
            .unwrap();
        assert_eq!(sender.len(), SHARED_SECRET_LEN);
        assert_eq!(*sender, *recipient);

        // Swapping the flag on one side breaks agreement
        let wrong = bob
            .shared_secret(&a_pub, bob.pre_key().public_key(), false)
            .unwrap();
        assert_ne!(*sender, *wrong);
    }

    #[tokio::test]
    async fn unsigned_peer_pre_key_rejected() {
        let (_, alice) = bundle().await;
        let (_, bob) = bundle().await;
        let forged = KeyBundle::new(
            bob.public_bundle().identity_key().clone(),
            PrivateKey::generate(&OsCryptoProvider)
                .unwrap()
                .public_key()
                .clone(),
        );
        let err = alice
            .shared_secret(&forged, alice.pre_key().public_key(), false)
            .unwrap_err();
        assert_eq!(err.to_string(), "peer preKey signature invalid");
    }

    #[tokio::test]
    async fn pre_key_signed_by_other_identity_rejected() {
        let (_, alice) = bundle().await;
        let (_, bob) = bundle().await;
        let (_, carol) = bundle().await;
        let spliced = KeyBundle::new(
            bob.public_bundle().identity_key().clone(),
            carol.public_bundle().pre_key().clone(),
        );
        assert!(!spliced.verify());
        assert_eq!(
            alice
                .shared_secret(&spliced, alice.pre_key().public_key(), true)
                .unwrap_err(),
            CryptoError::PreKeySignatureInvalid
        );
    }

    #[tokio::test]
    async fn unknown_own_pre_key_rejected() {
        let (_, alice) = bundle().await;
        let (_, bob) = bundle().await;
        let err = alice
            .shared_secret(&bob.public_bundle(), bob.pre_key().public_key(), true)
            .unwrap_err();
        assert_eq!(err, CryptoError::NoMatchingPreKey);
    }

    #[tokio::test]
    async fn wire_roundtrip() {
        let (_, alice) = bundle().await;
        let restored = PrivateKeyBundle::from_bytes(&alice.to_bytes()).unwrap();
        assert!(restored.public_bundle().matches(&alice.public_bundle()));
        assert_eq!(restored.public_bundle(), alice.public_bundle());

        let public = KeyBundle::from_bytes(&alice.public_bundle().to_bytes()).unwrap();
        assert!(public.verify());
    }

    #[test]
    fn empty_pre_keys_rejected() {
        let identity = PrivateKey::generate(&OsCryptoProvider).unwrap();
        assert!(PrivateKeyBundle::new(identity, Vec::new()).is_err());
    }
}
