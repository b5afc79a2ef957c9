use prost::Message as _;
use zeroize::Zeroizing;

use crate::bundle::PrivateKeyBundle;
use crate::ciphertext::Ciphertext;
use crate::encryption::{decrypt, encrypt};
use crate::error::CryptoError;
use crate::proto;
use crate::provider::{random_array, CryptoProvider};
use crate::wallet::{self, Signer};

const WALLET_PRE_KEY_LEN: usize = 32;

/// A [`PrivateKeyBundle`] sealed for durable storage.
///
/// The secret is the wallet's 65-byte signature over the storage request
/// text for a random `wallet_pre_key`, so only the same wallet can open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPrivateKeyBundle {
    wallet_pre_key: Vec<u8>,
    ciphertext: Ciphertext,
}

impl EncryptedPrivateKeyBundle {
    pub async fn seal(
        bundle: &PrivateKeyBundle,
        signer: &dyn Signer,
        provider: &dyn CryptoProvider,
    ) -> Result<Self, CryptoError> {
        let wallet_pre_key = random_array::<WALLET_PRE_KEY_LEN>(provider).to_vec();
        let secret = storage_secret(signer, &wallet_pre_key).await?;
        let ciphertext = encrypt(provider, &bundle.to_bytes(), &*secret, None)?;
        Ok(Self {
            wallet_pre_key,
            ciphertext,
        })
    }

    pub async fn open(
        &self,
        signer: &dyn Signer,
        provider: &dyn CryptoProvider,
    ) -> Result<PrivateKeyBundle, CryptoError> {
        let secret = storage_secret(signer, &self.wallet_pre_key).await?;
        let plaintext = Zeroizing::new(decrypt(provider, &self.ciphertext, &*secret, None)?);
        PrivateKeyBundle::from_bytes(&plaintext)
    }

    pub fn wallet_pre_key(&self) -> &[u8] {
        &self.wallet_pre_key
    }

    pub fn ciphertext(&self) -> &Ciphertext {
        &self.ciphertext
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        proto::EncryptedPrivateKeyBundle {
            version: Some(proto::encrypted_private_key_bundle::Version::V1(
                proto::EncryptedPrivateKeyBundleV1 {
                    wallet_pre_key: self.wallet_pre_key.clone(),
                    ciphertext: Some(self.ciphertext.to_proto()),
                },
            )),
        }
        .encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let decoded = proto::EncryptedPrivateKeyBundle::decode(bytes)?;
        let Some(proto::encrypted_private_key_bundle::Version::V1(v1)) = decoded.version else {
            return Err(CryptoError::Malformed("encrypted private key bundle"));
        };
        let ciphertext = v1
            .ciphertext
            .ok_or(CryptoError::Malformed("encrypted private key bundle ciphertext"))?;
        Ok(Self {
            wallet_pre_key: v1.wallet_pre_key,
            ciphertext: Ciphertext::from_proto(ciphertext)?,
        })
    }
}

async fn storage_secret(
    signer: &dyn Signer,
    wallet_pre_key: &[u8],
) -> Result<Zeroizing<[u8; 65]>, CryptoError> {
    let text = wallet::storage_sig_request_text(wallet_pre_key);
    let signature = signer.sign_message(text.as_bytes()).await?;
    Ok(Zeroizing::new(signature.to_eth_bytes()))
}
