//! Ethereum wallet interop: personal-sign digests, EIP-55 addresses and the
//! request texts a wallet is asked to sign.

use async_trait::async_trait;
use sha3::{Digest, Keccak256};

use crate::error::CryptoError;
use crate::keys::{PrivateKey, PUBLIC_KEY_LEN};
use crate::signature::{Signature, SignatureKind};

const SIGNATURE_INFO: &str = "For more info: https://xmtp.org/signatures/";

/// An external account able to personal-sign arbitrary messages.
///
/// Wallet integrations implement this; [`PrivateKey`] implements it too so
/// tests and headless clients can act as their own wallet.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Personal-sign `message`, returning a [`SignatureKind::Wallet`] signature.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError>;

    /// EIP-55 address of the signing account.
    fn address(&self) -> String;
}

#[async_trait]
impl Signer for PrivateKey {
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        self.sign_as(SignatureKind::Wallet, &personal_sign_digest(message))
    }

    fn address(&self) -> String {
        self.public_key().ethereum_address()
    }
}

/// `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn personal_sign_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Text a wallet signs to vouch for a new identity key.
pub fn identity_sig_request_text(key_bytes: &[u8]) -> String {
    format!(
        "XMTP : Create Identity\n{}\n\n{SIGNATURE_INFO}",
        hex::encode(key_bytes)
    )
}

/// Text a wallet signs to derive the secret that seals the stored bundle.
pub fn storage_sig_request_text(pre_key: &[u8]) -> String {
    format!(
        "XMTP : Enable Identity\n{}\n\n{SIGNATURE_INFO}",
        hex::encode(pre_key)
    )
}

/// EIP-55 address for an uncompressed public key.
pub fn address_from_public_bytes(uncompressed: &[u8; PUBLIC_KEY_LEN]) -> String {
    let hash = Keccak256::digest(&uncompressed[1..]);
    checksum_address(&hash[12..])
}

fn checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = hex::encode(Keccak256::digest(lower.as_bytes()));
    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (c, h) in lower.chars().zip(hash.chars()) {
        if c.is_ascii_alphabetic() && h.to_digit(16).unwrap_or(0) >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Whether two addresses name the same account, ignoring checksum case.
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PublicKey;
    use crate::provider::OsCryptoProvider;

    #[test]
    fn request_texts() {
        assert_eq!(
            identity_sig_request_text(&[0xde, 0xad]),
            "XMTP : Create Identity\ndead\n\nFor more info: https://xmtp.org/signatures/"
        );
        assert_eq!(
            storage_sig_request_text(&[0x01]),
            "XMTP : Enable Identity\n01\n\nFor more info: https://xmtp.org/signatures/"
        );
    }

    #[test]
    fn personal_sign_prefixes_length() {
        let a = personal_sign_digest(b"abc");
        let mut raw = Keccak256::new();
        raw.update(b"\x19Ethereum Signed Message:\n3abc");
        assert_eq!(a, <[u8; 32]>::from(raw.finalize()));
    }

    #[tokio::test]
    async fn private_key_signs_as_wallet() {
        let wallet = PrivateKey::generate(&OsCryptoProvider).unwrap();
        let sig = wallet.sign_message(b"hello").await.unwrap();
        assert_eq!(sig.kind(), SignatureKind::Wallet);

        let recovered = PublicKey::recover(&sig, &personal_sign_digest(b"hello")).unwrap();
        assert_eq!(recovered.ethereum_address(), wallet.address());
    }

    #[test]
    fn address_comparison_ignores_case() {
        assert!(same_address(
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf",
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        ));
        assert!(!same_address("0x01", "0x02"));
    }
}
