//! HKDF-SHA256 + AES-256-GCM authenticated encryption.
//!
//! Each call draws a fresh 32-byte salt and 12-byte nonce. The AES key is
//! derived from the caller's secret and the salt, so the same secret can
//! safely seal many payloads. Salt and nonce travel in the [`Ciphertext`].

use crate::ciphertext::{Ciphertext, GCM_NONCE_LEN, HKDF_SALT_LEN};
use crate::error::CryptoError;
use crate::provider::{random_array, CryptoProvider};

/// Encrypt `plaintext` under `secret`, authenticating `associated_data` if given.
pub fn encrypt(
    provider: &dyn CryptoProvider,
    plaintext: &[u8],
    secret: &[u8],
    associated_data: Option<&[u8]>,
) -> Result<Ciphertext, CryptoError> {
    let salt = random_array::<HKDF_SALT_LEN>(provider);
    let nonce = random_array::<GCM_NONCE_LEN>(provider);
    let key = provider.derive_key(secret, &salt)?;
    let payload = provider.seal(&key, &nonce, plaintext, associated_data.unwrap_or_default())?;
    Ciphertext::new(payload, &salt, &nonce)
}

/// Decrypt a [`Ciphertext`] produced by [`encrypt`].
///
/// Any change to the payload, salt, nonce, secret or associated data fails
/// with [`CryptoError::DecryptionError`].
pub fn decrypt(
    provider: &dyn CryptoProvider,
    ciphertext: &Ciphertext,
    secret: &[u8],
    associated_data: Option<&[u8]>,
) -> Result<Vec<u8>, CryptoError> {
    let key = provider.derive_key(secret, ciphertext.hkdf_salt())?;
    provider.open(
        &key,
        ciphertext.gcm_nonce(),
        ciphertext.payload(),
        associated_data.unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{OsCryptoProvider, SeededCryptoProvider};

    const SECRET: &[u8] = b"a shared secret of arbitrary length";

    #[test]
    fn roundtrip() {
        let provider = OsCryptoProvider;
        for plaintext in [&b""[..], &b"x"[..], &b"hello ember"[..], &[0xABu8; 4096][..]] {
            let ct = encrypt(&provider, plaintext, SECRET, None).unwrap();
            assert_eq!(ct.payload().len(), plaintext.len() + 16);
            assert_eq!(decrypt(&provider, &ct, SECRET, None).unwrap(), plaintext);
        }
    }

    #[test]
    fn roundtrip_with_associated_data() {
        let provider = OsCryptoProvider;
        let ct = encrypt(&provider, b"body", SECRET, Some(b"header")).unwrap();
        assert_eq!(decrypt(&provider, &ct, SECRET, Some(b"header")).unwrap(), b"body");
        assert!(matches!(
            decrypt(&provider, &ct, SECRET, Some(b"headeR")),
            Err(CryptoError::DecryptionError(_))
        ));
        assert!(decrypt(&provider, &ct, SECRET, None).is_err());
    }

    #[test]
    fn every_payload_bit_flip_is_detected() {
        let provider = OsCryptoProvider;
        let ct = encrypt(&provider, b"tamper me", SECRET, None).unwrap();
        for byte in 0..ct.payload().len() {
            for bit in 0..8 {
                let mut tampered = ct.clone();
                tampered.payload_mut()[byte] ^= 1 << bit;
                assert!(
                    decrypt(&provider, &tampered, SECRET, None).is_err(),
                    "flip of payload byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn salt_and_nonce_flips_are_detected() {
        let provider = OsCryptoProvider;
        let ct = encrypt(&provider, b"tamper me", SECRET, None).unwrap();
        for byte in 0..HKDF_SALT_LEN {
            let mut tampered = ct.clone();
            tampered.salt_mut()[byte] ^= 0x01;
            assert!(decrypt(&provider, &tampered, SECRET, None).is_err());
        }
        for byte in 0..GCM_NONCE_LEN {
            let mut tampered = ct.clone();
            tampered.nonce_mut()[byte] ^= 0x80;
            assert!(decrypt(&provider, &tampered, SECRET, None).is_err());
        }
    }

    #[test]
    fn wrong_secret_fails() {
        let provider = OsCryptoProvider;
        let ct = encrypt(&provider, b"secret data", SECRET, None).unwrap();
        assert!(decrypt(&provider, &ct, b"another secret", None).is_err());
    }

    #[test]
    fn fresh_salt_and_nonce_per_call() {
        let provider = OsCryptoProvider;
        let a = encrypt(&provider, b"same", SECRET, None).unwrap();
        let b = encrypt(&provider, b"same", SECRET, None).unwrap();
        assert_ne!(a.hkdf_salt(), b.hkdf_salt());
        assert_ne!(a.gcm_nonce(), b.gcm_nonce());
        assert_ne!(a.payload(), b.payload());
    }

    #[test]
    fn seeded_provider_gives_reproducible_ciphertext() {
        let a = encrypt(&SeededCryptoProvider::new(1), b"fixture", SECRET, None).unwrap();
        let b = encrypt(&SeededCryptoProvider::new(1), b"fixture", SECRET, None).unwrap();
        assert_eq!(a, b);
    }
}
