//! Wallet-sealed storage of the private key bundle.

use ember_crypto::{CryptoProvider, EncryptedPrivateKeyBundle, PrivateKeyBundle, Signer};

use crate::error::KeystoreError;
use crate::persistence::Persistence;

fn storage_key(wallet_address: &str) -> String {
    format!("privatekey/{wallet_address}")
}

/// Seal `bundle` with `signer` and write it under the signer's address.
pub async fn store_private_bundle(
    persistence: &dyn Persistence,
    bundle: &PrivateKeyBundle,
    signer: &dyn Signer,
    provider: &dyn CryptoProvider,
) -> Result<(), KeystoreError> {
    let sealed = EncryptedPrivateKeyBundle::seal(bundle, signer, provider).await?;
    persistence
        .set_item(&storage_key(&signer.address()), &sealed.to_bytes())
        .await
}

/// Load and open the bundle stored for `signer`, if any.
///
/// Undecodable data is an error, never treated as absent.
pub async fn load_private_bundle(
    persistence: &dyn Persistence,
    signer: &dyn Signer,
    provider: &dyn CryptoProvider,
) -> Result<Option<PrivateKeyBundle>, KeystoreError> {
    let Some(bytes) = persistence.get_item(&storage_key(&signer.address())).await? else {
        return Ok(None);
    };
    let sealed = EncryptedPrivateKeyBundle::from_bytes(&bytes)?;
    Ok(Some(sealed.open(signer, provider).await?))
}

/// Load the stored bundle, or generate, store and return a new one.
pub async fn load_or_create_private_bundle(
    persistence: &dyn Persistence,
    signer: &dyn Signer,
    provider: &dyn CryptoProvider,
) -> Result<PrivateKeyBundle, KeystoreError> {
    if let Some(bundle) = load_private_bundle(persistence, signer, provider).await? {
        tracing::debug!(address = %signer.address(), "loaded stored private key bundle");
        return Ok(bundle);
    }
    let bundle = PrivateKeyBundle::generate(signer, provider).await?;
    store_private_bundle(persistence, &bundle, signer, provider).await?;
    tracing::debug!(address = %signer.address(), "created private key bundle");
    Ok(bundle)
}
