//! Protobuf wire types for keys, signatures and ciphertexts.
//!
//! Field numbers are fixed by the network and must not change.

#![allow(clippy::derive_partial_eq_without_eq)]

/// ECDSA signature, either produced by a key in a bundle or by a wallet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Signature {
    #[prost(oneof = "signature::Union", tags = "1, 2")]
    pub union: Option<signature::Union>,
}

pub mod signature {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EcdsaCompact {
        /// Compact `[R || S]` form, 64 bytes.
        #[prost(bytes = "vec", tag = "1")]
        pub bytes: Vec<u8>,
        #[prost(uint32, tag = "2")]
        pub recovery: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct WalletEcdsaCompact {
        #[prost(bytes = "vec", tag = "1")]
        pub bytes: Vec<u8>,
        #[prost(uint32, tag = "2")]
        pub recovery: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Union {
        #[prost(message, tag = "1")]
        EcdsaCompact(EcdsaCompact),
        #[prost(message, tag = "2")]
        WalletEcdsaCompact(WalletEcdsaCompact),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKey {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(message, optional, tag = "2")]
    pub signature: Option<Signature>,
    #[prost(oneof = "public_key::Union", tags = "3")]
    pub union: Option<public_key::Union>,
}

pub mod public_key {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Secp256k1Uncompressed {
        /// Uncompressed SEC1 point, 65 bytes starting with `0x04`.
        #[prost(bytes = "vec", tag = "1")]
        pub bytes: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Union {
        #[prost(message, tag = "3")]
        Secp256k1Uncompressed(Secp256k1Uncompressed),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKeyBundle {
    #[prost(message, optional, tag = "1")]
    pub identity_key: Option<PublicKey>,
    #[prost(message, optional, tag = "2")]
    pub pre_key: Option<PublicKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrivateKey {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(oneof = "private_key::Union", tags = "2")]
    pub union: Option<private_key::Union>,
    #[prost(message, optional, tag = "3")]
    pub public_key: Option<PublicKey>,
}

pub mod private_key {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Secp256k1 {
        #[prost(bytes = "vec", tag = "1")]
        pub bytes: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Union {
        #[prost(message, tag = "2")]
        Secp256k1(Secp256k1),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrivateKeyBundleV1 {
    #[prost(message, optional, tag = "1")]
    pub identity_key: Option<PrivateKey>,
    #[prost(message, repeated, tag = "2")]
    pub pre_keys: Vec<PrivateKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrivateKeyBundle {
    #[prost(oneof = "private_key_bundle::Version", tags = "1")]
    pub version: Option<private_key_bundle::Version>,
}

pub mod private_key_bundle {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Version {
        #[prost(message, tag = "1")]
        V1(super::PrivateKeyBundleV1),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ciphertext {
    #[prost(oneof = "ciphertext::Union", tags = "1")]
    pub union: Option<ciphertext::Union>,
}

pub mod ciphertext {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Aes256gcmHkdfsha256 {
        #[prost(bytes = "vec", tag = "1")]
        pub hkdf_salt: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub gcm_nonce: Vec<u8>,
        #[prost(bytes = "vec", tag = "3")]
        pub payload: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Union {
        #[prost(message, tag = "1")]
        Aes256GcmHkdfSha256(Aes256gcmHkdfsha256),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncryptedPrivateKeyBundleV1 {
    #[prost(bytes = "vec", tag = "1")]
    pub wallet_pre_key: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub ciphertext: Option<Ciphertext>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncryptedPrivateKeyBundle {
    #[prost(oneof = "encrypted_private_key_bundle::Version", tags = "1")]
    pub version: Option<encrypted_private_key_bundle::Version>,
}

pub mod encrypted_private_key_bundle {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Version {
        #[prost(message, tag = "1")]
        V1(super::EncryptedPrivateKeyBundleV1),
    }
}
