//! Protobuf wire types for message envelopes and invitations.
//!
//! Key and ciphertext types come from [`ember_crypto::proto`].

#![allow(clippy::derive_partial_eq_without_eq)]

use std::collections::BTreeMap;

use ember_crypto::proto::{Ciphertext, PublicKeyBundle};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageHeaderV1 {
    #[prost(message, optional, tag = "1")]
    pub sender: Option<PublicKeyBundle>,
    #[prost(message, optional, tag = "2")]
    pub recipient: Option<PublicKeyBundle>,
    /// Milliseconds since the Unix epoch.
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageV1 {
    /// Encoded [`MessageHeaderV1`], kept verbatim because it is the AEAD
    /// associated data.
    #[prost(bytes = "vec", tag = "1")]
    pub header_bytes: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub ciphertext: Option<Ciphertext>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(oneof = "message::Version", tags = "1")]
    pub version: Option<message::Version>,
}

pub mod message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Version {
        #[prost(message, tag = "1")]
        V1(super::MessageV1),
    }
}

/// Conversation context attached to an invitation.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvitationContext {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(btree_map = "string, string", tag = "2")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvitationV1 {
    #[prost(string, tag = "1")]
    pub topic: String,
    #[prost(message, optional, tag = "2")]
    pub context: Option<InvitationContext>,
    #[prost(oneof = "invitation_v1::Encryption", tags = "3")]
    pub encryption: Option<invitation_v1::Encryption>,
}

pub mod invitation_v1 {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Aes256gcmHkdfsha256 {
        #[prost(bytes = "vec", tag = "1")]
        pub key_material: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Encryption {
        #[prost(message, tag = "3")]
        Aes256GcmHkdfSha256(Aes256gcmHkdfsha256),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SealedInvitationHeaderV1 {
    #[prost(message, optional, tag = "1")]
    pub sender: Option<PublicKeyBundle>,
    #[prost(message, optional, tag = "2")]
    pub recipient: Option<PublicKeyBundle>,
    /// Nanoseconds since the Unix epoch.
    #[prost(uint64, tag = "3")]
    pub created_ns: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SealedInvitationV1 {
    #[prost(bytes = "vec", tag = "1")]
    pub header_bytes: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub ciphertext: Option<Ciphertext>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SealedInvitation {
    #[prost(oneof = "sealed_invitation::Version", tags = "1")]
    pub version: Option<sealed_invitation::Version>,
}

pub mod sealed_invitation {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Version {
        #[prost(message, tag = "1")]
        V1(super::SealedInvitationV1),
    }
}
