//! Protobuf layout of persisted topic maps.

#![allow(clippy::derive_partial_eq_without_eq)]

use std::collections::BTreeMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopicMap {
    #[prost(btree_map = "string, message", tag = "1")]
    pub topics: BTreeMap<String, TopicData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopicData {
    #[prost(uint64, tag = "1")]
    pub created_ns: u64,
    #[prost(string, tag = "2")]
    pub peer_address: String,
    /// Encoded `InvitationV1`; empty for V1 conversations.
    #[prost(bytes = "vec", tag = "3")]
    pub invitation: Vec<u8>,
}
