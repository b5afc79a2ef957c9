//! Request and response shapes of the [`Keystore`](crate::Keystore) batch
//! operations.

use ember_crypto::{Ciphertext, KeyBundle};
use ember_protocol::InvitationContext;

use crate::error::KeystoreError;
use crate::store::TopicData;

/// One entry of a batch response, in request order.
pub type BatchResult<T> = Result<T, KeystoreError>;

#[derive(Debug, Clone)]
pub struct EncryptV1Request {
    pub recipient: KeyBundle,
    pub payload: Vec<u8>,
    /// Bound as associated data.
    pub header_bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DecryptV1Request {
    pub payload: Ciphertext,
    /// The other party's bundle.
    pub peer_keys: KeyBundle,
    pub header_bytes: Vec<u8>,
    /// Whether this keystore's identity sent the message.
    pub is_sender: bool,
}

#[derive(Debug, Clone)]
pub struct EncryptV2Request {
    pub content_topic: String,
    pub payload: Vec<u8>,
    pub header_bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DecryptV2Request {
    pub content_topic: String,
    pub payload: Ciphertext,
    pub header_bytes: Vec<u8>,
}

/// A sealed invitation as delivered on an invite topic.
#[derive(Debug, Clone)]
pub struct SaveInviteRequest {
    pub content_topic: String,
    pub timestamp_ns: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CreateInviteRequest {
    pub recipient: KeyBundle,
    pub context: Option<InvitationContext>,
    pub created_ns: u64,
}

#[derive(Debug, Clone)]
pub struct CreateInviteResponse {
    pub conversation: ConversationReference,
    /// Encoded sealed invitation, ready to publish to both parties' invite
    /// topics.
    pub payload: Vec<u8>,
}

/// A known conversation, without its key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReference {
    pub topic: String,
    pub created_ns: u64,
    pub peer_address: String,
    pub context: Option<InvitationContext>,
}

impl From<&TopicData> for ConversationReference {
    fn from(row: &TopicData) -> Self {
        Self {
            topic: row.topic.clone(),
            created_ns: row.created_ns,
            peer_address: row.peer_address.clone(),
            context: row.invitation.as_ref().and_then(|i| i.context().cloned()),
        }
    }
}
