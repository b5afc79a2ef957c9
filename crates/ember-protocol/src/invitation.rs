use std::collections::BTreeMap;

use ember_crypto::provider::random_array;
use ember_crypto::{decrypt, encrypt, Ciphertext, CryptoProvider, KeyBundle, PrivateKeyBundle};
use prost::Message as _;
use zeroize::Zeroizing;

use crate::error::ProtocolError;
use crate::message::viewer_secret;
use crate::proto;
use crate::topic;

/// Length of the per-conversation symmetric key material.
pub const KEY_MATERIAL_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationContext {
    pub conversation_id: String,
    pub metadata: BTreeMap<String, String>,
}

impl InvitationContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn to_proto(&self) -> proto::InvitationContext {
        proto::InvitationContext {
            conversation_id: self.conversation_id.clone(),
            metadata: self.metadata.clone(),
        }
    }

    fn from_proto(value: proto::InvitationContext) -> Self {
        Self {
            conversation_id: value.conversation_id,
            metadata: value.metadata,
        }
    }
}

/// Invitation to a V2 conversation: the topic plus the key material that
/// encrypts everything published on it.
#[derive(Clone, PartialEq, Eq)]
pub struct Invitation {
    topic: String,
    context: Option<InvitationContext>,
    key_material: [u8; KEY_MATERIAL_LEN],
}

impl Invitation {
    pub fn new(
        topic: impl Into<String>,
        context: Option<InvitationContext>,
        key_material: &[u8],
    ) -> Result<Self, ProtocolError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ProtocolError::InvalidInvitation("empty topic".into()));
        }
        let key_material: [u8; KEY_MATERIAL_LEN] = key_material.try_into().map_err(|_| {
            ProtocolError::InvalidInvitation(format!(
                "key material must be {KEY_MATERIAL_LEN} bytes, got {}",
                key_material.len()
            ))
        })?;
        Ok(Self {
            topic,
            context,
            key_material,
        })
    }

    /// Fresh random topic and key material.
    pub fn generate(context: Option<InvitationContext>, provider: &dyn CryptoProvider) -> Self {
        let topic = topic::v2_topic(&hex::encode(random_array::<32>(provider)));
        Self {
            topic,
            context,
            key_material: random_array::<KEY_MATERIAL_LEN>(provider),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn context(&self) -> Option<&InvitationContext> {
        self.context.as_ref()
    }

    pub fn key_material(&self) -> &[u8; KEY_MATERIAL_LEN] {
        &self.key_material
    }

    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(
            proto::InvitationV1 {
                topic: self.topic.clone(),
                context: self.context.as_ref().map(InvitationContext::to_proto),
                encryption: Some(proto::invitation_v1::Encryption::Aes256GcmHkdfSha256(
                    proto::invitation_v1::Aes256gcmHkdfsha256 {
                        key_material: self.key_material.to_vec(),
                    },
                )),
            }
            .encode_to_vec(),
        )
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let decoded = proto::InvitationV1::decode(bytes)?;
        let Some(proto::invitation_v1::Encryption::Aes256GcmHkdfSha256(aes)) = decoded.encryption
        else {
            return Err(ProtocolError::InvalidInvitation("missing key material".into()));
        };
        Self::new(
            decoded.topic,
            decoded.context.map(InvitationContext::from_proto),
            &aes.key_material,
        )
    }
}

impl std::fmt::Debug for Invitation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invitation")
            .field("topic", &self.topic)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedInvitationHeader {
    pub sender: KeyBundle,
    pub recipient: KeyBundle,
    pub created_ns: u64,
}

/// An [`Invitation`] encrypted to one recipient. Readable by the recipient
/// and by the sender.
#[derive(Debug, Clone)]
pub struct SealedInvitation {
    header: SealedInvitationHeader,
    header_bytes: Vec<u8>,
    ciphertext: Ciphertext,
}

impl SealedInvitation {
    pub fn seal(
        sender: &PrivateKeyBundle,
        recipient: &KeyBundle,
        invitation: &Invitation,
        created_ns: u64,
        provider: &dyn CryptoProvider,
    ) -> Result<Self, ProtocolError> {
        let secret = sender.shared_secret(recipient, sender.pre_key().public_key(), false)?;
        let header = SealedInvitationHeader {
            sender: sender.public_bundle(),
            recipient: recipient.clone(),
            created_ns,
        };
        let header_bytes = proto::SealedInvitationHeaderV1 {
            sender: Some(header.sender.to_proto()),
            recipient: Some(header.recipient.to_proto()),
            created_ns,
        }
        .encode_to_vec();
        let ciphertext = encrypt(
            provider,
            &invitation.to_bytes(),
            &secret,
            Some(header_bytes.as_slice()),
        )?;
        Ok(Self {
            header,
            header_bytes,
            ciphertext,
        })
    }

    /// Decrypt as `viewer`, who must be either party named in the header.
    pub fn open(
        &self,
        viewer: &PrivateKeyBundle,
        provider: &dyn CryptoProvider,
    ) -> Result<Invitation, ProtocolError> {
        let secret = viewer_secret(viewer, &self.header.sender, &self.header.recipient)?;
        let plaintext = Zeroizing::new(decrypt(
            provider,
            &self.ciphertext,
            &secret,
            Some(self.header_bytes.as_slice()),
        )?);
        Invitation::from_bytes(&plaintext)
    }

    pub fn header(&self) -> &SealedInvitationHeader {
        &self.header
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        proto::SealedInvitation {
            version: Some(proto::sealed_invitation::Version::V1(
                proto::SealedInvitationV1 {
                    header_bytes: self.header_bytes.clone(),
                    ciphertext: Some(self.ciphertext.to_proto()),
                },
            )),
        }
        .encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let decoded = proto::SealedInvitation::decode(bytes)?;
        let Some(proto::sealed_invitation::Version::V1(v1)) = decoded.version else {
            return Err(ProtocolError::InvalidInvitation("unsupported version".into()));
        };
        if v1.header_bytes.is_empty() {
            return Err(ProtocolError::InvalidInvitation("missing header".into()));
        }
        let header = proto::SealedInvitationHeaderV1::decode(v1.header_bytes.as_slice())?;
        let sender = header
            .sender
            .ok_or_else(|| ProtocolError::InvalidInvitation("missing sender".into()))?;
        let recipient = header
            .recipient
            .ok_or_else(|| ProtocolError::InvalidInvitation("missing recipient".into()))?;
        let ciphertext = v1
            .ciphertext
            .ok_or_else(|| ProtocolError::InvalidInvitation("missing ciphertext".into()))?;
        Ok(Self {
            header: SealedInvitationHeader {
                sender: KeyBundle::from_proto(&sender)?,
                recipient: KeyBundle::from_proto(&recipient)?,
                created_ns: header.created_ns,
            },
            header_bytes: v1.header_bytes,
            ciphertext: Ciphertext::from_proto(ciphertext)?,
        })
    }
}
