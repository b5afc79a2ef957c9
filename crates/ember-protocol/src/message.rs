use ember_crypto::{decrypt, encrypt, Ciphertext, CryptoProvider, KeyBundle, PrivateKeyBundle};
use prost::Message as _;
use zeroize::Zeroizing;

use crate::error::ProtocolError;
use crate::proto;

/// Cleartext routing header. Its encoded bytes are the AEAD associated data,
/// so altering any field breaks decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub sender: KeyBundle,
    pub recipient: KeyBundle,
    pub timestamp: u64,
}

/// A V1 direct message envelope.
#[derive(Debug, Clone)]
pub struct Message {
    header: MessageHeader,
    header_bytes: Vec<u8>,
    ciphertext: Ciphertext,
    decrypted: Option<Vec<u8>>,
}

impl Message {
    /// Encrypt `plaintext` from `sender` to `recipient`.
    pub fn encode(
        sender: &PrivateKeyBundle,
        recipient: &KeyBundle,
        plaintext: &[u8],
        timestamp: u64,
        provider: &dyn CryptoProvider,
    ) -> Result<Self, ProtocolError> {
        let secret = sender.shared_secret(recipient, sender.pre_key().public_key(), false)?;
        let header = MessageHeader {
            sender: sender.public_bundle(),
            recipient: recipient.clone(),
            timestamp,
        };
        let header_bytes = proto::MessageHeaderV1 {
            sender: Some(header.sender.to_proto()),
            recipient: Some(header.recipient.to_proto()),
            timestamp,
        }
        .encode_to_vec();
        let ciphertext = encrypt(provider, plaintext, &secret, Some(header_bytes.as_slice()))?;
        Ok(Self {
            header,
            header_bytes,
            ciphertext,
            decrypted: Some(plaintext.to_vec()),
        })
    }

    /// Parse and decrypt `bytes` as `viewer`.
    ///
    /// The viewer may be the recipient or the original sender. Required
    /// header fields are checked first, then the pre-key, then the AEAD tag.
    pub fn decode(
        viewer: &PrivateKeyBundle,
        bytes: &[u8],
        provider: &dyn CryptoProvider,
    ) -> Result<Self, ProtocolError> {
        let envelope = proto::Message::decode(bytes)?;
        let Some(proto::message::Version::V1(v1)) = envelope.version else {
            return Err(ProtocolError::Deserialization(
                "unsupported message version".into(),
            ));
        };
        if v1.header_bytes.is_empty() {
            return Err(ProtocolError::MissingField("header"));
        }
        let header = parse_header(&v1.header_bytes)?;
        let ciphertext = Ciphertext::from_proto(
            v1.ciphertext.ok_or(ProtocolError::MissingField("ciphertext"))?,
        )?;

        let secret = viewer_secret(viewer, &header.sender, &header.recipient)?;
        let plaintext = decrypt(provider, &ciphertext, &secret, Some(v1.header_bytes.as_slice()))?;
        Ok(Self {
            header,
            header_bytes: v1.header_bytes,
            ciphertext,
            decrypted: Some(plaintext),
        })
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.header_bytes
    }

    pub fn ciphertext(&self) -> &Ciphertext {
        &self.ciphertext
    }

    pub fn decrypted(&self) -> Option<&[u8]> {
        self.decrypted.as_deref()
    }

    pub fn sender_address(&self) -> Result<String, ProtocolError> {
        Ok(self.header.sender.wallet_address()?)
    }

    pub fn recipient_address(&self) -> Result<String, ProtocolError> {
        Ok(self.header.recipient.wallet_address()?)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        proto::Message {
            version: Some(proto::message::Version::V1(proto::MessageV1 {
                header_bytes: self.header_bytes.clone(),
                ciphertext: Some(self.ciphertext.to_proto()),
            })),
        }
        .encode_to_vec()
    }
}

fn parse_header(bytes: &[u8]) -> Result<MessageHeader, ProtocolError> {
    let header = proto::MessageHeaderV1::decode(bytes)?;
    let sender = header.sender.ok_or(ProtocolError::MissingField("sender"))?;
    if sender.identity_key.is_none() {
        return Err(ProtocolError::MissingField("sender identity key"));
    }
    if sender.pre_key.is_none() {
        return Err(ProtocolError::MissingField("sender pre-key"));
    }
    let recipient = header
        .recipient
        .ok_or(ProtocolError::MissingField("recipient"))?;
    if recipient.identity_key.is_none() {
        return Err(ProtocolError::MissingField("recipient identity key"));
    }
    if recipient.pre_key.is_none() {
        return Err(ProtocolError::MissingField("recipient pre-key"));
    }
    Ok(MessageHeader {
        sender: KeyBundle::from_proto(&sender)?,
        recipient: KeyBundle::from_proto(&recipient)?,
        timestamp: header.timestamp,
    })
}

/// Shared secret for a `sender -> recipient` envelope as seen by `viewer`.
///
/// When the viewer's identity is the sender the secret is derived from the
/// sending side, so a device can read what it sent.
pub(crate) fn viewer_secret(
    viewer: &PrivateKeyBundle,
    sender: &KeyBundle,
    recipient: &KeyBundle,
) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    let viewer_identity = viewer.identity_key().public_key();
    if viewer_identity.matches(sender.identity_key()) {
        return Ok(viewer.shared_secret(recipient, sender.pre_key(), false)?);
    }
    if viewer.find_pre_key(recipient.pre_key()).is_none() {
        return Err(ProtocolError::RecipientPreKeyMismatch);
    }
    if !viewer_identity.matches(recipient.identity_key()) {
        return Err(ProtocolError::NotParticipant);
    }
    Ok(viewer.shared_secret(sender, recipient.pre_key(), true)?)
}
