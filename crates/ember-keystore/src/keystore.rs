use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use ember_crypto::{decrypt, encrypt, Ciphertext, CryptoProvider, KeyBundle, PrivateKeyBundle};
use ember_protocol::{topic, Invitation, ProtocolError, SealedInvitation};
use futures::future::join_all;
use futures::FutureExt;
use zeroize::Zeroizing;

use crate::api::{
    BatchResult, ConversationReference, CreateInviteRequest, CreateInviteResponse,
    DecryptV1Request, DecryptV2Request, EncryptV1Request, EncryptV2Request, SaveInviteRequest,
};
use crate::config::{KeystoreConfig, PersistenceConfig};
use crate::error::KeystoreError;
use crate::persistence::{
    DirectoryPersistence, EncryptedPersistence, InMemoryPersistence, Persistence,
    PrefixedPersistence,
};
use crate::store::{StoreKind, TopicData, TopicStore};

/// Holder of the decrypted private key bundle and every conversation key.
///
/// Batch operations return one result per request, in request order. A
/// failing or panicking item never affects its siblings.
pub struct Keystore {
    bundle: PrivateKeyBundle,
    public_bundle: KeyBundle,
    wallet_address: String,
    provider: Arc<dyn CryptoProvider>,
    v1_store: TopicStore,
    v2_store: TopicStore,
}

impl Keystore {
    pub async fn new(
        bundle: PrivateKeyBundle,
        persistence: Arc<dyn Persistence>,
        provider: Arc<dyn CryptoProvider>,
    ) -> Result<Self, KeystoreError> {
        let public_bundle = bundle.public_bundle();
        let wallet_address = public_bundle.wallet_address()?;
        let v1_store = open_store(StoreKind::V1, StoreKind::Legacy, &persistence).await?;
        let v2_store = open_store(StoreKind::V2, StoreKind::Invite, &persistence).await?;
        tracing::debug!(
            address = %wallet_address,
            v1 = v1_store.len(),
            v2 = v2_store.len(),
            "keystore opened"
        );
        Ok(Self {
            bundle,
            public_bundle,
            wallet_address,
            provider,
            v1_store,
            v2_store,
        })
    }

    /// Build the persistence stack described by `config` and open over it.
    pub async fn from_config(
        config: &KeystoreConfig,
        bundle: PrivateKeyBundle,
        provider: Arc<dyn CryptoProvider>,
    ) -> Result<Self, KeystoreError> {
        config.validate()?;
        let wallet_address = bundle.public_bundle().wallet_address()?;
        let base: Arc<dyn Persistence> = match &config.persistence {
            PersistenceConfig::Memory => Arc::new(InMemoryPersistence::new()),
            PersistenceConfig::Directory { path } => {
                Arc::new(DirectoryPersistence::new(path.clone()))
            }
        };
        let mut persistence: Arc<dyn Persistence> = Arc::new(PrefixedPersistence::new(
            config.namespace_for(&wallet_address),
            base,
        ));
        if config.encrypt_persistence {
            persistence = Arc::new(EncryptedPersistence::new(
                persistence,
                bundle.identity_key(),
                Arc::clone(&provider),
            ));
        }
        Self::new(bundle, persistence, provider).await
    }

    // ── V1 ───────────────────────────────────────────────────────────

    pub async fn encrypt_v1(&self, requests: Vec<EncryptV1Request>) -> Vec<BatchResult<Ciphertext>> {
        run_batch("encrypt_v1", requests, |req| async move { self.encrypt_v1_item(&req) }).await
    }

    fn encrypt_v1_item(&self, req: &EncryptV1Request) -> BatchResult<Ciphertext> {
        let secret =
            self.bundle
                .shared_secret(&req.recipient, self.bundle.pre_key().public_key(), false)?;
        Ok(encrypt(
            self.provider.as_ref(),
            &req.payload,
            &secret,
            Some(req.header_bytes.as_slice()),
        )?)
    }

    pub async fn decrypt_v1(&self, requests: Vec<DecryptV1Request>) -> Vec<BatchResult<Vec<u8>>> {
        run_batch("decrypt_v1", requests, |req| async move { self.decrypt_v1_item(&req) }).await
    }

    fn decrypt_v1_item(&self, req: &DecryptV1Request) -> BatchResult<Vec<u8>> {
        let secret = self.bundle.shared_secret(
            &req.peer_keys,
            self.bundle.pre_key().public_key(),
            !req.is_sender,
        )?;
        Ok(decrypt(
            self.provider.as_ref(),
            &req.payload,
            &secret,
            Some(req.header_bytes.as_slice()),
        )?)
    }

    pub async fn save_v1_conversations(
        &self,
        conversations: Vec<ConversationReference>,
    ) -> Result<usize, KeystoreError> {
        let rows = conversations
            .into_iter()
            .map(|c| TopicData::v1(c.topic, c.peer_address, c.created_ns))
            .collect();
        self.v1_store.add(rows).await
    }

    /// Known V1 conversations, oldest first.
    pub fn get_v1_conversations(&self) -> Vec<ConversationReference> {
        sorted_references(&self.v1_store)
    }

    // ── V2 ───────────────────────────────────────────────────────────

    pub async fn encrypt_v2(&self, requests: Vec<EncryptV2Request>) -> Vec<BatchResult<Ciphertext>> {
        run_batch("encrypt_v2", requests, |req| async move { self.encrypt_v2_item(&req) }).await
    }

    fn encrypt_v2_item(&self, req: &EncryptV2Request) -> BatchResult<Ciphertext> {
        let key = self.topic_key(&req.content_topic)?;
        Ok(encrypt(
            self.provider.as_ref(),
            &req.payload,
            key.as_slice(),
            Some(req.header_bytes.as_slice()),
        )?)
    }

    pub async fn decrypt_v2(&self, requests: Vec<DecryptV2Request>) -> Vec<BatchResult<Vec<u8>>> {
        run_batch("decrypt_v2", requests, |req| async move { self.decrypt_v2_item(&req) }).await
    }

    fn decrypt_v2_item(&self, req: &DecryptV2Request) -> BatchResult<Vec<u8>> {
        let key = self.topic_key(&req.content_topic)?;
        Ok(decrypt(
            self.provider.as_ref(),
            &req.payload,
            key.as_slice(),
            Some(req.header_bytes.as_slice()),
        )?)
    }

    fn topic_key(&self, topic: &str) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
        self.v2_store
            .lookup(topic)
            .and_then(|row| row.invitation)
            .map(|invitation| Zeroizing::new(*invitation.key_material()))
            .ok_or_else(|| KeystoreError::UnknownTopic(topic.to_owned()))
    }

    /// Seal a fresh conversation to `recipient` and remember it locally.
    pub async fn create_invite(
        &self,
        req: CreateInviteRequest,
    ) -> Result<CreateInviteResponse, KeystoreError> {
        let invitation = Invitation::generate(req.context, self.provider.as_ref());
        let sealed = SealedInvitation::seal(
            &self.bundle,
            &req.recipient,
            &invitation,
            req.created_ns,
            self.provider.as_ref(),
        )?;
        let peer_address = req.recipient.wallet_address()?;
        let row = TopicData::v2(invitation, peer_address, req.created_ns);
        self.v2_store.add(vec![row.clone()]).await?;
        tracing::debug!(topic = %row.topic, peer = %row.peer_address, "created invitation");
        Ok(CreateInviteResponse {
            conversation: ConversationReference::from(&row),
            payload: sealed.to_bytes(),
        })
    }

    /// Unseal invitations and record their topics with a single store write.
    ///
    /// Each response is the stored conversation, which for an already known
    /// topic is the first one saved.
    pub async fn save_invites(
        &self,
        requests: Vec<SaveInviteRequest>,
    ) -> Vec<BatchResult<ConversationReference>> {
        let opened =
            run_batch("save_invites", requests, |req| async move { self.open_invite(&req) }).await;

        let rows: Vec<TopicData> = opened.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
        if let Err(e) = self.v2_store.add(rows).await {
            tracing::warn!(error = %e, "failed to persist invitations");
            return opened
                .into_iter()
                .map(|r| r.and_then(|_| Err(e.clone())))
                .collect();
        }

        opened
            .into_iter()
            .map(|r| {
                r.map(|row| {
                    let stored = self.v2_store.lookup(&row.topic).unwrap_or(row);
                    tracing::debug!(topic = %stored.topic, peer = %stored.peer_address, "saved invitation");
                    ConversationReference::from(&stored)
                })
            })
            .collect()
    }

    fn open_invite(&self, req: &SaveInviteRequest) -> BatchResult<TopicData> {
        if !topic::is_valid_topic(&req.content_topic) {
            return Err(ProtocolError::InvalidTopic(req.content_topic.clone()).into());
        }
        let sealed = SealedInvitation::from_bytes(&req.payload)?;
        let invitation = sealed.open(&self.bundle, self.provider.as_ref())?;
        // The sender picks the conversation topic, so it gets the same check
        if !topic::is_valid_topic(invitation.topic()) {
            return Err(ProtocolError::InvalidTopic(invitation.topic().to_owned()).into());
        }
        let header = sealed.header();
        let peer = if self.is_own_identity(&header.sender) {
            &header.recipient
        } else {
            &header.sender
        };
        let created_ns = if header.created_ns == 0 {
            req.timestamp_ns
        } else {
            header.created_ns
        };
        Ok(TopicData::v2(invitation, peer.wallet_address()?, created_ns))
    }

    /// Known V2 conversations, oldest first.
    pub fn get_v2_conversations(&self) -> Vec<ConversationReference> {
        sorted_references(&self.v2_store)
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn get_public_key_bundle(&self) -> &KeyBundle {
        &self.public_bundle
    }

    pub fn get_wallet_address(&self) -> &str {
        &self.wallet_address
    }

    pub fn get_account_address(&self) -> &str {
        self.get_wallet_address()
    }

    /// Stored data for `topic`, V2 first.
    pub fn lookup_topic(&self, topic: &str) -> Option<TopicData> {
        self.v2_store
            .lookup(topic)
            .or_else(|| self.v1_store.lookup(topic))
    }

    fn is_own_identity(&self, bundle: &KeyBundle) -> bool {
        bundle.identity_key().matches(self.public_bundle.identity_key())
    }
}

/// Open `kind`, seeding it from `legacy` the first time it is empty.
async fn open_store(
    kind: StoreKind,
    legacy: StoreKind,
    persistence: &Arc<dyn Persistence>,
) -> Result<TopicStore, KeystoreError> {
    let store = TopicStore::load(kind, Arc::clone(persistence)).await?;
    if store.is_empty() {
        let old = TopicStore::load(legacy, Arc::clone(persistence)).await?;
        if !old.is_empty() {
            let migrated = store.add(old.topics()).await?;
            tracing::debug!(from = ?legacy, to = ?kind, migrated, "migrated topic store");
        }
    }
    Ok(store)
}

fn sorted_references(store: &TopicStore) -> Vec<ConversationReference> {
    let mut refs: Vec<ConversationReference> =
        store.topics().iter().map(ConversationReference::from).collect();
    refs.sort_by_key(|c| c.created_ns);
    refs
}

/// Run `op` over every request concurrently, turning a panic in any item
/// into an error for that item alone.
pub(crate) async fn run_batch<R, T, F, Fut>(
    operation: &'static str,
    requests: Vec<R>,
    op: F,
) -> Vec<BatchResult<T>>
where
    F: Fn(R) -> Fut,
    Fut: Future<Output = BatchResult<T>>,
{
    let items = requests.into_iter().enumerate().map(|(index, request)| {
        AssertUnwindSafe(op(request))
            .catch_unwind()
            .map(move |outcome| {
                let result = outcome.unwrap_or_else(|panic| {
                    Err(KeystoreError::Panicked(panic_message(panic.as_ref())))
                });
                if let Err(e) = &result {
                    tracing::debug!(operation, index, code = ?e.code(), error = %e, "batch item failed");
                }
                result
            })
    });
    join_all(items).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
