//! Durable topic-key stores.
//!
//! One [`TopicStore`] type serves every store kind; the kind selects the
//! storage key, whether a revision counter is kept, and which rows are
//! accepted.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ember_protocol::Invitation;
use parking_lot::RwLock;
use prost::Message as _;
use tokio::sync::Mutex;

use crate::error::{ErrorCode, KeystoreError};
use crate::persistence::Persistence;
use crate::proto;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Invitations saved before revision tracking existed.
    Invite,
    /// V1 conversations saved before revision tracking existed.
    Legacy,
    V1,
    V2,
}

impl StoreKind {
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Invite => "invitations/v1",
            Self::Legacy => "conversations/v1",
            Self::V1 => "topics/v1",
            Self::V2 => "topics/v2",
        }
    }

    fn revision_key(self) -> String {
        format!("{}/revision", self.storage_key())
    }

    pub fn is_revisioned(self) -> bool {
        matches!(self, Self::V1 | Self::V2)
    }

    /// Why `row` cannot be stored, if it cannot.
    fn validate(self, row: &TopicData) -> Result<(), &'static str> {
        if row.topic.is_empty() {
            return Err("empty topic");
        }
        match self {
            Self::Invite | Self::V2 => match &row.invitation {
                None => Err("missing key material"),
                Some(invitation) if invitation.topic() != row.topic => {
                    Err("invitation is for another topic")
                }
                Some(_) => Ok(()),
            },
            Self::Legacy | Self::V1 => {
                if row.peer_address.is_empty() {
                    Err("missing peer address")
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A conversation's stored key material. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicData {
    pub topic: String,
    pub created_ns: u64,
    pub peer_address: String,
    /// Key material and context. Always present for V2 conversations.
    pub invitation: Option<Invitation>,
}

impl TopicData {
    pub fn v1(topic: impl Into<String>, peer_address: impl Into<String>, created_ns: u64) -> Self {
        Self {
            topic: topic.into(),
            created_ns,
            peer_address: peer_address.into(),
            invitation: None,
        }
    }

    pub fn v2(invitation: Invitation, peer_address: impl Into<String>, created_ns: u64) -> Self {
        Self {
            topic: invitation.topic().to_owned(),
            created_ns,
            peer_address: peer_address.into(),
            invitation: Some(invitation),
        }
    }
}

/// Map from topic to [`TopicData`], mirrored to a [`Persistence`] backend.
///
/// Writes are serialized per instance. Reads never block on a write and may
/// observe a map that a pending `add` is still filling.
pub struct TopicStore {
    kind: StoreKind,
    persistence: Arc<dyn Persistence>,
    topics: RwLock<HashMap<String, TopicData>>,
    revision: AtomicU64,
    write_lock: Mutex<()>,
}

impl TopicStore {
    /// Load whatever `persistence` holds for `kind`. Corrupt data loads as
    /// an empty store.
    pub async fn load(
        kind: StoreKind,
        persistence: Arc<dyn Persistence>,
    ) -> Result<Self, KeystoreError> {
        // Revision first: a write landing in between only makes the topics newer
        let revision = if kind.is_revisioned() {
            read_revision(kind, persistence.as_ref()).await?
        } else {
            0
        };
        let topics = read_topics(kind, persistence.as_ref()).await?;
        Ok(Self {
            kind,
            persistence,
            topics: RwLock::new(topics),
            revision: AtomicU64::new(revision),
            write_lock: Mutex::new(()),
        })
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Insert rows whose topic is not yet stored and persist once.
    ///
    /// The first row stored for a topic wins; later rows for it are skipped
    /// without error. Invalid rows are dropped with a warning. Returns how
    /// many rows were inserted.
    pub async fn add(&self, rows: Vec<TopicData>) -> Result<usize, KeystoreError> {
        let _guard = self.write_lock.lock().await;
        if self.kind.is_revisioned() {
            self.refresh().await?;
        }

        let inserted = {
            let mut topics = self.topics.write();
            let mut inserted = 0;
            for row in rows {
                if let Err(reason) = self.kind.validate(&row) {
                    tracing::warn!(store = ?self.kind, topic = %row.topic, reason, "dropping invalid topic row");
                    continue;
                }
                if let Entry::Vacant(slot) = topics.entry(row.topic.clone()) {
                    slot.insert(row);
                    inserted += 1;
                }
            }
            inserted
        };
        if inserted == 0 {
            return Ok(0);
        }

        let encoded = {
            let topics = self.topics.read();
            encode_topics(&topics)
        };
        self.persistence
            .set_item(self.kind.storage_key(), &encoded)
            .await?;
        if self.kind.is_revisioned() {
            let current = self.revision.load(Ordering::Acquire);
            let next = current.checked_add(1).unwrap_or_else(|| {
                tracing::warn!(store = ?self.kind, current, "revision counter exhausted, restarting at 1");
                1
            });
            self.persistence
                .set_item(&self.kind.revision_key(), &next.to_be_bytes())
                .await?;
            self.revision.store(next, Ordering::Release);
        }
        Ok(inserted)
    }

    /// Merge rows written by another instance if the persisted revision is
    /// ahead of ours. Local rows always take precedence.
    async fn refresh(&self) -> Result<(), KeystoreError> {
        let local = self.revision.load(Ordering::Acquire);
        let persisted = read_revision(self.kind, self.persistence.as_ref()).await?;
        if persisted <= local {
            return Ok(());
        }
        let external = read_topics(self.kind, self.persistence.as_ref()).await?;
        let merged = {
            let mut topics = self.topics.write();
            let mut merged = 0usize;
            for (topic, row) in external {
                if let Entry::Vacant(slot) = topics.entry(topic) {
                    slot.insert(row);
                    merged += 1;
                }
            }
            merged
        };
        self.revision.store(persisted, Ordering::Release);
        tracing::debug!(store = ?self.kind, local, persisted, merged, "refreshed topic store");
        Ok(())
    }

    pub fn lookup(&self, topic: &str) -> Option<TopicData> {
        self.topics.read().get(topic).cloned()
    }

    /// Snapshot of every stored row, ordered by topic.
    pub fn topics(&self) -> Vec<TopicData> {
        let mut rows: Vec<TopicData> = self.topics.read().values().cloned().collect();
        rows.sort_by(|a, b| a.topic.cmp(&b.topic));
        rows
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }
}

/// Read `key`, treating undecodable or unauthenticated data as absent.
/// Backend I/O failures still propagate.
async fn read_item(
    kind: StoreKind,
    persistence: &dyn Persistence,
    key: &str,
) -> Result<Option<Vec<u8>>, KeystoreError> {
    match persistence.get_item(key).await {
        Ok(item) => Ok(item),
        Err(e)
            if matches!(
                e.code(),
                ErrorCode::InvalidInput | ErrorCode::ValidationFailed | ErrorCode::DecryptionFailed
            ) =>
        {
            tracing::warn!(store = ?kind, key, error = %e, "unreadable stored item, treating as absent");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn read_revision(kind: StoreKind, persistence: &dyn Persistence) -> Result<u64, KeystoreError> {
    let Some(bytes) = read_item(kind, persistence, &kind.revision_key()).await? else {
        return Ok(0);
    };
    match <[u8; 8]>::try_from(bytes.as_slice()) {
        Ok(raw) => Ok(u64::from_be_bytes(raw)),
        Err(_) => {
            tracing::warn!(store = ?kind, len = bytes.len(), "corrupt revision counter, treating as 0");
            Ok(0)
        }
    }
}

async fn read_topics(
    kind: StoreKind,
    persistence: &dyn Persistence,
) -> Result<HashMap<String, TopicData>, KeystoreError> {
    let Some(bytes) = read_item(kind, persistence, kind.storage_key()).await? else {
        return Ok(HashMap::new());
    };
    let map = match proto::TopicMap::decode(bytes.as_slice()) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(store = ?kind, error = %e, "corrupt topic map, starting empty");
            return Ok(HashMap::new());
        }
    };

    let mut topics = HashMap::with_capacity(map.topics.len());
    for (topic, row) in map.topics {
        let invitation = if row.invitation.is_empty() {
            None
        } else {
            match Invitation::from_bytes(&row.invitation) {
                Ok(invitation) => Some(invitation),
                Err(e) => {
                    tracing::warn!(store = ?kind, topic = %topic, error = %e, "skipping corrupt topic row");
                    continue;
                }
            }
        };
        let data = TopicData {
            topic: topic.clone(),
            created_ns: row.created_ns,
            peer_address: row.peer_address,
            invitation,
        };
        topics.insert(topic, data);
    }
    Ok(topics)
}

fn encode_topics(topics: &HashMap<String, TopicData>) -> Vec<u8> {
    proto::TopicMap {
        topics: topics
            .iter()
            .map(|(topic, row)| {
                (
                    topic.clone(),
                    proto::TopicData {
                        created_ns: row.created_ns,
                        peer_address: row.peer_address.clone(),
                        invitation: row
                            .invitation
                            .as_ref()
                            .map(|i| i.to_bytes().to_vec())
                            .unwrap_or_default(),
                    },
                )
            })
            .collect(),
    }
    .encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{EncryptedPersistence, InMemoryPersistence};
    use ember_crypto::OsCryptoProvider;

    async fn store(kind: StoreKind, backing: &InMemoryPersistence) -> TopicStore {
        TopicStore::load(kind, Arc::new(backing.clone())).await.unwrap()
    }

    #[tokio::test]
    async fn v1_first_write_wins() {
        let backing = InMemoryPersistence::new();
        let v1 = store(StoreKind::V1, &backing).await;

        assert_eq!(v1.add(vec![TopicData::v1("t1", "0xabc", 1)]).await.unwrap(), 1);
        assert_eq!(v1.topics().len(), 1);

        assert_eq!(v1.add(vec![TopicData::v1("t1", "0xdef", 2)]).await.unwrap(), 0);
        let topics = v1.topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0], TopicData::v1("t1", "0xabc", 1));
    }

    #[tokio::test]
    async fn duplicate_in_one_batch_keeps_first() {
        let backing = InMemoryPersistence::new();
        let v1 = store(StoreKind::V1, &backing).await;
        let inserted = v1
            .add(vec![TopicData::v1("t", "0x1", 1), TopicData::v1("t", "0x2", 2)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(v1.lookup("t").unwrap().peer_address, "0x1");
    }

    #[tokio::test]
    async fn visible_from_fresh_instance() {
        let backing = InMemoryPersistence::new();
        let invitation = Invitation::generate(None, &OsCryptoProvider);
        let topic = invitation.topic().to_owned();
        store(StoreKind::V2, &backing)
            .await
            .add(vec![TopicData::v2(invitation.clone(), "0xpeer", 10)])
            .await
            .unwrap();

        let reloaded = store(StoreKind::V2, &backing).await;
        let row = reloaded.lookup(&topic).unwrap();
        assert_eq!(row.invitation.unwrap(), invitation);
        assert_eq!(row.created_ns, 10);
        assert_eq!(reloaded.revision(), 1);
    }

    #[tokio::test]
    async fn first_write_wins_across_instances() {
        let backing = InMemoryPersistence::new();
        let a = store(StoreKind::V1, &backing).await;
        let b = store(StoreKind::V1, &backing).await;

        a.add(vec![TopicData::v1("shared", "0xa", 1)]).await.unwrap();
        // b has not seen a's write yet; its add refreshes first
        assert_eq!(b.add(vec![TopicData::v1("shared", "0xb", 2)]).await.unwrap(), 0);
        assert_eq!(b.lookup("shared").unwrap().peer_address, "0xa");

        b.add(vec![TopicData::v1("only-b", "0xb", 3)]).await.unwrap();
        let fresh = store(StoreKind::V1, &backing).await;
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.lookup("shared").unwrap().peer_address, "0xa");
        assert_eq!(fresh.revision(), 2);
    }

    #[tokio::test]
    async fn invalid_rows_are_dropped() {
        let backing = InMemoryPersistence::new();
        let v1 = store(StoreKind::V1, &backing).await;
        let inserted = v1
            .add(vec![TopicData::v1("t", "", 1), TopicData::v1("", "0x1", 1)])
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        assert!(backing.is_empty());

        let v2 = store(StoreKind::V2, &backing).await;
        assert_eq!(v2.add(vec![TopicData::v1("t", "0x1", 1)]).await.unwrap(), 0);

        let invitation = Invitation::generate(None, &OsCryptoProvider);
        let mut mismatched = TopicData::v2(invitation, "0x1", 1);
        mismatched.topic = "other".into();
        assert_eq!(v2.add(vec![mismatched]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_data_loads_empty() {
        let backing = InMemoryPersistence::new();
        backing
            .set_item(StoreKind::V2.storage_key(), b"\xff\xff\xff not a topic map")
            .await
            .unwrap();
        backing
            .set_item(&StoreKind::V2.revision_key(), b"bad")
            .await
            .unwrap();
        let v2 = store(StoreKind::V2, &backing).await;
        assert!(v2.is_empty());
        assert_eq!(v2.revision(), 0);
    }

    #[tokio::test]
    async fn corrupt_encrypted_data_loads_empty() {
        let backing = InMemoryPersistence::new();
        backing
            .set_item(StoreKind::V2.storage_key(), b"garbage-bytes")
            .await
            .unwrap();
        backing
            .set_item(&StoreKind::V2.revision_key(), b"garbage-bytes")
            .await
            .unwrap();
        let identity = ember_crypto::PrivateKey::generate(&OsCryptoProvider).unwrap();
        let encrypted: Arc<dyn Persistence> = Arc::new(EncryptedPersistence::new(
            Arc::new(backing.clone()),
            &identity,
            Arc::new(OsCryptoProvider),
        ));

        let v2 = TopicStore::load(StoreKind::V2, Arc::clone(&encrypted))
            .await
            .unwrap();
        assert!(v2.is_empty());
        assert_eq!(v2.revision(), 0);

        // The store stays writable and overwrites the garbage
        let invitation = Invitation::generate(None, &OsCryptoProvider);
        let topic = invitation.topic().to_owned();
        assert_eq!(v2.add(vec![TopicData::v2(invitation, "0x1", 1)]).await.unwrap(), 1);
        let reloaded = TopicStore::load(StoreKind::V2, encrypted).await.unwrap();
        assert!(reloaded.lookup(&topic).is_some());
    }

    struct BrokenDisk;

    #[async_trait::async_trait]
    impl Persistence for BrokenDisk {
        async fn get_item(&self, _key: &str) -> Result<Option<Vec<u8>>, KeystoreError> {
            Err(KeystoreError::Persistence("disk unreadable".into()))
        }

        async fn set_item(&self, _key: &str, _value: &[u8]) -> Result<(), KeystoreError> {
            Err(KeystoreError::Persistence("disk unreadable".into()))
        }
    }

    #[tokio::test]
    async fn backend_failures_still_propagate() {
        let err = TopicStore::load(StoreKind::V1, Arc::new(BrokenDisk))
            .await
            .err()
            .unwrap();
        assert_eq!(err, KeystoreError::Persistence("disk unreadable".into()));
    }

    #[tokio::test]
    async fn exhausted_revision_counter_restarts() {
        let backing = InMemoryPersistence::new();
        backing
            .set_item(&StoreKind::V1.revision_key(), &u64::MAX.to_be_bytes())
            .await
            .unwrap();
        let v1 = store(StoreKind::V1, &backing).await;
        assert_eq!(v1.revision(), u64::MAX);

        assert_eq!(v1.add(vec![TopicData::v1("t", "0x1", 1)]).await.unwrap(), 1);
        assert_eq!(v1.revision(), 1);

        let fresh = store(StoreKind::V1, &backing).await;
        assert_eq!(fresh.revision(), 1);
        assert_eq!(fresh.lookup("t").unwrap().peer_address, "0x1");
    }

    #[tokio::test]
    async fn unrevisioned_stores_skip_counter() {
        let backing = InMemoryPersistence::new();
        let legacy = store(StoreKind::Legacy, &backing).await;
        legacy.add(vec![TopicData::v1("t", "0x1", 1)]).await.unwrap();
        assert_eq!(backing.keys(), [StoreKind::Legacy.storage_key()]);
        assert_eq!(legacy.revision(), 0);
    }

    #[tokio::test]
    async fn concurrent_adds_all_land() {
        let backing = InMemoryPersistence::new();
        let v1 = Arc::new(store(StoreKind::V1, &backing).await);
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let v1 = Arc::clone(&v1);
                tokio::spawn(async move {
                    v1.add(vec![TopicData::v1(format!("t{i}"), "0x1", i)]).await
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }
        let fresh = store(StoreKind::V1, &backing).await;
        assert_eq!(fresh.len(), 16);
        assert_eq!(fresh.revision(), 16);
    }
}
