use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::Persistence;
use crate::error::KeystoreError;

/// One file per key under a root directory. File names are the hex encoding
/// of the key, so any key string is a safe file name.
#[derive(Debug, Clone)]
pub struct DirectoryPersistence {
    root: PathBuf,
}

impl DirectoryPersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(hex::encode(key.as_bytes()))
    }
}

#[async_trait]
impl Persistence for DirectoryPersistence {
    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, KeystoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(key);
        // Write-then-rename so readers never see a torn file. Each write gets
        // its own temp name so concurrent writers of one key never share it.
        let tmp = path.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));
        let written = match tokio::fs::write(&tmp, value).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::trace!(key, bytes = value.len(), "persisted item");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_new_instance() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = DirectoryPersistence::new(dir.path().join("store"));
        assert_eq!(first.get_item("a/b").await.unwrap(), None);
        first.set_item("a/b", b"one").await.unwrap();
        first.set_item("a/b", b"two").await.unwrap();

        let second = DirectoryPersistence::new(dir.path().join("store"));
        assert_eq!(second.get_item("a/b").await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn concurrent_writers_of_one_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = DirectoryPersistence::new(dir.path());
        let b = DirectoryPersistence::new(dir.path());

        let write_all = |store: DirectoryPersistence, value: &'static [u8]| async move {
            for _ in 0..50 {
                store.set_item("shared", value).await.unwrap();
            }
        };
        tokio::join!(write_all(a.clone(), b"from-a"), write_all(b, b"from-b"));

        let last = a.get_item("shared").await.unwrap().unwrap();
        assert!(last == b"from-a" || last == b"from-b");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }

    #[tokio::test]
    async fn keys_are_hex_file_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = DirectoryPersistence::new(dir.path());
        store.set_item("../escape", b"x").await.unwrap();
        assert!(dir.path().join(hex::encode("../escape")).exists());
    }
}
