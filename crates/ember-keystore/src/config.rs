use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::KeystoreError;

/// Which backend stores keystore state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PersistenceConfig {
    #[default]
    Memory,
    Directory {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreConfig {
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Key prefix. Defaults to `keystore/{walletAddress}/`.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_true")]
    pub encrypt_persistence: bool,
}

fn default_true() -> bool {
    true
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            namespace: None,
            encrypt_persistence: true,
        }
    }
}

impl KeystoreConfig {
    pub fn from_json(json: &str) -> Result<Self, KeystoreError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KeystoreError> {
        if let PersistenceConfig::Directory { path } = &self.persistence {
            if path.as_os_str().is_empty() {
                return Err(KeystoreError::Config("directory path is empty".into()));
            }
        }
        if self.namespace.as_deref() == Some("") {
            return Err(KeystoreError::Config("namespace is empty".into()));
        }
        Ok(())
    }

    /// Namespace for `wallet_address`, falling back to the default layout.
    pub fn namespace_for(&self, wallet_address: &str) -> String {
        self.namespace
            .clone()
            .unwrap_or_else(|| format!("keystore/{wallet_address}/"))
    }
}
