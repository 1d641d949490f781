//! Store configuration (`config.toml`)

use crate::error::{IoResultExt, StoreError};
use crate::hash::HashMethod;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current on-disk layout version
pub const STORE_VERSION: u32 = 1;

/// File name of the configuration inside the store root
pub const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub user: UserSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    pub version: u32,
    #[serde(default)]
    pub hash_method: HashMethod,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            hash_method: HashMethod::default(),
        }
    }
}

/// Identity stamped on commits; empty means "ask the environment"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSection {
    #[serde(default)]
    pub name: String,
}

impl StoreConfig {
    pub fn with_hash_method(hash_method: HashMethod) -> Self {
        Self {
            store: StoreSection {
                version: STORE_VERSION,
                hash_method,
            },
            user: UserSection::default(),
        }
    }

    pub fn hash_method(&self) -> HashMethod {
        self.store.hash_method
    }

    /// Author identity: configured name, else `$USER`/`$USERNAME`
    pub fn author(&self) -> String {
        if !self.user.name.trim().is_empty() {
            return self.user.name.trim().to_string();
        }
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn from_toml(content: &str) -> Result<Self, StoreError> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))?;
        if config.store.version != STORE_VERSION {
            return Err(StoreError::Config(format!(
                "unsupported store version {} (expected {})",
                config.store.version, STORE_VERSION
            )));
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, StoreError> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Load `config.toml` from a store root, `None` if the file is absent
    pub fn load(store_root: &Path) -> Result<Option<Self>, StoreError> {
        let path = store_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).at(&path)?;
        Self::from_toml(&content).map(Some)
    }
}
