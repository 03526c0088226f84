//! User configuration persistence.
//!
//! The orchestrator only ever talks to a [`ConfigStore`]: `get` a key, or
//! `set` one with merge-on-write semantics. [`JsonFileStore`] keeps the
//! document at `~/.config/bridge-cli/config.json` (mode 0600 on unix);
//! [`MemoryStore`] backs tests.

use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cloud credential, also exported to the agent under the same name.
pub const KEY_API_KEY: &str = "GEMINI_API_KEY";

/// Model identifier used in Cloud mode.
pub const KEY_CLOUD_MODEL: &str = "GEMINI_MODEL";

/// Model identifier used in Local mode.
pub const KEY_LOCAL_MODEL: &str = "LOCAL_MODEL";

pub const DEFAULT_CLOUD_MODEL: &str = "gemini/gemini-1.5-pro-latest";
pub const DEFAULT_LOCAL_MODEL: &str = "ollama/qwen2.5-coder:32b";

/// Key/value persistence with merge-on-write semantics.
pub trait ConfigStore: Send + Sync {
    /// Read one key. Absent keys are `None`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write one key, leaving every other key untouched.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Whether anything has ever been written.
    fn exists(&self) -> bool;

    /// Write several keys in one merge.
    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Read-only view of the values the orchestrator consumes.
    fn snapshot(&self) -> Result<ConfigSnapshot> {
        Ok(ConfigSnapshot {
            api_key: self.get(KEY_API_KEY)?.unwrap_or_default(),
            cloud_model: self
                .get(KEY_CLOUD_MODEL)?
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_CLOUD_MODEL.to_string()),
            local_model: self
                .get(KEY_LOCAL_MODEL)?
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
        })
    }
}

/// Values read from the store for one menu render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub api_key: String,
    pub cloud_model: String,
    pub local_model: String,
}

impl ConfigSnapshot {
    /// A credential counts as present only when non-blank.
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cloud_model: DEFAULT_CLOUD_MODEL.to_string(),
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
        }
    }
}

/// JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$BRIDGE_CONFIG`, or the per-user default location.
    pub fn open_default() -> Self {
        Self::new(Self::default_path())
    }

    /// Get the config file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("BRIDGE_CONFIG") {
            PathBuf::from(path)
        } else {
            config_dir().join("config.json")
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole document; keys bridge doesn't know keep their original values.
    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, document: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, content)?;
        restrict_to_owner(&self.path)?;
        debug!("Wrote {} keys to {}", document.len(), self.path.display());
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.load()?.remove(key) {
            Some(Value::String(value)) => Some(value),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<()> {
        let mut document = self.load()?;
        for (key, value) in entries {
            document.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        self.write(&document)
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Option<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(entries: &[(&str, &str)]) -> Self {
        let values = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self {
            values: Some(values),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.as_ref().and_then(|v| v.get(key).cloned()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn exists(&self) -> bool {
        self.values.is_some()
    }
}

/// Directory holding bridge's configuration files.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bridge-cli")
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
