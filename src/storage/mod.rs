//! Key-value storage backends
//!
//! The host exposes two origin-scoped stores (local and session). Both are
//! reached through [`StorageBackend`]; every operation can fail when the
//! store is disabled, blocked, or over quota.

pub mod memory;
pub mod probe;

pub use memory::MemoryStorage;
pub use probe::is_usable;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("quota exceeded writing `{key}` ({needed} bytes, {quota} allowed)")]
    QuotaExceeded { key: String, needed: usize, quota: usize },

    #[error("host storage error: {0}")]
    Host(String),
}

impl StorageError {
    /// Classify a host exception by its `DOMException` name. Sizes are
    /// unknown on this path and reported as zero.
    pub fn from_host(name: &str, message: String, key: &str) -> Self {
        match name {
            "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED" => StorageError::QuotaExceeded {
                key: key.to_string(),
                needed: 0,
                quota: 0,
            },
            _ => StorageError::Host(format!("{}: {}", name, message)),
        }
    }
}

/// Which host store to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    #[default]
    Session,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::Session => "session",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" | "localstorage" => Some(StorageKind::Local),
            "session" | "sessionstorage" => Some(StorageKind::Session),
            _ => None,
        }
    }
}

/// String key-value store with the host storage surface.
pub trait StorageBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Stand-in for a store the host refused to hand out. Every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableStorage {
    reason: String,
}

impl UnavailableStorage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, StorageError> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }
}

impl StorageBackend for UnavailableStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        self.fail()
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        self.fail()
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        self.fail()
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.fail()
    }
}
