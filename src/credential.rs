use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No API key selected. Please select an API key.")]
    NotSelected,
    #[error("API key must not be empty")]
    Empty,
    #[error("This host has no way to select an API key")]
    Unavailable,
}

/// Host capability that owns the Gemini API key. The client only reads it.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn has_credential(&self) -> bool;

    /// Ask the host to make a key available.
    async fn request_credential(&self) -> Result<(), CredentialError>;

    /// Current key, read fresh on every call so a newly selected key is picked up.
    fn api_key(&self) -> Option<String>;

    /// Store a key chosen by the user.
    fn select(&self, _key: &str) -> Result<(), CredentialError> {
        Err(CredentialError::Unavailable)
    }
}

/// Key store seeded from the environment. Keys can also be selected at
/// runtime unless selection is switched off.
pub struct KeyStore {
    env_var: String,
    key: RwLock<Option<String>>,
    selectable: bool,
}

impl KeyStore {
    pub fn new(env_var: impl Into<String>, initial: Option<String>) -> Self {
        Self { env_var: env_var.into(), key: RwLock::new(initial.filter(|k| !k.trim().is_empty())), selectable: true }
    }

    /// Whether users may replace the key at runtime.
    pub fn with_selection(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    fn store(&self, key: &str) -> Result<(), CredentialError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CredentialError::Empty);
        }
        *self.key.write() = Some(key.to_string());
        info!("🔑 API key selected ({} chars)", key.len());
        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for KeyStore {
    async fn has_credential(&self) -> bool {
        self.key.read().is_some()
    }

    async fn request_credential(&self) -> Result<(), CredentialError> {
        if self.key.read().is_some() {
            return Ok(());
        }
        // A key may have been exported after startup.
        match std::env::var(&self.env_var).ok().filter(|k| !k.trim().is_empty()) {
            Some(key) => self.store(&key),
            None => {
                warn!("⚠️ {} is not set and no key has been selected", self.env_var);
                Err(CredentialError::NotSelected)
            }
        }
    }

    fn api_key(&self) -> Option<String> {
        self.key.read().clone()
    }

    fn select(&self, key: &str) -> Result<(), CredentialError> {
        if !self.selectable {
            return Err(CredentialError::Unavailable);
        }
        self.store(key)
    }
}

/// Provider for hosts with no key-selection mechanism.
pub struct NoCredential;

#[async_trait]
impl CredentialProvider for NoCredential {
    async fn has_credential(&self) -> bool {
        false
    }

    async fn request_credential(&self) -> Result<(), CredentialError> {
        Err(CredentialError::Unavailable)
    }

    fn api_key(&self) -> Option<String> {
        None
    }
}
