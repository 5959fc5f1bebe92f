//! Session persistence across the authorization redirect.
//!
//! [`SessionStore`] is a plain string key/value store. [`SessionPersistence`]
//! layers typed, single-use access to [`AuthorizationRequestState`] on top of
//! it: a session is removed on every [`SessionPersistence::take`], including
//! when it can no longer be decoded.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::error::OAuthError;
use crate::session::AuthorizationRequestState;

/// Key prefix for persisted sessions.
pub const SESSION_KEY_PREFIX: &str = "fhirlink.session.";

/// String key/value storage for pending sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> Result<Option<String>, OAuthError>;

    /// Writes a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> Result<(), OAuthError>;

    /// Deletes a value. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), OAuthError>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, OAuthError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), OAuthError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), OAuthError> {
        (**self).remove(key).await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, OAuthError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), OAuthError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), OAuthError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// Stores each key as a JSON file in a directory, so pending sessions
/// survive a process restart between redirect and callback.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Bytes outside [A-Za-z0-9._-] are percent-encoded, '%' included, so
    // distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, OAuthError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OAuthError::storage(format!("failed to read '{key}': {e}"))),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), OAuthError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            OAuthError::storage(format!(
                "failed to create {}: {e}",
                self.dir.display()
            ))
        })?;
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|e| OAuthError::storage(format!("failed to write '{key}': {e}")))
    }

    async fn remove(&self, key: &str) -> Result<(), OAuthError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OAuthError::storage(format!("failed to remove '{key}': {e}"))),
        }
    }
}

// ============================================================================
// Typed persistence
// ============================================================================

/// Typed, single-use session persistence keyed by vendor.
///
/// Saving twice under the same vendor key overwrites: only the most recent
/// authorization attempt can complete.
pub struct SessionPersistence<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> SessionPersistence<S> {
    /// Wraps `store`. The clock is used by [`Self::take_fresh`].
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(vendor_key: &str) -> String {
        format!("{SESSION_KEY_PREFIX}{vendor_key}")
    }

    /// Persists `state` under `vendor_key`, replacing any pending session.
    ///
    /// # Errors
    ///
    /// Returns `storage_error` if the store fails.
    pub async fn save(
        &self,
        vendor_key: &str,
        state: &AuthorizationRequestState,
    ) -> Result<(), OAuthError> {
        let value = serde_json::to_string(state)
            .map_err(|e| OAuthError::storage(format!("failed to encode session: {e}")))?;
        self.store.set(&Self::key(vendor_key), value).await?;
        tracing::debug!(vendor = %vendor_key, "Saved authorization session");
        Ok(())
    }

    /// Reads and deletes the pending session for `vendor_key`.
    ///
    /// The entry is deleted before decoding, so a corrupt session is not
    /// offered again.
    ///
    /// # Errors
    ///
    /// Returns `storage_error` if the store fails, or `invalid_session` if
    /// the stored value cannot be decoded.
    pub async fn take(
        &self,
        vendor_key: &str,
    ) -> Result<Option<AuthorizationRequestState>, OAuthError> {
        let key = Self::key(vendor_key);
        let Some(value) = self.store.get(&key).await? else {
            return Ok(None);
        };
        self.store.remove(&key).await?;

        serde_json::from_str(&value)
            .map(Some)
            .map_err(|e| OAuthError::invalid_session(format!("failed to decode session: {e}")))
    }

    /// Like [`Self::take`], but discards sessions older than `max_age`.
    ///
    /// # Errors
    ///
    /// As [`Self::take`].
    pub async fn take_fresh(
        &self,
        vendor_key: &str,
        max_age: Duration,
    ) -> Result<Option<AuthorizationRequestState>, OAuthError> {
        let Some(state) = self.take(vendor_key).await? else {
            return Ok(None);
        };

        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let age = state.age(self.clock.now());
        if age > max_age {
            tracing::debug!(vendor = %vendor_key, age, "Discarded stale authorization session");
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Deletes any pending session for `vendor_key`.
    ///
    /// # Errors
    ///
    /// Returns `storage_error` if the store fails.
    pub async fn clear(&self, vendor_key: &str) -> Result<(), OAuthError> {
        self.store.remove(&Self::key(vendor_key)).await
    }
}
