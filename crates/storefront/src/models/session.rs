//! Session persistence.
//!
//! The session is a single opaque token kept in a durable key/value store
//! under [`keys::TOKEN`], plus an in-memory flag recording whether the token
//! has been accepted by the server in this process.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use secrecy::SecretString;
use thiserror::Error;

/// Session keys.
pub mod keys {
    /// Key for the authentication token.
    pub const TOKEN: &str = "token";
}

/// Errors from the durable session store.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Reading or writing the backing file failed.
    #[error("session store I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing file is not a JSON object of strings.
    #[error("session store is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Durable string key/value storage.
pub trait SessionStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError` if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError` if the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;

    /// Delete a value. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError` if the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;
}

// =============================================================================
// FileSessionStore
// =============================================================================

/// A JSON object on disk, rewritten in full on every change.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SessionStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

// =============================================================================
// MemorySessionStore
// =============================================================================

/// Process-local store, used by tests and one-shot tools.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds a token.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(keys::TOKEN.to_string(), token.to_string());
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

/// The process-wide session.
///
/// The token is read-mostly: it is written only by sign-in, sign-out and
/// expiry detection. `authenticated` becomes true once the server accepts
/// the token (startup validation or a fresh sign-in).
pub struct Session {
    store: Arc<dyn SessionStore>,
    token: RwLock<Option<String>>,
    authenticated: AtomicBool,
}

impl Session {
    /// Load the persisted token, if any. The session starts unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError` if the store cannot be read.
    pub fn load(store: Arc<dyn SessionStore>) -> Result<Self, SessionStoreError> {
        let token = store.get(keys::TOKEN)?.filter(|t| !t.is_empty());
        Ok(Self {
            store,
            token: RwLock::new(token),
            authenticated: AtomicBool::new(false),
        })
    }

    /// The current token, if one is held.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .map(SecretString::from)
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire) && self.has_token()
    }

    /// Persist a freshly issued token and mark the session authenticated.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError` if the token cannot be persisted.
    pub fn begin(&self, token: &str) -> Result<(), SessionStoreError> {
        self.store.set(keys::TOKEN, token)?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        self.authenticated.store(true, Ordering::Release);
        Ok(())
    }

    /// Mark a restored token as accepted by the server.
    pub fn mark_authenticated(&self) {
        self.authenticated.store(true, Ordering::Release);
    }

    /// Forget the token, in memory and on disk.
    ///
    /// Returns `true` if a token was held, so callers can tell the first
    /// expiry apart from repeats.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError` if the store cannot be written. The
    /// in-memory token is cleared regardless.
    pub fn end(&self) -> Result<bool, SessionStoreError> {
        self.authenticated.store(false, Ordering::Release);
        let had_token = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        self.store.remove(keys::TOKEN)?;
        Ok(had_token)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.has_token().then_some("[REDACTED]"))
            .field("authenticated", &self.authenticated.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_file_store_roundtrip_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");
        let store = FileSessionStore::new(&path);

        assert_eq!(store.get(keys::TOKEN).unwrap(), None);
        store.set(keys::TOKEN, "abc").unwrap();
        assert_eq!(store.get(keys::TOKEN).unwrap().as_deref(), Some("abc"));

        // A second handle on the same file sees the value.
        let reopened = FileSessionStore::new(&path);
        assert_eq!(reopened.get(keys::TOKEN).unwrap().as_deref(), Some("abc"));

        store.remove(keys::TOKEN).unwrap();
        assert_eq!(reopened.get(keys::TOKEN).unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let err = FileSessionStore::new(&path).get(keys::TOKEN).unwrap_err();
        assert!(matches!(err, SessionStoreError::Parse(_)));
    }

    #[test]
    fn test_session_starts_unauthenticated_with_restored_token() {
        let session = Session::load(Arc::new(MemorySessionStore::with_token("t-1"))).unwrap();
        assert!(session.has_token());
        assert!(!session.is_authenticated());

        session.mark_authenticated();
        assert!(session.is_authenticated());
        assert_eq!(session.token().unwrap().expose_secret(), "t-1");
    }

    #[test]
    fn test_begin_persists_and_end_clears() {
        let store = Arc::new(MemorySessionStore::new());
        let session = Session::load(store.clone()).unwrap();

        session.begin("fresh").unwrap();
        assert!(session.is_authenticated());
        assert_eq!(store.get(keys::TOKEN).unwrap().as_deref(), Some("fresh"));

        assert!(session.end().unwrap());
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert_eq!(store.get(keys::TOKEN).unwrap(), None);

        // Ending twice reports that nothing was held the second time.
        assert!(!session.end().unwrap());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::load(Arc::new(MemorySessionStore::with_token("secret-token"))).unwrap();
        let debug_output = format!("{session:?}");
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
