//! Durable mirror of the active session id.

use std::sync::Arc;

use parley_storage::{KeyValueStore, MemoryStore};

use crate::error::{ClientError, Result};

/// Key the session id is stored under.
pub const SESSION_KEY: &str = "parley.session_id";

/// Reads and writes the session id through a [`KeyValueStore`].
///
/// Storage failures are logged and otherwise ignored: a broken store means
/// the session does not survive a restart, nothing more.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Durable store in the default data directory.
    pub fn open_default() -> Result<Self> {
        let store = parley_storage::open_default_kv_store()
            .map_err(|err| ClientError::Storage(format!("{err:#}")))?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Store that forgets everything when the process exits.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get(&self) -> Option<String> {
        match self.backend.get(SESSION_KEY) {
            Ok(value) => value.filter(|id| !id.is_empty()),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read stored session id");
                None
            }
        }
    }

    pub fn set(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        if let Err(err) = self.backend.set(SESSION_KEY, session_id) {
            tracing::warn!(error = %err, "Failed to persist session id");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.backend.remove(SESSION_KEY) {
            tracing::warn!(error = %err, "Failed to clear stored session id");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
