//! Session identity.
//!
//! Each client holds one opaque session id, created on first use and kept in
//! durable storage until the session ends. The backend uses it to isolate
//! per-user directories and buckets, so it is attached to every request.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ClientError;

/// Storage key of the session id.
pub const SESSION_KEY: &str = "session-id";

/// File name of the durable key-value document.
pub const SESSION_FILE: &str = "session.json";

/// Durable string key-value storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    fn remove(&self, key: &str) -> Result<(), ClientError>;
}

/// In-memory store, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store backed by one JSON document in a state directory.
///
/// Writes go to a temporary file that is renamed over the document, so a
/// crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Create a store in `state_dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns `ClientError::Io` if the directory cannot be created.
    pub fn new(state_dir: &Path) -> Result<Self, ClientError> {
        fs::create_dir_all(state_dir)
            .map_err(|e| ClientError::io(state_dir.display().to_string(), e))?;
        Ok(Self {
            path: state_dir.join(SESSION_FILE),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, ClientError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ClientError::Session {
                message: format!("{} is corrupt: {}", self.path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(ClientError::io(self.path.display().to_string(), e)),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), ClientError> {
        let tmp: PathBuf = self.path.with_extension("json.tmp");
        let json: Vec<u8> = serde_json::to_vec_pretty(entries).map_err(|e| ClientError::Session {
            message: e.to_string(),
        })?;

        let mut file: fs::File =
            fs::File::create(&tmp).map_err(|e| ClientError::io(tmp.display().to_string(), e))?;
        file.write_all(&json)
            .and_then(|_| file.sync_all())
            .map_err(|e| ClientError::io(tmp.display().to_string(), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::io(self.path.display().to_string(), e))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let _guard = self.lock.lock();
        let mut entries: HashMap<String, String> = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        let _guard = self.lock.lock();
        let mut entries: HashMap<String, String> = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// Issues and forgets the client's session id.
///
/// The id is read from the store once and then served from memory; every
/// backend request asks for it.
#[derive(Clone)]
pub struct SessionIdentity {
    store: Arc<dyn SessionStore>,
    // Also serializes get-or-create so two callers never mint different ids.
    current: Arc<Mutex<Option<String>>>,
}

impl SessionIdentity {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Identity backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    /// Return the session id, loading it from the store or creating and
    /// persisting one on first use.
    ///
    /// # Errors
    /// Returns the store's error if it cannot be read or written.
    pub fn session_id(&self) -> Result<String, ClientError> {
        let mut current = self.current.lock();
        if let Some(id) = current.as_ref() {
            return Ok(id.clone());
        }

        let id: String = match self.store.get(SESSION_KEY)? {
            Some(existing) if !existing.is_empty() => existing,
            _ => {
                let id: String = Uuid::new_v4().to_string();
                self.store.set(SESSION_KEY, &id)?;
                info!(session_id = %id, "Created new session id");
                id
            }
        };
        *current = Some(id.clone());
        Ok(id)
    }

    /// Forget the session id; the next call to `session_id` mints a new one.
    ///
    /// # Errors
    /// Returns the store's error; the id is then still in use.
    pub fn remove_session_id(&self) -> Result<(), ClientError> {
        let mut current = self.current.lock();
        self.store.remove(SESSION_KEY)?;
        *current = None;
        debug!("Removed session id");
        Ok(())
    }
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity").finish_non_exhaustive()
    }
}
