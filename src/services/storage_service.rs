use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{ChatError, StorageError, StorageResult};
use crate::models::{Conversation, SessionState};

pub const CONVERSATIONS_KEY: &str = "conversations";
pub const ACTIVE_CONVERSATION_KEY: &str = "activeConversationId";
pub const DARK_MODE_KEY: &str = "darkMode";

pub fn get_app_data_dir() -> Result<PathBuf, ChatError> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ChatError::Config("Could not find data directory".to_string()))?
        .join("Parlor");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

// ============================================================================
// Key-value backends
// ============================================================================

/// Durable string-to-string storage. Every `set` is a full overwrite of the
/// key; there are no transactions across keys.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}

/// Stores each key as its own file under a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// File store rooted at `<app data dir>/storage`
    pub fn in_app_data_dir() -> Result<Self, ChatError> {
        Ok(Self::new(get_app_data_dir()?.join("storage")))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)?;

        // Write to temp, then rename, so readers never see a half-written value
        let path = self.key_path(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-memory store. Clones share the same map, so a test can keep a handle
/// while the session owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries.lock().map_err(|e| StorageError::InvalidData {
            message: format!("Failed to lock storage: {}", e),
        })
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ============================================================================
// Session persistence
// ============================================================================

/// Maps `SessionState` onto a key-value backend
pub struct SessionStorage {
    store: Box<dyn KeyValueStore>,
}

impl SessionStorage {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the saved session. Unreadable or corrupt data yields an empty
    /// state; the problem is only logged.
    pub fn load(&self) -> SessionState {
        let conversations = match self.load_conversations() {
            Ok(conversations) => conversations,
            Err(e) => {
                warn!(error = %e, "Failed to load saved conversations, starting empty");
                return SessionState::default();
            }
        };

        let active_conversation_id = match self.store.get(ACTIVE_CONVERSATION_KEY) {
            Ok(id) => id.filter(|id| {
                let known = conversations.iter().any(|c| &c.id == id);
                if !known {
                    warn!(conversation_id = %id, "Saved active conversation no longer exists");
                }
                known
            }),
            Err(e) => {
                warn!(error = %e, "Failed to read active conversation id");
                None
            }
        };

        debug!(count = conversations.len(), "Loaded conversations");

        SessionState {
            active_conversation_id,
            conversations,
        }
    }

    fn load_conversations(&self) -> StorageResult<Vec<Conversation>> {
        match self.store.get(CONVERSATIONS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Overwrite the stored list and active id with `state`. The active-id
    /// key is removed when nothing is active.
    pub fn save(&mut self, state: &SessionState) -> StorageResult<()> {
        let json = serde_json::to_string(&state.conversations)?;
        self.store.set(CONVERSATIONS_KEY, &json)?;

        match &state.active_conversation_id {
            Some(id) => self.store.set(ACTIVE_CONVERSATION_KEY, id),
            None => self.store.remove(ACTIVE_CONVERSATION_KEY),
        }
    }

    pub fn load_dark_mode(&self) -> bool {
        match self.store.get(DARK_MODE_KEY) {
            Ok(Some(value)) => value.trim() == "true",
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read dark mode preference");
                false
            }
        }
    }

    pub fn save_dark_mode(&mut self, enabled: bool) -> StorageResult<()> {
        self.store.set(DARK_MODE_KEY, if enabled { "true" } else { "false" })
    }
}
