//! Snapshot persistence for RollChain
//!
//! The whole forest is written as one document. Every backend replaces the
//! previous snapshot atomically so a reader never sees a partial write.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{LedgerError, Result};
use crate::hierarchy::ChainDocument;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const BACKUP_SUFFIX: &str = ".backup";

/// Serialized form of the whole registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    #[serde(default)]
    pub units: BTreeMap<String, ChainDocument>,
    #[serde(default)]
    pub groups: BTreeMap<String, ChainDocument>,
    #[serde(default)]
    pub members: BTreeMap<String, ChainDocument>,
    pub saved_at: u64,
}

impl SnapshotDocument {
    pub fn chain_count(&self) -> usize {
        self.units.len() + self.groups.len() + self.members.len()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Abstraction for snapshot backends. `save` replaces the stored snapshot as
/// a whole; `load` returns `None` when nothing has been saved yet.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &SnapshotDocument) -> Result<()>;
    fn load(&self) -> Result<Option<SnapshotDocument>>;
    fn describe(&self) -> String;
}

/// Open the backend named by the storage configuration
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn SnapshotStore>> {
    let store: Arc<dyn SnapshotStore> = match config.backend {
        StorageBackend::Json => Arc::new(JsonFileStore::new(&config.path)),
        StorageBackend::Sqlite => Arc::new(Database::open(&config.path)?),
        StorageBackend::Memory => Arc::new(InMemoryPersistence::new()),
    };
    info!(store = %store.describe(), "Snapshot store opened");
    Ok(store)
}

// ==================== JSON FILE ====================

/// Pretty JSON file, written through a temp file in the same directory and
/// renamed into place. The previous file is kept beside it as `.backup`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, snapshot: &SnapshotDocument) -> Result<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| LedgerError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())
                .map_err(|e| LedgerError::Storage(format!("Failed to create backup: {}", e)))?;
        }

        let json = snapshot.to_json()?;
        let mut file = NamedTempFile::new_in(&dir)
            .map_err(|e| LedgerError::Storage(format!("Failed to create temp file: {}", e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| LedgerError::Storage(format!("Failed to write snapshot: {}", e)))?;
        file.as_file()
            .sync_all()
            .map_err(|e| LedgerError::Storage(format!("Failed to sync snapshot: {}", e)))?;

        file.persist(&self.path)
            .map_err(|e| LedgerError::Storage(format!("Failed to finalize write: {}", e.error)))?;

        debug!(path = %self.path.display(), chains = snapshot.chain_count(), "Snapshot written");
        Ok(())
    }

    fn load(&self) -> Result<Option<SnapshotDocument>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| LedgerError::Storage(format!("Failed to read {}: {}", self.path.display(), e)))?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        SnapshotDocument::from_json(&contents).map(Some)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

// ==================== SQLITE ====================

/// SQLite store holding the latest snapshot in a single row
pub struct Database {
    conn: Mutex<Connection>,
    label: String,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;
        Self::init(conn, format!("sqlite:{}", path))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, "sqlite::memory:".to_string())
    }

    fn init(conn: Connection, label: String) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                saved_at INTEGER NOT NULL,
                chain_count INTEGER NOT NULL,
                document TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| LedgerError::Storage(format!("Failed to create snapshots table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
            label,
        })
    }
}

impl SnapshotStore for Database {
    fn save(&self, snapshot: &SnapshotDocument) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| LedgerError::Storage(format!("Failed to start transaction: {}", e)))?;
        tx.execute(
            "INSERT OR REPLACE INTO snapshots (id, saved_at, chain_count, document)
             VALUES (1, ?1, ?2, ?3)",
            params![
                snapshot.saved_at as i64,
                snapshot.chain_count() as i64,
                json
            ],
        )
        .map_err(|e| LedgerError::Storage(format!("Failed to save snapshot: {}", e)))?;
        tx.commit()
            .map_err(|e| LedgerError::Storage(format!("Failed to commit transaction: {}", e)))?;

        debug!(store = %self.label, chains = snapshot.chain_count(), "Snapshot written");
        Ok(())
    }

    fn load(&self) -> Result<Option<SnapshotDocument>> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row("SELECT document FROM snapshots WHERE id = 1", [], |row| row.get(0))
            .optional()
            .map_err(|e| LedgerError::Storage(format!("Failed to query snapshot: {}", e)))?;

        json.as_deref().map(SnapshotDocument::from_json).transpose()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

// ==================== IN MEMORY ====================

/// Keeps the serialized snapshot in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    slot: Arc<Mutex<Option<String>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored JSON, for inspection and tampering in tests
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    pub fn set_raw(&self, json: impl Into<String>) {
        *self.slot.lock() = Some(json.into());
    }
}

impl SnapshotStore for InMemoryPersistence {
    fn save(&self, snapshot: &SnapshotDocument) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        *self.slot.lock() = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<SnapshotDocument>> {
        self.slot
            .lock()
            .as_deref()
            .map(SnapshotDocument::from_json)
            .transpose()
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
