use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bincode::Options;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sled::{Config, Db, IVec, Tree};
use tracing::debug;
use uuid::Uuid;

use crate::{
    application::services::{CatalogRepository, ContextAdmin, ContextStore},
    domain::{CatalogRecord, ContextEntry, DomainError},
};

const CONTEXTS_TREE: &str = "contexts";

/// Knowledge-base entry as persisted, with the sequence number that fixes its position.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    sequence: u64,
    entry: ContextEntry,
}

/// Embedded store backed by `sled`.
///
/// Knowledge-base entries live in one tree keyed by their id. Catalog records get a
/// tree per record kind, handed out through [`SledStore::catalog`].
pub struct SledStore {
    db: Db,
    contexts: Tree,
    data_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SledStore {
    /// Opens (or creates) a sled database rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|err| {
            DomainError::storage(format!("failed to create data directory {:?}: {err}", dir))
        })?;

        let db = Config::default()
            .path(&dir)
            .cache_capacity(16 * 1024 * 1024)
            .open()
            .map_err(|err| DomainError::storage(format!("failed to open sled db: {err}")))?;

        let contexts = db
            .open_tree(CONTEXTS_TREE)
            .map_err(|err| DomainError::storage(format!("failed to open contexts tree: {err}")))?;

        debug!(target: "finsight::storage", path = %dir.display(), "sled store opened");

        Ok(Self {
            db,
            contexts,
            data_dir: dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Repository for one catalog record kind.
    pub fn catalog<T: CatalogRecord>(&self) -> Result<SledCatalog<T>, DomainError> {
        let tree = self.db.open_tree(T::COLLECTION).map_err(|err| {
            DomainError::storage(format!("failed to open {} tree: {err}", T::COLLECTION))
        })?;

        Ok(SledCatalog {
            tree,
            write_lock: Arc::clone(&self.write_lock),
            _marker: PhantomData,
        })
    }

    pub fn ping(&self) -> Result<(), DomainError> {
        self.db
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush db: {err}")))?;

        Ok(())
    }

    fn read_entry(&self, id: &str) -> Result<Option<StoredEntry>, DomainError> {
        self.contexts
            .get(id.as_bytes())
            .map_err(|err| DomainError::storage(format!("failed to read context entry: {err}")))?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }
}

impl ContextStore for SledStore {
    fn fetch_all(&self) -> Result<Vec<ContextEntry>, DomainError> {
        let mut stored: Vec<StoredEntry> = Vec::new();

        for item in self.contexts.iter() {
            let (_, value) = item.map_err(|err| {
                DomainError::store_unavailable(format!("failed to read context entry: {err}"))
            })?;
            let entry = deserialize::<StoredEntry>(&value).map_err(|err| {
                DomainError::store_unavailable(format!("unreadable context entry: {err}"))
            })?;
            stored.push(entry);
        }

        stored.sort_by_key(|s| s.sequence);
        Ok(stored.into_iter().map(|s| s.entry).collect())
    }
}

impl ContextAdmin for SledStore {
    fn get_entry(&self, id: &str) -> Result<Option<ContextEntry>, DomainError> {
        Ok(self.read_entry(id)?.map(|stored| stored.entry))
    }

    fn upsert_entry(&self, entry: &ContextEntry) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock();

        let sequence = match self.read_entry(&entry.id)? {
            Some(existing) => existing.sequence,
            None => self.db.generate_id().map_err(|err| {
                DomainError::storage(format!("failed to allocate sequence: {err}"))
            })?,
        };

        let bytes = serialize(&StoredEntry {
            sequence,
            entry: entry.clone(),
        })?;
        self.contexts
            .insert(entry.id.as_bytes(), bytes)
            .map_err(|err| DomainError::storage(format!("failed to persist context: {err}")))?;

        self.contexts
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush contexts: {err}")))?;

        Ok(())
    }

    fn delete_entry(&self, id: &str) -> Result<bool, DomainError> {
        let _guard = self.write_lock.lock();

        let removed = self
            .contexts
            .remove(id.as_bytes())
            .map_err(|err| DomainError::storage(format!("failed to delete context: {err}")))?;

        self.contexts
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush contexts: {err}")))?;

        Ok(removed.is_some())
    }
}

/// sled-backed [`CatalogRepository`] for a single record kind.
pub struct SledCatalog<T> {
    tree: Tree,
    write_lock: Arc<Mutex<()>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: CatalogRecord> CatalogRepository<T> for SledCatalog<T> {
    fn list(&self) -> Result<Vec<T>, DomainError> {
        let mut items: Vec<T> = Vec::new();

        for entry in self.tree.iter() {
            let (_, value) = entry.map_err(|err| {
                DomainError::storage(format!("failed to read {} record: {err}", T::COLLECTION))
            })?;
            items.push(decode_record(&value)?);
        }

        items.sort_by(T::listing_order);
        Ok(items)
    }

    fn get(&self, id: Uuid) -> Result<Option<T>, DomainError> {
        self.tree
            .get(id.as_bytes())
            .map_err(|err| {
                DomainError::storage(format!("failed to read {} record: {err}", T::COLLECTION))
            })?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    fn upsert(&self, record: &T) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock();

        let bytes = serialize(record)?;
        self.tree
            .insert(record.id().as_bytes(), bytes)
            .map_err(|err| {
                DomainError::storage(format!("failed to persist {} record: {err}", T::COLLECTION))
            })?;

        self.tree.flush().map_err(|err| {
            DomainError::storage(format!("failed to flush {}: {err}", T::COLLECTION))
        })?;

        Ok(())
    }

    fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let _guard = self.write_lock.lock();

        let removed = self.tree.remove(id.as_bytes()).map_err(|err| {
            DomainError::storage(format!("failed to delete {} record: {err}", T::COLLECTION))
        })?;

        self.tree.flush().map_err(|err| {
            DomainError::storage(format!("failed to flush {}: {err}", T::COLLECTION))
        })?;

        Ok(removed.is_some())
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, DomainError> {
    bincode::options()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .serialize(value)
        .map_err(|err| DomainError::storage(format!("serialization error: {err}")))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DomainError> {
    bincode::options()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .deserialize(bytes)
        .map_err(|err| DomainError::storage(format!("deserialization error: {err}")))
}

fn decode_record<T: DeserializeOwned>(bytes: &IVec) -> Result<T, DomainError> {
    deserialize(bytes.as_ref())
}
