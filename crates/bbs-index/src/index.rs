//! The generic [`SecondaryIndex`] and its on-disk document.
//!
//! One JSON document per entity type:
//!
//! ```json
//! { "posts": [ ... ], "last_updated": "2024-05-01T12:30:00.123456" }
//! ```
//!
//! Every mutation is a read-modify-write of the whole document under the
//! index's resource lock. Reads take no lock; they always see a complete
//! document because each write is an atomic replace.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bbs_store::{FileStorage, StoreError};
use bbs_types::timestamp;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};
use crate::record::IndexRecord;

/// The decoded contents of an index file.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexDocument<R> {
    pub entries: Vec<R>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl<R> Default for IndexDocument<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            last_updated: None,
        }
    }
}

impl<R: IndexRecord> IndexDocument<R> {
    fn stamped(entries: Vec<R>) -> Self {
        Self {
            entries,
            last_updated: Some(timestamp::now()),
        }
    }

    fn from_value(path: &Path, value: Value) -> IndexResult<Self> {
        let corrupt = |reason: String| IndexError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        let Value::Object(mut map) = value else {
            return Err(corrupt("top level is not an object".into()));
        };
        let entries = match map.remove(R::COLLECTION) {
            Some(list) => serde_json::from_value(list)
                .map_err(|e| corrupt(format!("{}: {e}", R::COLLECTION)))?,
            None => Vec::new(),
        };
        let last_updated = match map.remove("last_updated") {
            Some(Value::String(raw)) => Some(
                timestamp::parse(&raw).map_err(|e| corrupt(format!("last_updated: {e}")))?,
            ),
            _ => None,
        };
        Ok(Self {
            entries,
            last_updated,
        })
    }
}

impl<R: IndexRecord> Serialize for IndexDocument<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(R::COLLECTION, &self.entries)?;
        map.serialize_entry(
            "last_updated",
            &self.last_updated.as_ref().map(timestamp::format),
        )?;
        map.end()
    }
}

/// A denormalized summary list stored in `index/<resource>.json`.
///
/// The index is a cache of the authoritative store: it may lag behind it,
/// and [`rebuild`](Self::rebuild) replaces it wholesale.
pub struct SecondaryIndex<R> {
    storage: Arc<FileStorage>,
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R> std::fmt::Debug for SecondaryIndex<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryIndex")
            .field("path", &self.path)
            .finish()
    }
}

impl<R> Clone for SecondaryIndex<R> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            path: self.path.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: IndexRecord> SecondaryIndex<R> {
    /// Open the index, writing an empty document if none exists yet.
    pub fn open(storage: Arc<FileStorage>) -> IndexResult<Self> {
        let path = storage.index_dir().join(format!("{}.json", R::RESOURCE));
        let index = Self {
            storage,
            path,
            _record: PhantomData,
        };
        index.ensure_exists()?;
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_exists(&self) -> IndexResult<()> {
        let _guard = self.storage.lock(R::RESOURCE)?;
        if !self.storage.file_exists(&self.path) {
            self.storage
                .write_json(&self.path, &IndexDocument::<R>::stamped(Vec::new()))?;
            debug!(index = R::RESOURCE, "empty index created");
        }
        Ok(())
    }

    /// Read the whole document. A missing file reads as empty.
    pub fn load(&self) -> IndexResult<IndexDocument<R>> {
        match self.storage.read_json::<Value>(&self.path) {
            Ok(value) => IndexDocument::from_value(&self.path, value),
            Err(StoreError::NotFound(_)) => Ok(IndexDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, doc: &IndexDocument<R>) -> IndexResult<()> {
        self.storage.write_json(&self.path, doc)?;
        Ok(())
    }

    /// Append `record` unless an entry with its key is already present.
    /// Returns whether the record was added.
    pub fn add(&self, record: R) -> IndexResult<bool> {
        let _guard = self.storage.lock(R::RESOURCE)?;
        let doc = self.load()?;
        if doc.entries.iter().any(|e| e.key() == record.key()) {
            return Ok(false);
        }
        debug!(index = R::RESOURCE, key = record.key(), "index entry added");
        let mut entries = doc.entries;
        entries.push(record);
        self.store(&IndexDocument::stamped(entries))?;
        Ok(true)
    }

    /// Replace the entry stored under `key`, or append `record` if there
    /// is none.
    pub fn update(&self, key: &str, record: R) -> IndexResult<()> {
        let _guard = self.storage.lock(R::RESOURCE)?;
        let mut entries = self.load()?.entries;
        match entries.iter_mut().find(|e| e.key() == key) {
            Some(slot) => *slot = record,
            None => entries.push(record),
        }
        self.store(&IndexDocument::stamped(entries))?;
        debug!(index = R::RESOURCE, key, "index entry updated");
        Ok(())
    }

    /// Drop the entry stored under `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> IndexResult<bool> {
        let _guard = self.storage.lock(R::RESOURCE)?;
        let mut entries = self.load()?.entries;
        let before = entries.len();
        entries.retain(|e| e.key() != key);
        if entries.len() == before {
            return Ok(false);
        }
        self.store(&IndexDocument::stamped(entries))?;
        debug!(index = R::RESOURCE, key, "index entry removed");
        Ok(true)
    }

    pub fn get(&self, key: &str) -> IndexResult<Option<R>> {
        Ok(self.load()?.entries.into_iter().find(|e| e.key() == key))
    }

    pub fn all(&self, include_deleted: bool) -> IndexResult<Vec<R>> {
        let mut entries = self.load()?.entries;
        if !include_deleted {
            entries.retain(|e| !e.is_deleted());
        }
        Ok(entries)
    }

    pub fn last_updated(&self) -> IndexResult<Option<DateTime<Utc>>> {
        Ok(self.load()?.last_updated)
    }

    /// Replace the document with `records`, written in key order.
    pub fn rebuild(&self, mut records: Vec<R>) -> IndexResult<usize> {
        records.sort_by(|a, b| a.key().cmp(b.key()));
        records.dedup_by(|a, b| a.key() == b.key());
        let count = records.len();
        let _guard = self.storage.lock(R::RESOURCE)?;
        self.store(&IndexDocument::stamped(records))?;
        info!(index = R::RESOURCE, entries = count, "index rebuilt");
        Ok(count)
    }
}
