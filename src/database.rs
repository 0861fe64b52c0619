/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines the byte-level key-value store the VM persists into, and a versioned
//! overlay on top of it.
//!
//! A [VersionedStore] records writes in an in-memory journal:
//! - In a read, the journal is consulted first. If the key is not there, the
//!   base store is consulted.
//! - In a write, only the journal is touched.
//!
//! At acceptance of the owning block, [commit](VersionedStore::commit) applies
//! the journal to the base store; on rejection, [abandon](VersionedStore::abandon)
//! discards it without any change to the base. Overlays stack: the base of one
//! overlay may itself be an overlay, in which case a commit lands in the parent's
//! journal and nothing reaches the bottom store until the outermost overlay
//! commits.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::DbError;

/// A byte-level key-value store. Writes take `&self`: implementations carry
/// their own interior locking so the store can be shared behind an `Arc`.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError>;
    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), DbError>;
    fn delete(&self, key: &[u8]) -> Result<(), DbError>;
}

/// An in-memory [Database].
#[derive(Default)]
pub struct MemDb {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Database for MemDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), DbError> {
        self.entries.write().insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), DbError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// A journaled overlay over a base store. `None` in the journal marks a deletion.
pub struct VersionedStore {
    base: Arc<dyn Database>,
    journal: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl VersionedStore {
    pub fn new(base: Arc<dyn Database>) -> Self {
        Self {
            base,
            journal: RwLock::new(BTreeMap::new()),
        }
    }

    /// Applies the journal to the base store and clears it. The caller holds
    /// exclusive access to the VM during acceptance, so the application is
    /// observed atomically.
    pub fn commit(&self) -> Result<(), DbError> {
        let journal = std::mem::take(&mut *self.journal.write());
        for (key, value) in journal {
            match value {
                Some(v) => self.base.put(&key, v)?,
                None => self.base.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Discards the journal. The base store is untouched.
    pub fn abandon(&self) {
        self.journal.write().clear();
    }
}

impl Database for VersionedStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError> {
        if let Some(entry) = self.journal.read().get(key) {
            return Ok(entry.clone());
        }
        self.base.get(key)
    }

    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), DbError> {
        self.journal.write().insert(key.to_vec(), Some(value));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), DbError> {
        self.journal.write().insert(key.to_vec(), None);
        Ok(())
    }
}
