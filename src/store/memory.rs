use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::MetadataStore;
use crate::record::BuildRecord;
use crate::Result;

/// In-process store with the same contract as the Redis store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, Vec<u8>>,
    queue: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, id: &str, record: &BuildRecord) {
        let raw = record.to_bytes().unwrap_or_default();
        self.put_raw(id, raw);
    }

    pub fn put_raw(&self, id: &str, raw: Vec<u8>) {
        self.lock().records.insert(id.to_string(), raw);
    }

    pub fn push_queue(&self, id: &str) {
        self.lock().queue.push(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for MemoryStore {
    fn list_build_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self.lock().records.keys().cloned().collect())
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().records.get(id).cloned())
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        Ok(self.lock().records.remove(id).is_some())
    }

    fn delete_records(&self, ids: &[String]) -> Result<usize> {
        let mut inner = self.lock();
        Ok(ids
            .iter()
            .filter(|id| inner.records.remove(id.as_str()).is_some())
            .count())
    }

    fn queue_length(&self) -> Result<usize> {
        Ok(self.lock().queue.len())
    }

    fn clear_queue(&self) -> Result<bool> {
        let mut inner = self.lock();
        let existed = !inner.queue.is_empty();
        inner.queue.clear();
        Ok(existed)
    }

    fn delete_all_records(&self) -> Result<usize> {
        let mut inner = self.lock();
        let removed = inner.records.len();
        inner.records.clear();
        Ok(removed)
    }
}
