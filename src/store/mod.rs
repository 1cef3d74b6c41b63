//! Access to the build metadata store.
//!
//! Records live under `buildmeta-<id>` keys and pending builds under the
//! `builds-queue` list. Implementations hold no state between calls; every
//! method is one synchronous round trip.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use std::collections::BTreeSet;

use crate::record::BuildRecord;
use crate::{rlog_warn, Result};

pub const RECORD_PREFIX: &str = "buildmeta-";
pub const RECORD_PATTERN: &str = "buildmeta-*";
pub const QUEUE_KEY: &str = "builds-queue";

pub fn record_key(id: &str) -> String {
    format!("{}{}", RECORD_PREFIX, id)
}

pub fn build_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(RECORD_PREFIX)
}

/// Result of fetching one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFetch {
    Found(BuildRecord),
    /// The key vanished between enumeration and fetch.
    Missing,
    /// The stored bytes did not decode. Reconciliation skips these.
    Corrupt(String),
}

pub trait MetadataStore {
    /// Identifiers of every stored build, prefix stripped.
    fn list_build_ids(&self) -> Result<BTreeSet<String>>;

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Returns whether the key existed.
    fn delete_record(&self, id: &str) -> Result<bool>;

    /// Deletes in one request and returns how many keys were actually
    /// removed. Absent keys are not an error.
    fn delete_records(&self, ids: &[String]) -> Result<usize>;

    fn queue_length(&self) -> Result<usize>;

    /// Returns whether the queue key existed.
    fn clear_queue(&self) -> Result<bool>;

    fn delete_all_records(&self) -> Result<usize>;

    fn get_record(&self, id: &str) -> Result<RecordFetch> {
        let Some(raw) = self.get_raw(id)? else {
            return Ok(RecordFetch::Missing);
        };
        match BuildRecord::from_bytes(&raw) {
            Ok(record) => Ok(RecordFetch::Found(record)),
            Err(e) => {
                rlog_warn!("Skipping corrupt record {}: {}", id, e);
                Ok(RecordFetch::Corrupt(e.to_string()))
            }
        }
    }
}

impl<S: MetadataStore + ?Sized> MetadataStore for &S {
    fn list_build_ids(&self) -> Result<BTreeSet<String>> {
        (**self).list_build_ids()
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>> {
        (**self).get_raw(id)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        (**self).delete_record(id)
    }

    fn delete_records(&self, ids: &[String]) -> Result<usize> {
        (**self).delete_records(ids)
    }

    fn queue_length(&self) -> Result<usize> {
        (**self).queue_length()
    }

    fn clear_queue(&self) -> Result<bool> {
        (**self).clear_queue()
    }

    fn delete_all_records(&self) -> Result<usize> {
        (**self).delete_all_records()
    }
}
