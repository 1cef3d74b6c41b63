//! Non-mutating views over the store and artifact tree for dry runs.
//!
//! Deletes are recorded as tombstones and hidden from later reads, so the
//! policies of a dry run see exactly what they would see in a real pass
//! while nothing is ever written.

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::BTreeSet;
use std::path::Path;

use crate::artifacts::{validate_build_id, ArtifactStore, Removal};
use crate::store::MetadataStore;
use crate::Result;

pub struct SimulatedStore<S> {
    inner: S,
    deleted: RefCell<BTreeSet<String>>,
    all_deleted: Cell<bool>,
    queue_cleared: Cell<bool>,
}

impl<S: MetadataStore> SimulatedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            deleted: RefCell::new(BTreeSet::new()),
            all_deleted: Cell::new(false),
            queue_cleared: Cell::new(false),
        }
    }

    fn is_hidden(&self, id: &str) -> bool {
        self.all_deleted.get() || self.deleted.borrow().contains(id)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(!self.is_hidden(id) && self.inner.get_raw(id)?.is_some())
    }
}

impl<S: MetadataStore> MetadataStore for SimulatedStore<S> {
    fn list_build_ids(&self) -> Result<BTreeSet<String>> {
        if self.all_deleted.get() {
            return Ok(BTreeSet::new());
        }
        let mut ids = self.inner.list_build_ids()?;
        ids.retain(|id| !self.is_hidden(id));
        Ok(ids)
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>> {
        if self.is_hidden(id) {
            return Ok(None);
        }
        self.inner.get_raw(id)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        let existed = self.exists(id)?;
        self.deleted.borrow_mut().insert(id.to_string());
        Ok(existed)
    }

    fn delete_records(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.delete_record(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn queue_length(&self) -> Result<usize> {
        if self.queue_cleared.get() {
            return Ok(0);
        }
        self.inner.queue_length()
    }

    fn clear_queue(&self) -> Result<bool> {
        let existed = self.queue_length()? > 0;
        self.queue_cleared.set(true);
        Ok(existed)
    }

    fn delete_all_records(&self) -> Result<usize> {
        let removed = self.list_build_ids()?.len();
        self.all_deleted.set(true);
        Ok(removed)
    }
}

pub struct SimulatedArtifacts<A> {
    inner: A,
    /// Nothing on disk changes during a dry run, so one listing serves
    /// the whole pass.
    listing: OnceCell<BTreeSet<String>>,
    removed: RefCell<BTreeSet<String>>,
}

impl<A: ArtifactStore> SimulatedArtifacts<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            listing: OnceCell::new(),
            removed: RefCell::new(BTreeSet::new()),
        }
    }

    fn listing(&self) -> Result<&BTreeSet<String>> {
        if let Some(ids) = self.listing.get() {
            return Ok(ids);
        }
        let ids = self.inner.list_build_directories()?;
        Ok(self.listing.get_or_init(|| ids))
    }
}

impl<A: ArtifactStore> ArtifactStore for SimulatedArtifacts<A> {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn root_exists(&self) -> bool {
        self.inner.root_exists()
    }

    fn list_build_directories(&self) -> Result<BTreeSet<String>> {
        let removed = self.removed.borrow();
        Ok(self
            .listing()?
            .iter()
            .filter(|id| !removed.contains(*id))
            .cloned()
            .collect())
    }

    fn remove_directory(&self, id: &str) -> Result<Removal> {
        validate_build_id(id)?;
        let present = self.listing()?.contains(id);
        let newly_removed = self.removed.borrow_mut().insert(id.to_string());
        Ok(if present && newly_removed {
            Removal::Removed
        } else {
            Removal::AlreadyGone
        })
    }
}
