//! A store that stops answering aborts the pass; nothing is guessed.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::io;

use chrono::Duration;

use buildreap::{
    ArtifactScanner, BuildState, Driver, Error, MemoryStore, MetadataStore, PassOptions, Result,
};

use crate::fixtures::{never_asked, set, Fixture};

/// Wraps the in-memory store and fails on demand.
struct FlakyStore<'a> {
    inner: &'a MemoryStore,
    /// Successful listings allowed before every further one fails.
    listings_left: Cell<usize>,
    fail_deletes: bool,
}

impl<'a> FlakyStore<'a> {
    fn new(inner: &'a MemoryStore) -> Self {
        Self {
            inner,
            listings_left: Cell::new(usize::MAX),
            fail_deletes: false,
        }
    }
}

fn connection_lost() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    ))
}

impl MetadataStore for FlakyStore<'_> {
    fn list_build_ids(&self) -> Result<BTreeSet<String>> {
        match self.listings_left.get() {
            0 => Err(connection_lost()),
            n => {
                self.listings_left.set(n - 1);
                self.inner.list_build_ids()
            }
        }
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_raw(id)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        if self.fail_deletes {
            return Err(connection_lost());
        }
        self.inner.delete_record(id)
    }

    fn delete_records(&self, ids: &[String]) -> Result<usize> {
        if self.fail_deletes {
            return Err(connection_lost());
        }
        self.inner.delete_records(ids)
    }

    fn queue_length(&self) -> Result<usize> {
        self.inner.queue_length()
    }

    fn clear_queue(&self) -> Result<bool> {
        self.inner.clear_queue()
    }

    fn delete_all_records(&self) -> Result<usize> {
        if self.fail_deletes {
            return Err(connection_lost());
        }
        self.inner.delete_all_records()
    }
}

fn driver<'a>(
    fixture: &Fixture,
    store: FlakyStore<'a>,
) -> Driver<FlakyStore<'a>, ArtifactScanner> {
    Driver::new(store, ArtifactScanner::new(fixture.root())).at(fixture.now)
}

/// Given an old build and a live build, each with a directory
/// When the store fails while the orphan policy lists live ids
/// Then the pass errors, the age eviction stays done, and no directory is touched
#[test]
fn test_listing_failure_mid_pass_is_fatal() {
    let fixture = Fixture::new();
    fixture
        .record("old", Duration::hours(30), BuildState::Success)
        .record("live", Duration::minutes(10), BuildState::Success)
        .dir("old")
        .dir("live");

    let store = FlakyStore::new(&fixture.store);
    // The age policy lists once; the orphan policy's listing fails.
    store.listings_left.set(1);

    let result = driver(&fixture, store).run(&PassOptions::default(), &mut never_asked);

    assert!(matches!(result, Err(Error::Io(_))));
    assert_eq!(fixture.record_ids(), set(&["live"]));
    assert_eq!(fixture.dir_ids(), set(&["live", "old"]));
}

#[test]
fn test_delete_failure_is_fatal() {
    let fixture = Fixture::new();
    fixture
        .record("old", Duration::hours(30), BuildState::Success)
        .dir("ghost");

    let mut store = FlakyStore::new(&fixture.store);
    store.fail_deletes = true;

    let result = driver(&fixture, store).run(&PassOptions::default(), &mut never_asked);

    assert!(result.is_err());
    assert_eq!(fixture.record_ids(), set(&["old"]));
    // The pass stopped before the orphan policy ran.
    assert_eq!(fixture.dir_ids(), set(&["ghost"]));
}

#[test]
fn test_dry_run_listing_failure_is_fatal() {
    let fixture = Fixture::new();
    fixture
        .record("live", Duration::minutes(10), BuildState::Success)
        .dir("live");

    let store = FlakyStore::new(&fixture.store);
    store.listings_left.set(0);

    let options = PassOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = driver(&fixture, store).run(&options, &mut never_asked);

    assert!(result.is_err());
    assert_eq!(fixture.dir_ids(), set(&["live"]));
}
