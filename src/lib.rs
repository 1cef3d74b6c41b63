//! Retires stale build records from the metadata store and removes artifact
//! directories that no longer belong to any record.
//!
//! Records must be stored as JSON documents; anything else is skipped as
//! corrupt and never deleted by the age or status rules.

pub mod artifacts;
pub mod config;
pub mod driver;
pub mod error;
pub mod log;
pub mod policy;
pub mod record;
pub mod simulate;
pub mod store;

pub use artifacts::{ArtifactScanner, ArtifactStore};
pub use driver::{Confirm, Driver, PassOptions, PassReport};
pub use error::{Error, Result};
pub use record::{BuildRecord, BuildState};
pub use store::{MemoryStore, MetadataStore, RedisStore};
