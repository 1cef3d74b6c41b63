//! Artifact directories on disk, one per build identifier.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::{rlog_debug, rlog_warn, Error, Result};

/// Outcome of removing one artifact directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// Someone else removed it first.
    AlreadyGone,
}

/// The filesystem side of a cleanup pass.
pub trait ArtifactStore {
    fn root(&self) -> &Path;

    fn root_exists(&self) -> bool;

    /// Names of the top-level directories under the root. A missing root
    /// yields an empty set.
    fn list_build_directories(&self) -> Result<BTreeSet<String>>;

    fn remove_directory(&self, id: &str) -> Result<Removal>;
}

impl<A: ArtifactStore + ?Sized> ArtifactStore for &A {
    fn root(&self) -> &Path {
        (**self).root()
    }

    fn root_exists(&self) -> bool {
        (**self).root_exists()
    }

    fn list_build_directories(&self) -> Result<BTreeSet<String>> {
        (**self).list_build_directories()
    }

    fn remove_directory(&self, id: &str) -> Result<Removal> {
        (**self).remove_directory(id)
    }
}

/// Scans a real artifacts root.
#[derive(Debug, Clone)]
pub struct ArtifactScanner {
    root: PathBuf,
}

impl ArtifactScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the directory for `id`, refusing anything that would not
    /// stay directly under the root.
    pub fn build_dir(&self, id: &str) -> Result<PathBuf> {
        validate_build_id(id)?;
        Ok(self.root.join(id))
    }
}

impl ArtifactStore for ArtifactScanner {
    fn root(&self) -> &Path {
        &self.root
    }

    fn root_exists(&self) -> bool {
        self.root.is_dir()
    }

    fn list_build_directories(&self) -> Result<BTreeSet<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                rlog_warn!("Artifacts directory {} does not exist", self.root.display());
                return Ok(BTreeSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut ids = BTreeSet::new();
        for entry in entries.flatten() {
            // Symlinks are not followed; a link is not a build directory.
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => {
                    ids.insert(name);
                }
                Err(name) => {
                    rlog_warn!("Ignoring non UTF-8 artifact directory {:?}", name);
                }
            }
        }
        rlog_debug!(
            "ArtifactScanner::list root={} dirs={}",
            self.root.display(),
            ids.len()
        );
        Ok(ids)
    }

    fn remove_directory(&self, id: &str) -> Result<Removal> {
        let path = self.build_dir(id)?;
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                rlog_debug!("Artifact directory {} already removed", path.display());
                Ok(Removal::AlreadyGone)
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub fn validate_build_id(id: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidBuildId {
        id: id.to_string(),
        reason,
    };
    if id.is_empty() {
        return Err(invalid("empty"));
    }
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == id => Ok(()),
        _ => Err(invalid("not a single path component")),
    }
}
