//! Named text blobs: the checkpoint and the exported contact files.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Lookup, create-or-overwrite and delete for named text blobs.
pub trait BlobStore {
    fn read(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Create the blob, or replace its content if it already exists.
    fn write(&self, name: &str, content: &str) -> Result<(), StoreError>;

    /// Returns whether a blob was removed.
    fn delete(&self, name: &str) -> Result<bool, StoreError>;
}

/// Blobs stored as files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl BlobStore for DirectoryBlobStore {
    fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;

        // Stage beside the target, then rename over it
        let target = self.path_for(name);
        let staging = self.root.join(format!(".{}.tmp", name));
        std::fs::write(&staging, content)?;
        std::fs::rename(&staging, &target)?;

        tracing::debug!("Wrote {} ({} bytes)", target.display(), content.len());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local blobs, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RefCell<BTreeMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.blobs.borrow().keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.blobs.borrow().get(name).cloned())
    }

    fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        self.blobs
            .borrow_mut()
            .insert(name.to_string(), content.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.borrow_mut().remove(name).is_some())
    }
}
