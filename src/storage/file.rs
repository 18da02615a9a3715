//! File-backed key/value store for host builds.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{KeyValueStore, validate_name};
use crate::core::StorageError;

/// [`KeyValueStore`] keeping each entry in `<root>/<namespace>/<key>`.
///
/// Writes go to a temporary sibling and are renamed into place, so a crash
/// mid-write leaves either the old blob or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_name(namespace)?;
        validate_name(key)?;
        Ok(self.root.join(namespace).join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.entry_path(namespace, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.entry_path(namespace, key)?;
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir)?;

        let tmp = dir.join(format!(".{key}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
