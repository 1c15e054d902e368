// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem for tests.
///
/// Clones share the same underlying storage, so a fake compiler and the
/// artifact cache can observe each other's writes.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    removals: Arc<Mutex<Vec<PathBuf>>>,
    removal_failure: Arc<Mutex<Option<String>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Every path passed to `remove_file` that actually existed, in order.
    pub fn removed(&self) -> Vec<PathBuf> {
        self.removals.lock().unwrap().clone()
    }

    /// Make every later `remove_file` fail with `reason`.
    pub fn fail_removals(&self, reason: impl Into<String>) {
        *self.removal_failure.lock().unwrap() = Some(reason.into());
    }

    /// Current contents of `path`, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files.get(path.as_ref()).cloned()
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(content) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.contains_key(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        if let Some(reason) = self.removal_failure.lock().unwrap().as_ref() {
            return Err(anyhow!("removing file {:?}: {}", path, reason));
        }

        let mut files = self.files.lock().unwrap();
        if files.remove(path).is_some() {
            self.removals.lock().unwrap().push(path.to_path_buf());
        }
        Ok(())
    }
}
