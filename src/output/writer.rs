//! Output handlers: where processed files go.
//!
//! Paths handed to a handler are relative to the deploy directory, e.g.
//! `post/2024-05-01-ride.html`.

use crate::log;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

/// Sink for generated files.
pub trait OutputHandler: Sync {
    /// Store `bytes` at `path`. Returns whether anything was written.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<bool>;
}

/// Writes into the deploy directory, skipping files whose bytes are unchanged.
#[derive(Debug, Clone)]
pub struct FsOutput {
    root: PathBuf,
}

impl FsOutput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl OutputHandler for FsOutput {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<bool> {
        let target = self.root.join(path);
        if let Ok(existing) = fs::read(&target)
            && existing == bytes
        {
            return Ok(false);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, bytes).with_context(|| format!("failed to write {}", target.display()))?;
        log!("build"; "generated {}", path.display());
        Ok(true)
    }
}

/// Discards everything. Used to collect stats without touching the deploy tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl OutputHandler for NullOutput {
    fn write(&self, _path: &Path, _bytes: &[u8]) -> Result<bool> {
        Ok(false)
    }
}

/// Forwards to another handler and remembers every path it was handed,
/// written or unchanged.
pub struct TrackedOutput<'a> {
    inner: &'a dyn OutputHandler,
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl<'a> TrackedOutput<'a> {
    pub fn new(inner: &'a dyn OutputHandler) -> Self {
        Self { inner, paths: Mutex::default() }
    }

    /// Paths seen since the last call.
    pub fn take_paths(&self) -> BTreeSet<PathBuf> {
        std::mem::take(&mut *self.paths.lock())
    }
}

impl OutputHandler for TrackedOutput<'_> {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<bool> {
        let written = self.inner.write(path, bytes)?;
        self.paths.lock().insert(path.to_path_buf());
        Ok(written)
    }
}

#[cfg(test)]
pub use memory::MemoryOutput;

#[cfg(test)]
mod memory {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory deploy tree with the same change detection as [`FsOutput`].
    #[derive(Debug, Default)]
    pub struct MemoryOutput {
        files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    }

    impl MemoryOutput {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, path: &str) -> Option<String> {
            self.files
                .lock()
                .get(Path::new(path))
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        }

        pub fn paths(&self) -> Vec<String> {
            self.files
                .lock()
                .keys()
                .map(|p| p.to_string_lossy().into_owned())
                .collect()
        }
    }

    impl OutputHandler for MemoryOutput {
        fn write(&self, path: &Path, bytes: &[u8]) -> Result<bool> {
            let mut files = self.files.lock();
            if files.get(path).is_some_and(|existing| existing == bytes) {
                return Ok(false);
            }
            files.insert(path.to_path_buf(), bytes.to_vec());
            Ok(true)
        }
    }
}
