//! Persistence slots for the policy cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::error::Result;

/// A single named slot of serialized data.
pub trait CacheSlot: Send + Sync {
    /// Human-readable location, for logs
    fn name(&self) -> String;

    /// Current contents, `None` if nothing was ever written.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the contents.
    fn write(&self, contents: &str) -> Result<()>;
}

/// Slot backed by a JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers see either the old or the new contents.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CacheSlot for FileSlot {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let staging = self.staging_path();
        std::fs::write(&staging, contents)?;
        if let Err(e) = std::fs::rename(&staging, &self.path) {
            std::fs::remove_file(&staging).ok();
            return Err(e.into());
        }
        Ok(())
    }
}

/// In-memory slot. Counts writes so tests can assert write-backs.
#[derive(Debug, Default)]
pub struct MemorySlot {
    contents: Mutex<Option<String>>,
    writes: AtomicU32,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-filled with raw contents.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
            writes: AtomicU32::new(0),
        }
    }

    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw contents, as last written
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CacheSlot for MemorySlot {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn read(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<()> {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
