use super::backend::{ContentBackend, FileInfo};
use crate::error::{BufferError, Result};
use crate::model::FileLocation;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Clone)]
struct ContentEntry {
    bytes: Vec<u8>,
    mtime: DateTime<Utc>,
}

/// In-memory storage backend for testing.
///
/// Uses `parking_lot::Mutex` rather than `RefCell` because buffers are shared
/// across threads when their annotation model is created lazily.
///
/// Modification times are strictly increasing so that two writes in the same
/// clock tick still produce different synchronization stamps.
pub struct MemBackend {
    content: Mutex<HashMap<PathBuf, ContentEntry>>,
    dirs: Mutex<HashSet<PathBuf>>,
    clock: Mutex<Option<DateTime<Utc>>>,
    simulate_write_error: AtomicBool,
    simulate_read_error: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MemBackend {
    fn default() -> Self {
        Self {
            content: Mutex::new(HashMap::new()),
            dirs: Mutex::new(HashSet::new()),
            clock: Mutex::new(None),
            simulate_write_error: AtomicBool::new(false),
            simulate_read_error: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Enable read error simulation for testing degraded loads.
    pub fn set_simulate_read_error(&self, simulate: bool) {
        self.simulate_read_error.store(simulate, Ordering::SeqCst);
    }

    /// Put bytes directly, as if another process wrote the file.
    /// Does not count towards [`MemBackend::write_count`].
    pub fn insert(&self, location: &FileLocation, bytes: impl Into<Vec<u8>>) {
        let mtime = self.tick();
        self.content.lock().insert(
            location.path().to_path_buf(),
            ContentEntry {
                bytes: bytes.into(),
                mtime,
            },
        );
    }

    pub fn remove(&self, location: &FileLocation) -> bool {
        self.content.lock().remove(location.path()).is_some()
    }

    pub fn contents(&self, location: &FileLocation) -> Option<Vec<u8>> {
        self.content
            .lock()
            .get(location.path())
            .map(|e| e.bytes.clone())
    }

    /// Test helper to set mtime directly for staleness testing.
    /// Returns true if the entry existed and was updated.
    pub fn set_content_mtime(&self, location: &FileLocation, mtime: DateTime<Utc>) -> bool {
        let mut content = self.content.lock();
        if let Some(entry) = content.get_mut(location.path()) {
            entry.mtime = mtime;
            true
        } else {
            false
        }
    }

    /// Number of successful `write_bytes` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn has_dir(&self, dir: impl Into<PathBuf>) -> bool {
        self.dirs.lock().contains(&dir.into())
    }

    fn tick(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock();
        let now = Utc::now();
        let next = match *clock {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        *clock = Some(next);
        next
    }
}

impl ContentBackend for MemBackend {
    fn open_read(&self, location: &FileLocation) -> Result<Box<dyn Read + Send>> {
        if self.simulate_read_error.load(Ordering::SeqCst) {
            return Err(BufferError::Io(std::io::Error::other("Simulated read error")));
        }
        let content = self.content.lock();
        match content.get(location.path()) {
            Some(entry) => Ok(Box::new(Cursor::new(entry.bytes.clone()))),
            None => Err(BufferError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", location),
            ))),
        }
    }

    fn write_bytes(&self, location: &FileLocation, bytes: &[u8]) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(BufferError::Io(std::io::Error::other("Simulated write error")));
        }
        let mtime = self.tick();
        self.content.lock().insert(
            location.path().to_path_buf(),
            ContentEntry {
                bytes: bytes.to_vec(),
                mtime,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stat(&self, location: &FileLocation) -> Result<FileInfo> {
        let content = self.content.lock();
        Ok(match content.get(location.path()) {
            Some(entry) => FileInfo {
                exists: true,
                modified: Some(entry.mtime),
            },
            None => FileInfo::missing(),
        })
    }

    fn create_parent(&self, location: &FileLocation) -> Result<()> {
        if let Some(parent) = location.path().parent() {
            let mut dirs = self.dirs.lock();
            for ancestor in parent.ancestors() {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }
}
