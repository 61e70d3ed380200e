use crate::error::Result;
use crate::model::{FileLocation, SyncStamp};
use std::io::Read;

/// Result of a `stat` against a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub exists: bool,
    pub modified: SyncStamp,
}

impl FileInfo {
    pub fn missing() -> Self {
        Self {
            exists: false,
            modified: None,
        }
    }
}

/// Abstract interface for raw byte I/O against a location.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while [`ContentStore`](super::ContentStore) handles the "what" (stamps, sync checks).
///
/// Implementations never interpret bytes: charsets and BOMs are the resolver's job.
pub trait ContentBackend: Send + Sync {
    /// Open a fresh read stream. The stream is closed when the returned box is dropped.
    fn open_read(&self, location: &FileLocation) -> Result<Box<dyn Read + Send>>;

    /// Replace the content at `location` with `bytes`, creating the file if needed.
    /// The parent directory must already exist.
    fn write_bytes(&self, location: &FileLocation, bytes: &[u8]) -> Result<()>;

    /// Existence and modification time. A missing file is not an error.
    fn stat(&self, location: &FileLocation) -> Result<FileInfo>;

    /// Create the missing parent directories of `location`.
    fn create_parent(&self, location: &FileLocation) -> Result<()>;
}
