//! # Storage Layer
//!
//! This module defines the byte-level storage abstraction for textbuf. Nothing in
//! here knows about charsets: the store moves bytes and reports modification times.
//!
//! ## Two Layers
//!
//! 1. [`backend::ContentBackend`]: raw I/O primitives (open for read, write with
//!    truncate, stat, create parent directories).
//! 2. [`ContentStore`]: the operations buffers actually call, `fetch` and `store`,
//!    built on the primitives. It owns the synchronization-stamp discipline.
//!
//! ## Synchronization Stamps
//!
//! Every successful `fetch` or `store` is followed by a fresh `stat`, and the
//! resulting modification time is returned to the caller. Buffers keep that stamp
//! and pass it back on the next `store`:
//!
//! - Target exists, `overwrite == false`, stamp differs → [`BufferError::OutOfSync`],
//!   **nothing is written**.
//! - Target exists, `overwrite == true` → written regardless of the stamp.
//! - Target missing → parent directories are created, then the file is written.
//!
//! ## Stream Lifetime
//!
//! Streams are returned as owned `Box<dyn Read>` values. Dropping the box closes
//! the underlying handle, so every exit path (success, `?` propagation, early
//! return) releases it.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: production backend on the local filesystem.
//! - [`mem_backend::MemBackend`]: for testing logic without filesystem I/O.

use crate::error::{BufferError, Result};
use crate::model::{FileLocation, SyncStamp};
use backend::{ContentBackend, FileInfo};
use std::io::Read;
use tracing::debug;

pub mod backend;
pub mod fs_backend;
pub mod mem_backend;

/// Bytes read from a location, plus the stamp observed right after reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub stamp: SyncStamp,
}

pub struct ContentStore<B: ContentBackend> {
    backend: B,
}

impl<B: ContentBackend> ContentStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open a fresh stream, for sniffers that only need a prefix.
    pub fn open(&self, location: &FileLocation) -> Result<Box<dyn Read + Send>> {
        self.backend.open_read(location)
    }

    pub fn stat(&self, location: &FileLocation) -> Result<FileInfo> {
        self.backend.stat(location)
    }

    /// Read the whole content at `location`.
    pub fn fetch(&self, location: &FileLocation) -> Result<Fetched> {
        let mut bytes = Vec::new();
        {
            let mut stream = self.backend.open_read(location)?;
            stream.read_to_end(&mut bytes).map_err(BufferError::Io)?;
        }
        let stamp = self.backend.stat(location)?.modified;
        debug!(path = %location, len = bytes.len(), "Fetched content");
        Ok(Fetched { bytes, stamp })
    }

    /// Write `bytes` to `location` and return the new stamp.
    ///
    /// `known_stamp` is the stamp the caller last observed; it is only checked
    /// when the target exists and `overwrite` is false.
    pub fn store(
        &self,
        location: &FileLocation,
        bytes: &[u8],
        overwrite: bool,
        known_stamp: SyncStamp,
    ) -> Result<SyncStamp> {
        let info = self.backend.stat(location)?;
        if info.exists {
            if !overwrite && info.modified != known_stamp {
                debug!(path = %location, "Refusing to write out-of-sync content");
                return Err(BufferError::OutOfSync(location.path().to_path_buf()));
            }
        } else {
            self.backend.create_parent(location)?;
        }

        self.backend.write_bytes(location, bytes)?;
        let stamp = self.backend.stat(location)?.modified;
        debug!(path = %location, len = bytes.len(), "Stored content");
        Ok(stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem_backend::MemBackend;
    use chrono::{Duration, Utc};

    fn make_store() -> ContentStore<MemBackend> {
        ContentStore::with_backend(MemBackend::new())
    }

    #[test]
    fn test_fetch_returns_bytes_and_stamp() {
        let store = make_store();
        let loc = FileLocation::new("/docs/a.txt");
        store.backend().insert(&loc, b"hello".to_vec());

        let fetched = store.fetch(&loc).unwrap();
        assert_eq!(fetched.bytes, b"hello");
        assert_eq!(fetched.stamp, store.stat(&loc).unwrap().modified);
        assert!(fetched.stamp.is_some());
    }

    #[test]
    fn test_fetch_missing_is_io_error() {
        let store = make_store();
        let err = store.fetch(&FileLocation::new("/nope.txt")).unwrap_err();
        assert!(matches!(err, BufferError::Io(_)));
    }

    #[test]
    fn test_store_with_matching_stamp_writes() {
        let store = make_store();
        let loc = FileLocation::new("/docs/a.txt");
        store.backend().insert(&loc, b"old".to_vec());
        let stamp = store.fetch(&loc).unwrap().stamp;

        let new_stamp = store.store(&loc, b"new", false, stamp).unwrap();

        assert_eq!(store.backend().contents(&loc).unwrap(), b"new");
        assert_ne!(new_stamp, stamp);
        assert_eq!(new_stamp, store.stat(&loc).unwrap().modified);
    }

    #[test]
    fn test_store_with_stale_stamp_writes_nothing() {
        let store = make_store();
        let loc = FileLocation::new("/docs/a.txt");
        store.backend().insert(&loc, b"old".to_vec());
        let stamp = store.fetch(&loc).unwrap().stamp;

        // Someone else touches the file
        store
            .backend()
            .set_content_mtime(&loc, Utc::now() + Duration::hours(1));

        let err = store.store(&loc, b"new", false, stamp).unwrap_err();
        assert!(matches!(err, BufferError::OutOfSync(_)));
        assert_eq!(store.backend().contents(&loc).unwrap(), b"old");
        assert_eq!(store.backend().write_count(), 0);
    }

    #[test]
    fn test_store_overwrite_ignores_stamp() {
        let store = make_store();
        let loc = FileLocation::new("/docs/a.txt");
        store.backend().insert(&loc, b"old".to_vec());

        store.store(&loc, b"forced", true, None).unwrap();
        assert_eq!(store.backend().contents(&loc).unwrap(), b"forced");
    }

    #[test]
    fn test_store_new_file_creates_parent() {
        let store = make_store();
        let loc = FileLocation::new("/deep/nested/dir/new.txt");

        let stamp = store.store(&loc, b"fresh", false, None).unwrap();

        assert!(stamp.is_some());
        assert!(store.backend().has_dir("/deep/nested/dir"));
        assert!(store.backend().has_dir("/deep"));
        assert_eq!(store.backend().contents(&loc).unwrap(), b"fresh");
    }

    #[test]
    fn test_store_propagates_write_error() {
        let store = make_store();
        let loc = FileLocation::new("/a.txt");
        store.backend().set_simulate_write_error(true);

        let err = store.store(&loc, b"x", false, None).unwrap_err();
        assert!(matches!(err, BufferError::Io(_)));
        assert!(store.backend().contents(&loc).is_none());
    }

    #[test]
    fn test_consecutive_writes_get_distinct_stamps() {
        let store = make_store();
        let loc = FileLocation::new("/a.txt");
        let first = store.store(&loc, b"1", true, None).unwrap();
        let second = store.store(&loc, b"2", true, None).unwrap();
        assert!(second > first);
    }
}
