use super::backend::{ContentBackend, FileInfo};
use crate::error::{BufferError, Result};
use crate::model::FileLocation;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;

/// Filesystem backend.
///
/// With atomic writes enabled (the default) content is written to a tmp file
/// next to the real target, synced, and renamed over it, so a crash mid-write
/// leaves either the old or the new content. Symlinks are followed to their
/// target and the target's permissions carry over to the new file. With atomic
/// writes disabled the target is truncated and overwritten in place.
pub struct FsBackend {
    atomic_writes: bool,
}

impl Default for FsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FsBackend {
    pub fn new() -> Self {
        Self {
            atomic_writes: true,
        }
    }

    pub fn with_atomic_writes(mut self, atomic: bool) -> Self {
        self.atomic_writes = atomic;
        self
    }

    pub fn atomic_writes(&self) -> bool {
        self.atomic_writes
    }

    /// The file a write to `path` lands in: the symlink target if `path` is one.
    fn real_target(path: &Path) -> Result<PathBuf> {
        match fs::canonicalize(path) {
            Ok(real) => Ok(real),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(path.to_path_buf()),
            Err(e) => Err(BufferError::Io(e)),
        }
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let target = Self::real_target(path)?;
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let prefix = format!(
            ".{}-",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );

        // Dropping the tmp file on an early return deletes it.
        let mut tmp = Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(parent)?;
        tmp.write_all(bytes)?;
        if let Ok(meta) = fs::metadata(&target) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| BufferError::Io(e.error))?;
        Ok(())
    }

    fn write_in_place(target: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = fs::File::create(target)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }
}

impl ContentBackend for FsBackend {
    fn open_read(&self, location: &FileLocation) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(location.path()).map_err(BufferError::Io)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn write_bytes(&self, location: &FileLocation, bytes: &[u8]) -> Result<()> {
        if self.atomic_writes {
            Self::write_atomic(location.path(), bytes)
        } else {
            Self::write_in_place(location.path(), bytes)
        }
    }

    fn stat(&self, location: &FileLocation) -> Result<FileInfo> {
        match fs::metadata(location.path()) {
            Ok(meta) => {
                let modified: Option<DateTime<Utc>> = meta.modified().ok().map(Into::into);
                Ok(FileInfo {
                    exists: true,
                    modified,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileInfo::missing()),
            Err(e) => Err(BufferError::Io(e)),
        }
    }

    fn create_parent(&self, location: &FileLocation) -> Result<()> {
        if let Some(parent) = location.path().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(BufferError::Io)?;
            }
        }
        Ok(())
    }
}
