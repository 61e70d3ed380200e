//! # Domain Model: Locations, Encoding State and Status
//!
//! This module defines the small value types shared by every layer of the buffer
//! core: [`FileLocation`], [`EncodingState`], [`BufferStatus`], [`BufferState`] and
//! [`ContentDescription`].
//!
//! ## Encoding State Invariants
//!
//! - An explicit override, when set, always names the charset used for decoding
//!   and encoding. Sniffed or default charsets never replace it.
//! - `has_byte_order_mark` is only ever set while fetching content. A commit never
//!   invents a BOM that was not on disk when the buffer was (re)loaded.
//!
//! ## Status vs State
//!
//! [`BufferStatus`] answers "did the last load/revert work?" and carries a message
//! for the user. [`BufferState`] answers "where in its lifecycle is the buffer?".
//! A buffer can be [`BufferState::Clean`] with an error status: the file failed to
//! load and the buffer degraded to an empty document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque identifier of a storage location. Immutable once bound to a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLocation(PathBuf);

impl FileLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Final path component, handed to content sniffers as the display name.
    pub fn name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.0
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&Path> for FileLocation {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for FileLocation {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

/// Last observed modification time of the backing store; `None` if it does not exist.
pub type SyncStamp = Option<DateTime<Utc>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EncodingState {
    pub resolved_charset: String,
    pub explicit_override: Option<String>,
    pub has_byte_order_mark: bool,
}

impl EncodingState {
    /// The charset to decode/encode with: the override if present, else the resolved one.
    pub fn charset(&self) -> &str {
        self.explicit_override
            .as_deref()
            .unwrap_or(&self.resolved_charset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BufferStatus {
    Ok,
    Error(String),
}

impl BufferStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, BufferStatus::Ok)
    }

    pub fn message(&self) -> &str {
        match self {
            BufferStatus::Ok => "OK",
            BufferStatus::Error(msg) => msg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BufferState {
    Disconnected,
    Loading,
    Clean,
    Dirty,
    Committing,
    Reverting,
}

/// Byte order marks the buffer knows how to strip and re-emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrderMark {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl ByteOrderMark {
    pub const UTF8_BYTES: [u8; 3] = [0xEF, 0xBB, 0xBF];
    pub const UTF16LE_BYTES: [u8; 2] = [0xFF, 0xFE];
    pub const UTF16BE_BYTES: [u8; 2] = [0xFE, 0xFF];

    pub fn bytes(self) -> &'static [u8] {
        match self {
            ByteOrderMark::Utf8 => &Self::UTF8_BYTES,
            ByteOrderMark::Utf16Le => &Self::UTF16LE_BYTES,
            ByteOrderMark::Utf16Be => &Self::UTF16BE_BYTES,
        }
    }

    /// Charset implied by the mark.
    pub fn charset(self) -> &'static str {
        match self {
            ByteOrderMark::Utf8 => "UTF-8",
            ByteOrderMark::Utf16Le => "UTF-16LE",
            ByteOrderMark::Utf16Be => "UTF-16BE",
        }
    }

    /// Detects a mark at the start of `prefix`. UTF-8 is checked first since its
    /// mark is the longest.
    pub fn detect(prefix: &[u8]) -> Option<Self> {
        if prefix.starts_with(&Self::UTF8_BYTES) {
            Some(ByteOrderMark::Utf8)
        } else if prefix.starts_with(&Self::UTF16LE_BYTES) {
            Some(ByteOrderMark::Utf16Le)
        } else if prefix.starts_with(&Self::UTF16BE_BYTES) {
            Some(ByteOrderMark::Utf16Be)
        } else {
            None
        }
    }
}

/// What a content sniffer could tell about a stream or text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ContentDescription {
    pub charset: Option<String>,
    pub byte_order_mark: Option<ByteOrderMark>,
    pub content_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_name_and_extension() {
        let loc = FileLocation::new("/tmp/project/Notes.XML");
        assert_eq!(loc.name(), "Notes.XML");
        assert_eq!(loc.extension().as_deref(), Some("xml"));
    }

    #[test]
    fn test_encoding_state_override_wins() {
        let state = EncodingState {
            resolved_charset: "ISO-8859-1".to_string(),
            explicit_override: Some("UTF-8".to_string()),
            has_byte_order_mark: false,
        };
        assert_eq!(state.charset(), "UTF-8");
    }

    #[test]
    fn test_bom_detection() {
        assert_eq!(
            ByteOrderMark::detect(&[0xEF, 0xBB, 0xBF, b'a']),
            Some(ByteOrderMark::Utf8)
        );
        assert_eq!(
            ByteOrderMark::detect(&[0xFF, 0xFE, b'a', 0]),
            Some(ByteOrderMark::Utf16Le)
        );
        assert_eq!(ByteOrderMark::detect(&[0xFE, 0xFF]), Some(ByteOrderMark::Utf16Be));
        assert_eq!(ByteOrderMark::detect(b"plain"), None);
        assert_eq!(ByteOrderMark::detect(&[0xEF, 0xBB]), None);
    }

    #[test]
    fn test_status_message() {
        assert_eq!(BufferStatus::Ok.message(), "OK");
        assert_eq!(BufferStatus::Error("boom".into()).message(), "boom");
        assert!(!BufferStatus::Error("boom".into()).is_ok());
    }
}
