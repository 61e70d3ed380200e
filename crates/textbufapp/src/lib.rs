//! # textbufapp
//!
//! Encoding-aware text file buffers: load a file's bytes into an editable
//! document, track whether the document diverged from the file, and write it
//! back without losing its charset or byte order mark and without clobbering
//! changes made by someone else.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Clients (crates/textbuf CLI, editors, tests)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Manager (manager.rs, init.rs, config.rs)                   │
//! │  - One buffer per location, connection counting             │
//! │  - Owns shared collaborators and the listener registry      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Buffer State Tracker (buffer.rs)                           │
//! │  - Load, revert, commit, disconnect                         │
//! │  - Dirty flag, synchronization stamp, status                │
//! └─────────────────────────────────────────────────────────────┘
//!          │                 │                 │
//!          ▼                 ▼                 ▼
//! ┌────────────────┐ ┌────────────────┐ ┌─────────────────────┐
//! │ encoding/      │ │ store/         │ │ document.rs         │
//! │ charset lookup,│ │ bytes + stamps │ │ text + listeners    │
//! │ sniffing, BOMs │ │ fs / memory    │ │ annotation.rs       │
//! └────────────────┘ └────────────────┘ └─────────────────────┘
//! ```
//!
//! Nothing below the manager knows about terminals, processes or config
//! files. Errors are [`error::BufferError`]; events go through
//! [`events::ListenerRegistry`]; logging uses `tracing` and is silent unless the
//! embedding application installs a subscriber.
//!
//! ## Example
//!
//! ```no_run
//! use textbufapp::manager::BufferManager;
//! use textbufapp::model::FileLocation;
//! use textbufapp::store::fs_backend::FsBackend;
//!
//! let manager = BufferManager::new(FsBackend::new());
//! let location = FileLocation::new("notes.txt");
//! let buffer = manager.connect(&location);
//! {
//!     let mut buffer = buffer.write();
//!     if let Some(document) = buffer.document() {
//!         document.set("hello");
//!     }
//!     buffer.commit(false)?;
//! }
//! manager.disconnect(&location)?;
//! # Ok::<(), textbufapp::error::BufferError>(())
//! ```

pub mod annotation;
pub mod buffer;
pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod events;
pub mod init;
pub mod manager;
pub mod model;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
