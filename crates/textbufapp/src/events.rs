//! # Buffer Events
//!
//! Buffers report lifecycle transitions to a [`ListenerRegistry`] they do not
//! own. The registry lives in the [`BufferManager`](crate::manager::BufferManager)
//! and is shared by every buffer it creates.
//!
//! | Event | Fired when |
//! |-------|------------|
//! | `BufferCreated` | The manager connected a new buffer and finished its initial load |
//! | `DirtyStateChanged` | The dirty flag flipped (at most once per clean period on edits) |
//! | `StateChanging` | A revert or commit is about to change the buffer |
//! | `StateChangeFailed` | That revert or commit failed |
//! | `ContentAboutToBeReplaced` | A revert is about to replace the document text |
//! | `ContentReplaced` | A revert replaced the document text |
//! | `BufferDisposed` | The manager dropped the last connection to the buffer |
//!
//! Delivery is synchronous, in registration order, over a snapshot of the
//! listener list. See the buffer module for which events can arrive while the
//! buffer's lock is held.

use crate::model::FileLocation;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferEvent {
    BufferCreated,
    BufferDisposed,
    DirtyStateChanged { dirty: bool },
    StateChanging,
    StateChangeFailed,
    ContentAboutToBeReplaced,
    ContentReplaced,
}

pub trait BufferListener: Send + Sync {
    fn buffer_event(&self, location: &FileLocation, event: BufferEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

type Registrations = Vec<(RegistrationId, Arc<dyn BufferListener>)>;

/// Shared, cloneable listener registry.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<Mutex<Registrations>>,
    next_id: Arc<AtomicU64>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn BufferListener>) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn remove(&self, id: RegistrationId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(rid, _)| *rid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fire(&self, location: &FileLocation, event: BufferEvent) {
        let snapshot: Registrations = self.listeners.lock().clone();
        for (_, listener) in &snapshot {
            listener.buffer_event(location, event);
        }
    }
}
