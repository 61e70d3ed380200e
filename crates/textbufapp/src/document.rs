//! # Document Model
//!
//! A [`Document`] is the in-memory text of a buffer. It is a cheap, cloneable
//! handle: every clone sees the same text and the same listeners, which is how
//! the buffer, its annotation model and editor views share one document.
//!
//! ## Change Notification
//!
//! Every mutation is delivered to listeners as a pair of callbacks,
//! `document_about_to_be_changed` and then `document_changed`, carrying one
//! [`DocumentEvent`]. A [`Document::set`] is a single event covering the whole
//! old text; listeners never observe it as a diff.
//!
//! Delivery is ordered (registration order) and synchronous, over a snapshot of
//! the listener list taken when the mutation starts. No lock is held while a
//! callback runs, so a listener may remove itself or others from inside a
//! callback. Removal takes effect for the next mutation.
//!
//! Handles may be edited from several threads. The range of a `replace` is
//! checked again under the write lock, so one made stale by a concurrent edit
//! (or by a listener editing from `document_about_to_be_changed`) fails with
//! `BadLocation` instead of panicking. `set` always replaces whatever text is
//! current; its event's `length` is the length seen when the change started.
//!
//! Offsets and lengths are byte positions into the UTF-8 text and must fall on
//! character boundaries.

use crate::error::{BufferError, Result};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A replacement of `length` bytes at `offset` by `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEvent {
    pub offset: usize,
    pub length: usize,
    pub text: String,
}

pub trait DocumentListener: Send + Sync {
    fn document_about_to_be_changed(&self, _document: &Document, _event: &DocumentEvent) {}

    fn document_changed(&self, document: &Document, event: &DocumentEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerList = Vec<(ListenerId, Arc<dyn DocumentListener>)>;

struct DocumentInner {
    text: RwLock<String>,
    listeners: Mutex<ListenerList>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_text("")
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                text: RwLock::new(text.into()),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// A copy of the current text.
    pub fn get(&self) -> String {
        self.inner.text.read().clone()
    }

    /// Borrow the text without copying it.
    pub fn with_text_ref<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(&self.inner.text.read())
    }

    pub fn len(&self) -> usize {
        self.inner.text.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole content as one change.
    pub fn set(&self, text: impl Into<String>) {
        let event = DocumentEvent {
            offset: 0,
            length: self.len(),
            text: text.into(),
        };
        let snapshot = self.notify_about(&event);
        *self.inner.text.write() = event.text.clone();
        self.notify_changed(&snapshot, &event);
    }

    /// Replace `length` bytes at `offset` with `text`.
    pub fn replace(&self, offset: usize, length: usize, text: &str) -> Result<()> {
        check_range(&self.inner.text.read(), offset, length)?;
        let event = DocumentEvent {
            offset,
            length,
            text: text.to_string(),
        };
        let snapshot = self.notify_about(&event);
        {
            let mut current = self.inner.text.write();
            check_range(&current, offset, length)?;
            current.replace_range(offset..offset + length, &event.text);
        }
        self.notify_changed(&snapshot, &event);
        Ok(())
    }

    pub fn insert(&self, offset: usize, text: &str) -> Result<()> {
        self.replace(offset, 0, text)
    }

    pub fn add_listener(&self, listener: Arc<dyn DocumentListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, listener));
        id
    }

    /// Returns true if the listener was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// True if both handles refer to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify_about(&self, event: &DocumentEvent) -> ListenerList {
        let snapshot: ListenerList = self.inner.listeners.lock().clone();
        for (_, listener) in &snapshot {
            listener.document_about_to_be_changed(self, event);
        }
        snapshot
    }

    fn notify_changed(&self, snapshot: &ListenerList, event: &DocumentEvent) {
        for (_, listener) in snapshot {
            listener.document_changed(self, event);
        }
    }
}

fn check_range(text: &str, offset: usize, length: usize) -> Result<()> {
    let end = offset.saturating_add(length);
    if end > text.len() || !text.is_char_boundary(offset) || !text.is_char_boundary(end) {
        return Err(BufferError::BadLocation {
            offset,
            end,
            len: text.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(&'static str, DocumentEvent, String)>>,
    }

    impl DocumentListener for Recorder {
        fn document_about_to_be_changed(&self, document: &Document, event: &DocumentEvent) {
            self.events
                .lock()
                .push(("about", event.clone(), document.get()));
        }

        fn document_changed(&self, document: &Document, event: &DocumentEvent) {
            self.events
                .lock()
                .push(("changed", event.clone(), document.get()));
        }
    }

    /// Removes itself on the first change.
    struct OneShot {
        id: Mutex<Option<ListenerId>>,
        calls: AtomicU64,
    }

    impl DocumentListener for OneShot {
        fn document_changed(&self, document: &Document, _: &DocumentEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = self.id.lock().take() {
                document.remove_listener(id);
            }
        }
    }

    #[test]
    fn test_set_is_one_event() {
        let doc = Document::with_text("hello");
        let rec = Arc::new(Recorder::default());
        doc.add_listener(rec.clone());

        doc.set("world!");

        let events = rec.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "about");
        assert_eq!(events[0].2, "hello");
        assert_eq!(events[1].0, "changed");
        assert_eq!(events[1].2, "world!");
        assert_eq!(
            events[1].1,
            DocumentEvent {
                offset: 0,
                length: 5,
                text: "world!".into()
            }
        );
    }

    #[test]
    fn test_replace_and_insert() {
        let doc = Document::with_text("hello world");
        doc.replace(6, 5, "there").unwrap();
        assert_eq!(doc.get(), "hello there");
        doc.insert(0, ">> ").unwrap();
        assert_eq!(doc.get(), ">> hello there");
    }

    #[test]
    fn test_replace_rejects_bad_ranges() {
        let doc = Document::with_text("café");
        assert!(matches!(
            doc.replace(2, 10, "x"),
            Err(BufferError::BadLocation { .. })
        ));
        // 'é' is two bytes starting at offset 3
        assert!(matches!(
            doc.replace(4, 0, "x"),
            Err(BufferError::BadLocation { .. })
        ));
        assert_eq!(doc.get(), "café");
    }

    #[test]
    fn test_listener_can_remove_itself_during_delivery() {
        let doc = Document::new();
        let one_shot = Arc::new(OneShot {
            id: Mutex::new(None),
            calls: AtomicU64::new(0),
        });
        let id = doc.add_listener(one_shot.clone());
        *one_shot.id.lock() = Some(id);
        let rec = Arc::new(Recorder::default());
        doc.add_listener(rec.clone());

        doc.set("a");
        doc.set("b");

        assert_eq!(one_shot.calls.load(Ordering::SeqCst), 1);
        // The second listener still saw both changes
        assert_eq!(rec.events.lock().len(), 4);
        assert_eq!(doc.listener_count(), 1);
    }

    #[test]
    fn test_clones_share_text_and_listeners() {
        let doc = Document::with_text("x");
        let view = doc.clone();
        let rec = Arc::new(Recorder::default());
        view.add_listener(rec.clone());

        doc.set("y");

        assert_eq!(view.get(), "y");
        assert!(doc.ptr_eq(&view));
        assert!(!doc.ptr_eq(&Document::new()));
        assert_eq!(rec.events.lock().len(), 2);
    }

    #[test]
    fn test_remove_unknown_listener() {
        let doc = Document::new();
        let id = doc.add_listener(Arc::new(Recorder::default()));
        assert!(doc.remove_listener(id));
        assert!(!doc.remove_listener(id));
    }

    /// Empties the document the first time it is told about a change.
    #[derive(Default)]
    struct Truncator {
        fired: std::sync::atomic::AtomicBool,
    }

    impl DocumentListener for Truncator {
        fn document_about_to_be_changed(&self, document: &Document, _: &DocumentEvent) {
            if !self.fired.swap(true, Ordering::SeqCst) {
                document.set("");
            }
        }

        fn document_changed(&self, _: &Document, _: &DocumentEvent) {}
    }

    #[test]
    fn test_range_made_stale_during_delivery_is_rejected() {
        let doc = Document::with_text("hello world");
        doc.add_listener(Arc::new(Truncator::default()));

        let err = doc.replace(6, 5, "there").unwrap_err();
        assert!(matches!(err, BufferError::BadLocation { len: 0, .. }));
        assert_eq!(doc.get(), "");
    }

    #[test]
    fn test_concurrent_edits_never_panic() {
        let doc = Document::with_text("abcdef");
        std::thread::scope(|s| {
            let setter = doc.clone();
            s.spawn(move || {
                for i in 0..2000 {
                    setter.set(if i % 2 == 0 { "" } else { "abcdef" });
                }
            });
            let editor = doc.clone();
            s.spawn(move || {
                for _ in 0..2000 {
                    let _ = editor.replace(4, 2, "xy");
                }
            });
        });
        assert!(doc.len() <= "abcdef".len());
    }
}
