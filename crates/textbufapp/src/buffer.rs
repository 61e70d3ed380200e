//! # Buffer State Tracker
//!
//! A [`TextFileBuffer`] binds one [`FileLocation`] to one [`Document`] and keeps
//! track of how the two relate: whether the text was edited since it was last
//! read or written (dirty flag), when the file was last seen (synchronization
//! stamp), and whether the last load worked (status).
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected → Loading → Clean ⇄ Dirty
//!                            │       │
//!                            │       ├─ commit ─→ Committing → Clean (or back to Dirty on failure)
//!                            └───────┴─ revert ─→ Reverting  → Clean
//!                                                      ... → disconnect → Disconnected
//! ```
//!
//! ## Dirty Detection
//!
//! While clean, a [`DirtyTracker`] is registered on the document. The first
//! change flips the flag, fires one `DirtyStateChanged { dirty: true }` and
//! unregisters the tracker. Further edits are silent. A commit, a revert or
//! `set_dirty(false)` re-arms it. Every clean period therefore produces at most
//! one "became dirty" notification.
//!
//! ## Failure Semantics
//!
//! - Load and revert failures never escape: they are recorded in
//!   [`BufferStatus`] and the buffer stays usable (an empty document on load).
//! - Commit failures are returned as [`BufferError`], fire
//!   `StateChangeFailed` and leave the buffer dirty. A stale stamp is never
//!   silently overwritten; the caller has to pass `overwrite = true`.
//! - Annotation hook failures are recorded in the status and do not abort
//!   the surrounding revert or commit.
//! - A panic during revert or commit re-arms the tracker and fires
//!   `StateChangeFailed` while unwinding.
//! - Bytes that are not valid in the resolved charset decode to U+FFFD and
//!   raise [`TextFileBuffer::has_malformed_input`]. Committing such text
//!   would replace the original bytes, so callers should check it first.
//!
//! ## Event Delivery
//!
//! Events are delivered synchronously on the thread that causes them. Called
//! directly on a locked [`SharedBuffer`](crate::manager::SharedBuffer), revert,
//! commit, `set_dirty` and document edits therefore reach listeners while that
//! lock is held, and a listener that locks the buffer again deadlocks. The
//! manager's `update`, `commit` and `revert` hold events back instead and
//! deliver them once the lock is released.

use crate::annotation::{AnnotationBinding, AnnotationModelFactory, AnnotationModelRef};
use crate::document::{Document, DocumentEvent, DocumentListener, ListenerId};
use crate::encoding::{decode_content, encode_content, Charset, EncodingResolver};
use crate::error::{BufferError, Result};
use crate::events::{BufferEvent, ListenerRegistry};
use crate::model::{BufferState, BufferStatus, EncodingState, FileLocation, SyncStamp};
use crate::store::backend::ContentBackend;
use crate::store::ContentStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Collaborators shared by every buffer of one manager.
pub struct BufferServices<B: ContentBackend> {
    pub store: ContentStore<B>,
    pub resolver: EncodingResolver,
    pub listeners: ListenerRegistry,
    pub annotation_factory: Option<Arc<dyn AnnotationModelFactory>>,
}

/// Owns the dirty flag and the one-shot document registration that sets it.
struct DirtyTracker {
    location: FileLocation,
    listeners: ListenerRegistry,
    dirty: AtomicBool,
    registration: Mutex<Option<ListenerId>>,
    held: Mutex<Option<Vec<BufferEvent>>>,
}

impl DirtyTracker {
    fn new(location: FileLocation, listeners: ListenerRegistry) -> Arc<Self> {
        Arc::new(Self {
            location,
            listeners,
            dirty: AtomicBool::new(false),
            registration: Mutex::new(None),
            held: Mutex::new(None),
        })
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn arm(self: &Arc<Self>, document: &Document) {
        let mut registration = self.registration.lock();
        if registration.is_none() {
            *registration = Some(document.add_listener(self.clone()));
        }
    }

    fn disarm(&self, document: &Document) {
        if let Some(id) = self.registration.lock().take() {
            document.remove_listener(id);
        }
    }

    /// Clear the flag and listen for the next edit. Returns whether it was dirty.
    fn reset(self: &Arc<Self>, document: &Document) -> bool {
        let was_dirty = self.dirty.swap(false, Ordering::SeqCst);
        self.arm(document);
        was_dirty
    }

    fn fire(&self, event: BufferEvent) {
        if let Some(queue) = self.held.lock().as_mut() {
            queue.push(event);
            return;
        }
        self.listeners.fire(&self.location, event);
    }

    fn hold(&self) {
        self.held.lock().get_or_insert_with(Vec::new);
    }

    fn release(&self) {
        let events = self.held.lock().take().unwrap_or_default();
        for event in events {
            self.listeners.fire(&self.location, event);
        }
    }
}

/// Queues a buffer's events until dropped, then delivers them.
///
/// Drop it after the buffer's lock so listeners run unlocked.
pub struct HeldEvents {
    tracker: Arc<DirtyTracker>,
}

impl Drop for HeldEvents {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

impl DocumentListener for DirtyTracker {
    fn document_changed(&self, document: &Document, _event: &DocumentEvent) {
        let Some(id) = self.registration.lock().take() else {
            return;
        };
        document.remove_listener(id);
        self.dirty.store(true, Ordering::SeqCst);
        debug!(path = %self.location, "Buffer became dirty");
        self.fire(BufferEvent::DirtyStateChanged { dirty: true });
    }
}

/// Restores dirty detection and reports failure if a transaction unwinds.
struct TransactionGuard {
    tracker: Arc<DirtyTracker>,
    document: Document,
    finished: bool,
}

impl TransactionGuard {
    fn new(tracker: &Arc<DirtyTracker>, document: &Document) -> Self {
        Self {
            tracker: tracker.clone(),
            document: document.clone(),
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if !self.tracker.is_dirty() {
            self.tracker.arm(&self.document);
        }
        warn!(path = %self.tracker.location, "Buffer transaction aborted");
        self.tracker.fire(BufferEvent::StateChangeFailed);
    }
}

/// Text read from storage, with the encoding it was decoded with.
struct Loaded {
    text: String,
    malformed: bool,
    encoding: EncodingState,
    stamp: SyncStamp,
}

pub struct TextFileBuffer<B: ContentBackend> {
    location: FileLocation,
    services: Arc<BufferServices<B>>,
    document: Option<Document>,
    encoding: EncodingState,
    status: BufferStatus,
    malformed_input: bool,
    stamp: SyncStamp,
    state: BufferState,
    tracker: Arc<DirtyTracker>,
    annotations: AnnotationBinding,
}

impl<B: ContentBackend> TextFileBuffer<B> {
    /// Create a buffer for `location` and load it.
    ///
    /// Never fails: a load error leaves an empty clean document and an error
    /// status. A location that does not exist yet loads as an empty document
    /// with an ok status, ready to be committed.
    pub fn connect(location: FileLocation, services: Arc<BufferServices<B>>) -> Self {
        let tracker = DirtyTracker::new(location.clone(), services.listeners.clone());
        let annotations = AnnotationBinding::new(services.annotation_factory.clone());
        let mut buffer = Self {
            location,
            services,
            document: None,
            encoding: EncodingState::default(),
            status: BufferStatus::Ok,
            malformed_input: false,
            stamp: None,
            state: BufferState::Disconnected,
            tracker,
            annotations,
        };
        buffer.load();
        buffer
    }

    fn load(&mut self) {
        self.state = BufferState::Loading;
        let document = match self.read_content(None) {
            Ok(loaded) => {
                self.encoding = loaded.encoding;
                self.stamp = loaded.stamp;
                self.status = BufferStatus::Ok;
                self.note_malformed(loaded.malformed);
                debug!(path = %self.location, charset = %self.encoding.charset(), "Buffer loaded");
                Document::with_text(loaded.text)
            }
            Err(e) => {
                warn!(path = %self.location, error = %e, "Buffer load failed");
                self.status = BufferStatus::Error(e.to_string());
                Document::new()
            }
        };
        self.tracker.reset(&document);
        self.document = Some(document);
        self.state = BufferState::Clean;
    }

    /// Resolve the encoding, then fetch and decode the content.
    fn read_content(&self, previous: Option<&str>) -> Result<Loaded> {
        let store = &self.services.store;
        let name = self.location.name();
        let encoding = self.services.resolver.resolve(
            self.encoding.explicit_override.as_deref(),
            &name,
            || store.open(&self.location),
            previous,
        );

        if !store.stat(&self.location)?.exists {
            debug!(path = %self.location, "No stored content, starting empty");
            return Ok(Loaded {
                text: String::new(),
                malformed: false,
                encoding,
                stamp: None,
            });
        }

        let fetched = store.fetch(&self.location)?;
        let decoded = decode_content(
            &fetched.bytes,
            encoding.charset(),
            encoding.has_byte_order_mark,
        )?;
        Ok(Loaded {
            text: decoded.text,
            malformed: decoded.malformed,
            encoding,
            stamp: fetched.stamp,
        })
    }

    fn note_malformed(&mut self, malformed: bool) {
        if malformed {
            warn!(
                path = %self.location,
                charset = %self.encoding.charset(),
                "Content is not valid in its charset, invalid bytes were replaced"
            );
        }
        self.malformed_input = malformed;
    }

    pub fn location(&self) -> &FileLocation {
        &self.location
    }

    /// True if the last load or revert met bytes invalid in the charset and
    /// replaced them with U+FFFD. Cleared by a successful commit.
    pub fn has_malformed_input(&self) -> bool {
        self.malformed_input
    }

    /// Queue this buffer's events until the returned value is dropped.
    pub fn hold_events(&self) -> HeldEvents {
        self.tracker.hold();
        HeldEvents {
            tracker: self.tracker.clone(),
        }
    }

    /// The document, or `None` once disconnected.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.document.is_some() && self.tracker.is_dirty()
    }

    pub fn state(&self) -> BufferState {
        match self.state {
            BufferState::Clean | BufferState::Dirty if self.tracker.is_dirty() => {
                BufferState::Dirty
            }
            BufferState::Clean | BufferState::Dirty => BufferState::Clean,
            other => other,
        }
    }

    /// Result of the last load or revert. A disconnected buffer reports an error.
    pub fn status(&self) -> BufferStatus {
        if self.document.is_none() {
            return BufferStatus::Error(
                BufferError::Disconnected(self.location.path().to_path_buf()).to_string(),
            );
        }
        self.status.clone()
    }

    pub fn encoding(&self) -> &EncodingState {
        &self.encoding
    }

    pub fn modification_stamp(&self) -> SyncStamp {
        self.stamp
    }

    fn connected_document(&self) -> Result<Document> {
        self.document
            .clone()
            .ok_or_else(|| BufferError::Disconnected(self.location.path().to_path_buf()))
    }

    /// Force the dirty flag, with the same notification as an edit or a commit.
    pub fn set_dirty(&mut self, dirty: bool) -> Result<()> {
        let document = self.connected_document()?;
        if dirty == self.tracker.is_dirty() {
            return Ok(());
        }
        if dirty {
            self.tracker.disarm(&document);
            self.tracker.dirty.store(true, Ordering::SeqCst);
        } else {
            self.tracker.reset(&document);
        }
        self.tracker.fire(BufferEvent::DirtyStateChanged { dirty });
        Ok(())
    }

    /// Set or clear the explicit charset override.
    ///
    /// Clearing it, or naming the charset already in use, re-sniffs the stored
    /// content. Naming a different charset adopts it for the next commit and
    /// forgets the BOM. The document text is not reloaded.
    pub fn set_encoding(&mut self, charset: Option<&str>) -> Result<()> {
        let requested = charset.map(str::trim).filter(|s| !s.is_empty());
        let canonical = requested
            .map(|name| Charset::for_name(name).map(|c| c.name().to_string()))
            .transpose()?;

        let same_as_current = canonical
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(self.encoding.charset()));

        match canonical {
            Some(name) if !same_as_current => {
                self.encoding = EncodingState {
                    resolved_charset: name.clone(),
                    explicit_override: Some(name),
                    has_byte_order_mark: false,
                };
            }
            _ => {
                let store = &self.services.store;
                self.encoding = self.services.resolver.resolve(
                    canonical.as_deref(),
                    &self.location.name(),
                    || store.open(&self.location),
                    Some(&self.encoding.resolved_charset),
                );
            }
        }
        debug!(path = %self.location, charset = %self.encoding.charset(), "Encoding changed");
        Ok(())
    }

    /// True if the stored file still has the stamp this buffer last saw.
    pub fn is_synchronized(&self) -> bool {
        match self.services.store.stat(&self.location) {
            Ok(info) => info.modified == self.stamp,
            Err(e) => {
                debug!(path = %self.location, error = %e, "Stat failed");
                false
            }
        }
    }

    /// Content type of the in-memory text when dirty, of the stored bytes otherwise.
    pub fn content_type(&self) -> Option<String> {
        let name = self.location.name();
        let resolver = &self.services.resolver;
        let description = match &self.document {
            Some(document) if self.tracker.is_dirty() => document
                .with_text_ref(|text| resolver.sniffer().describe_text(text, &name))
                .map_err(|e| debug!(name = %name, error = %e, "Content probe failed"))
                .ok(),
            _ => {
                let mut stream = self.services.store.open(&self.location).ok()?;
                resolver.describe_stream(&mut *stream, &name)
            }
        };
        description.and_then(|d| d.content_type)
    }

    /// The annotation model, created and connected on first access.
    pub fn annotation_model(&self) -> Option<AnnotationModelRef> {
        self.annotations
            .get_or_create(&self.location, self.document.as_ref())
    }

    /// Discard edits and reload from storage.
    ///
    /// Load failures are recorded in the status and leave the document as it
    /// was. Only a disconnected buffer returns an error.
    pub fn revert(&mut self) -> Result<()> {
        let document = self.connected_document()?;

        let loaded = match self.read_content(Some(&self.encoding.resolved_charset)) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(path = %self.location, error = %e, "Revert failed to read content");
                self.status = BufferStatus::Error(e.to_string());
                return Ok(());
            }
        };
        self.status = BufferStatus::Ok;
        self.encoding = loaded.encoding;
        self.note_malformed(loaded.malformed);

        let replace = document.with_text_ref(|current| current != loaded.text);
        if !replace && !self.tracker.is_dirty() {
            self.stamp = loaded.stamp;
            return Ok(());
        }

        self.state = BufferState::Reverting;
        self.tracker.fire(BufferEvent::StateChanging);
        let guard = TransactionGuard::new(&self.tracker, &document);

        if replace {
            self.tracker.fire(BufferEvent::ContentAboutToBeReplaced);
            self.tracker.disarm(&document);
            document.set(loaded.text);
        }
        let was_dirty = self.tracker.reset(&document);
        if replace {
            self.tracker.fire(BufferEvent::ContentReplaced);
        }
        self.stamp = loaded.stamp;

        if let Err(e) = self.annotations.revert(&document) {
            warn!(path = %self.location, error = %e, "Annotation model revert failed");
            self.status = BufferStatus::Error(e.to_string());
        }

        self.state = BufferState::Clean;
        guard.finish();
        if was_dirty {
            self.tracker.fire(BufferEvent::DirtyStateChanged { dirty: false });
        }
        debug!(path = %self.location, replaced = replace, "Buffer reverted");
        Ok(())
    }

    /// Write the document to storage. A clean buffer is left alone.
    ///
    /// Unless `overwrite` is set, fails with [`BufferError::OutOfSync`] when the
    /// stored file changed since this buffer last read or wrote it.
    pub fn commit(&mut self, overwrite: bool) -> Result<()> {
        let document = self.connected_document()?;
        if !self.tracker.is_dirty() {
            return Ok(());
        }

        self.state = BufferState::Committing;
        self.tracker.fire(BufferEvent::StateChanging);
        let guard = TransactionGuard::new(&self.tracker, &document);

        let charset = match self.write_content(&document, overwrite) {
            Ok(charset) => charset,
            Err(e) => {
                warn!(path = %self.location, error = %e, "Commit failed");
                self.state = BufferState::Dirty;
                guard.finish();
                self.tracker.fire(BufferEvent::StateChangeFailed);
                return Err(e);
            }
        };
        if self.encoding.explicit_override.is_none() {
            self.encoding.resolved_charset = charset;
        }
        self.malformed_input = false;

        if let Err(e) = self.annotations.commit(&document) {
            warn!(path = %self.location, error = %e, "Annotation model commit failed");
            self.status = BufferStatus::Error(e.to_string());
        }

        self.tracker.reset(&document);
        self.state = BufferState::Clean;
        guard.finish();
        self.tracker.fire(BufferEvent::DirtyStateChanged { dirty: false });
        debug!(path = %self.location, charset = %self.encoding.charset(), "Buffer committed");
        Ok(())
    }

    /// Encode fully, then store. Returns the charset written with.
    fn write_content(&mut self, document: &Document, overwrite: bool) -> Result<String> {
        let name = self.location.name();
        let (charset, bytes) = document.with_text_ref(|text| {
            let charset = self
                .services
                .resolver
                .resolve_for_commit(&self.encoding, text, &name);
            encode_content(text, &charset, self.encoding.has_byte_order_mark)
                .map(|bytes| (charset, bytes))
        })?;

        self.stamp = self
            .services
            .store
            .store(&self.location, &bytes, overwrite, self.stamp)?;
        Ok(charset)
    }

    /// Tear down: disconnect the annotation model and drop the document.
    /// Safe to call more than once.
    pub fn disconnect(&mut self) {
        let Some(document) = self.document.take() else {
            return;
        };
        self.annotations.disconnect(&document);
        self.tracker.disarm(&document);
        self.state = BufferState::Disconnected;
        debug!(path = %self.location, "Buffer disconnected");
    }
}
