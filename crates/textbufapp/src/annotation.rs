//! # Annotation Model Binding
//!
//! An annotation model is side metadata keyed by document positions (markers,
//! folds, diagnostics). A buffer owns at most one, created lazily the first time
//! someone asks for it and connected to the buffer's document until the buffer
//! is disconnected.
//!
//! ## Capabilities
//!
//! [`AnnotationModelRef`] tags what a model can do:
//!
//! - `Basic`: positions only; follows the document, forgets everything on reload.
//! - `Persistable`: additionally receives `revert(document)` when the buffer
//!   reloads from storage and `commit(document)` when it writes to storage.
//!
//! The buffer checks the tag before calling hooks. Hook failures never abort the
//! surrounding revert/commit; the buffer records them in its status.
//!
//! ## Lazy Creation
//!
//! [`AnnotationBinding::get_or_create`] runs under a mutex scoped to one buffer,
//! so concurrent first accesses produce exactly one model. If the
//! [`AnnotationModelFactory`] declines (e.g. unsupported content type), nothing
//! is cached and the next access asks again.

use crate::document::{Document, DocumentEvent, DocumentListener, ListenerId};
use crate::error::{BufferError, Result};
use crate::model::FileLocation;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A positioned piece of metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub kind: String,
    pub message: String,
    pub offset: usize,
    pub length: usize,
}

impl Annotation {
    pub fn new(kind: &str, message: &str, offset: usize, length: usize) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
            offset,
            length,
        }
    }

    fn end(&self) -> usize {
        self.offset + self.length
    }
}

pub trait AnnotationModel: Send + Sync {
    fn connect(&self, document: &Document);

    fn disconnect(&self, document: &Document);

    fn add_annotation(&self, annotation: Annotation) -> Result<()>;

    /// Removes every annotation of `kind`, returning how many were removed.
    fn remove_annotations(&self, kind: &str) -> usize;

    fn annotations(&self) -> Vec<Annotation>;
}

pub trait PersistableAnnotationModel: AnnotationModel {
    fn revert(&self, document: &Document) -> Result<()>;

    fn commit(&self, document: &Document) -> Result<()>;
}

#[derive(Clone)]
pub enum AnnotationModelRef {
    Basic(Arc<dyn AnnotationModel>),
    Persistable(Arc<dyn PersistableAnnotationModel>),
}

impl AnnotationModelRef {
    pub fn is_persistable(&self) -> bool {
        matches!(self, AnnotationModelRef::Persistable(_))
    }

    pub fn connect(&self, document: &Document) {
        match self {
            AnnotationModelRef::Basic(model) => model.connect(document),
            AnnotationModelRef::Persistable(model) => model.connect(document),
        }
    }

    pub fn disconnect(&self, document: &Document) {
        match self {
            AnnotationModelRef::Basic(model) => model.disconnect(document),
            AnnotationModelRef::Persistable(model) => model.disconnect(document),
        }
    }

    pub fn add_annotation(&self, annotation: Annotation) -> Result<()> {
        match self {
            AnnotationModelRef::Basic(model) => model.add_annotation(annotation),
            AnnotationModelRef::Persistable(model) => model.add_annotation(annotation),
        }
    }

    pub fn remove_annotations(&self, kind: &str) -> usize {
        match self {
            AnnotationModelRef::Basic(model) => model.remove_annotations(kind),
            AnnotationModelRef::Persistable(model) => model.remove_annotations(kind),
        }
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        match self {
            AnnotationModelRef::Basic(model) => model.annotations(),
            AnnotationModelRef::Persistable(model) => model.annotations(),
        }
    }
}

pub trait AnnotationModelFactory: Send + Sync {
    /// `None` declines: this location gets no annotation model.
    fn create(&self, location: &FileLocation) -> Option<AnnotationModelRef>;
}

/// The buffer-side holder of the lazily created model.
pub struct AnnotationBinding {
    factory: Option<Arc<dyn AnnotationModelFactory>>,
    model: Mutex<Option<AnnotationModelRef>>,
}

impl AnnotationBinding {
    pub fn new(factory: Option<Arc<dyn AnnotationModelFactory>>) -> Self {
        Self {
            factory,
            model: Mutex::new(None),
        }
    }

    /// Returns the bound model, creating and connecting it on first access.
    /// `document` is `None` once the buffer is disconnected; no model is created then.
    pub fn get_or_create(
        &self,
        location: &FileLocation,
        document: Option<&Document>,
    ) -> Option<AnnotationModelRef> {
        let mut slot = self.model.lock();
        if slot.is_none() {
            let document = document?;
            let model = self.factory.as_ref()?.create(location)?;
            model.connect(document);
            debug!(path = %location, persistable = model.is_persistable(), "Annotation model created");
            *slot = Some(model);
        }
        slot.clone()
    }

    /// The model, if one was created. Never creates.
    pub fn current(&self) -> Option<AnnotationModelRef> {
        self.model.lock().clone()
    }

    /// Invoke the persistable model's revert hook, if any.
    pub fn revert(&self, document: &Document) -> Result<()> {
        match self.current() {
            Some(AnnotationModelRef::Persistable(model)) => model.revert(document),
            _ => Ok(()),
        }
    }

    /// Invoke the persistable model's commit hook, if any.
    pub fn commit(&self, document: &Document) -> Result<()> {
        match self.current() {
            Some(AnnotationModelRef::Persistable(model)) => model.commit(document),
            _ => Ok(()),
        }
    }

    /// Disconnect and drop the model.
    pub fn disconnect(&self, document: &Document) {
        if let Some(model) = self.model.lock().take() {
            model.disconnect(document);
        }
    }
}

/// Keeps marker positions in step with document edits.
struct MarkerUpdater {
    markers: Arc<Mutex<Vec<Annotation>>>,
}

impl DocumentListener for MarkerUpdater {
    fn document_changed(&self, _document: &Document, event: &DocumentEvent) {
        let event_end = event.offset + event.length;
        let inserted = event.text.len();
        self.markers.lock().retain_mut(|marker| {
            if marker.end() <= event.offset && !(marker.length == 0 && marker.offset == event.offset)
            {
                true
            } else if marker.offset >= event_end {
                marker.offset = marker.offset - event.length + inserted;
                true
            } else if marker.offset <= event.offset && event_end <= marker.end() {
                marker.length = marker.length - event.length + inserted;
                true
            } else {
                false
            }
        });
    }
}

/// Position-keyed annotation model.
///
/// Markers move with edits: those after an edit shift, those enclosing it grow
/// or shrink, those partially overlapping a replaced range are dropped. As a
/// persistable model it snapshots markers on commit and restores the snapshot on
/// revert.
pub struct MarkerModel {
    markers: Arc<Mutex<Vec<Annotation>>>,
    saved: Mutex<Vec<Annotation>>,
    connection: Mutex<Option<(Document, ListenerId)>>,
}

impl Default for MarkerModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerModel {
    pub fn new() -> Self {
        Self {
            markers: Arc::new(Mutex::new(Vec::new())),
            saved: Mutex::new(Vec::new()),
            connection: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    fn document_len(&self) -> Option<usize> {
        self.connection.lock().as_ref().map(|(doc, _)| doc.len())
    }
}

impl AnnotationModel for MarkerModel {
    fn connect(&self, document: &Document) {
        let mut connection = self.connection.lock();
        if connection.is_some() {
            return;
        }
        let id = document.add_listener(Arc::new(MarkerUpdater {
            markers: self.markers.clone(),
        }));
        *connection = Some((document.clone(), id));
    }

    fn disconnect(&self, document: &Document) {
        let mut connection = self.connection.lock();
        if let Some((doc, id)) = connection.as_ref() {
            if doc.ptr_eq(document) {
                doc.remove_listener(*id);
                *connection = None;
            }
        }
    }

    fn add_annotation(&self, annotation: Annotation) -> Result<()> {
        if let Some(len) = self.document_len() {
            if annotation.end() > len {
                return Err(BufferError::BadLocation {
                    offset: annotation.offset,
                    end: annotation.end(),
                    len,
                });
            }
        }
        self.markers.lock().push(annotation);
        Ok(())
    }

    fn remove_annotations(&self, kind: &str) -> usize {
        let mut markers = self.markers.lock();
        let before = markers.len();
        markers.retain(|m| m.kind != kind);
        before - markers.len()
    }

    fn annotations(&self) -> Vec<Annotation> {
        self.markers.lock().clone()
    }
}

impl PersistableAnnotationModel for MarkerModel {
    fn revert(&self, document: &Document) -> Result<()> {
        let len = document.len();
        let restored: Vec<Annotation> = self
            .saved
            .lock()
            .iter()
            .filter(|m| m.end() <= len)
            .cloned()
            .collect();
        *self.markers.lock() = restored;
        Ok(())
    }

    fn commit(&self, _document: &Document) -> Result<()> {
        *self.saved.lock() = self.markers.lock().clone();
        Ok(())
    }
}

/// Creates [`MarkerModel`]s, optionally only for some file extensions.
pub struct MarkerModelFactory {
    persistable: bool,
    extensions: Option<Vec<String>>,
}

impl MarkerModelFactory {
    pub fn new(persistable: bool) -> Self {
        Self {
            persistable,
            extensions: None,
        }
    }

    /// Decline every location whose extension is not listed.
    pub fn for_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = Some(
            extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        );
        self
    }
}

impl AnnotationModelFactory for MarkerModelFactory {
    fn create(&self, location: &FileLocation) -> Option<AnnotationModelRef> {
        if let Some(allowed) = &self.extensions {
            let ext = location.extension()?;
            if !allowed.contains(&ext) {
                return None;
            }
        }
        let model = Arc::new(MarkerModel::new());
        Some(if self.persistable {
            AnnotationModelRef::Persistable(model)
        } else {
            AnnotationModelRef::Basic(model)
        })
    }
}
