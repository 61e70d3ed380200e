//! # Buffer Manager
//!
//! The manager is the entry point for clients. It owns the collaborators every
//! buffer shares (content store, encoding resolver, annotation factory) and the
//! [`ListenerRegistry`] buffers report to, and it keeps one buffer per location.
//!
//! ## Connection Counting
//!
//! `connect` creates and loads a buffer the first time a location is
//! connected and fires `BufferCreated`; later calls return the same buffer and
//! bump a counter. `disconnect` decrements it; at zero the buffer is
//! disconnected, dropped from the manager and `BufferDisposed` is fired.
//!
//! Buffers are handed out as [`SharedBuffer`]s. Readers (status, annotation
//! model access) can share the lock; load, revert and commit take it
//! exclusively, which serializes transactions per buffer.
//!
//! ## Event Delivery
//!
//! [`BufferManager::update`], [`BufferManager::commit`],
//! [`BufferManager::revert`] and [`BufferManager::commit_all`] deliver the
//! events they cause after releasing the buffer's write lock, so a listener may
//! read the buffer it is told about. Transactions started on a locked
//! [`SharedBuffer`] directly deliver while the lock is held.

use crate::annotation::AnnotationModelFactory;
use crate::buffer::{BufferServices, HeldEvents, TextFileBuffer};
use crate::encoding::{
    BomSniffer, ContentSniffer, DefaultEncodingProvider, EncodingResolver, PlatformEncoding,
};
use crate::error::{BufferError, Result};
use crate::events::{BufferEvent, BufferListener, ListenerRegistry, RegistrationId};
use crate::model::FileLocation;
use crate::store::backend::ContentBackend;
use crate::store::ContentStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type SharedBuffer<B> = Arc<RwLock<TextFileBuffer<B>>>;

struct Connection<B: ContentBackend> {
    buffer: SharedBuffer<B>,
    count: usize,
}

pub struct BufferManager<B: ContentBackend> {
    services: Arc<BufferServices<B>>,
    buffers: Mutex<HashMap<FileLocation, Connection<B>>>,
}

pub struct BufferManagerBuilder<B: ContentBackend> {
    backend: B,
    sniffer: Arc<dyn ContentSniffer>,
    defaults: Arc<dyn DefaultEncodingProvider>,
    annotation_factory: Option<Arc<dyn AnnotationModelFactory>>,
}

impl<B: ContentBackend> BufferManagerBuilder<B> {
    pub fn with_sniffer(mut self, sniffer: Arc<dyn ContentSniffer>) -> Self {
        self.sniffer = sniffer;
        self
    }

    pub fn with_default_encoding(mut self, defaults: Arc<dyn DefaultEncodingProvider>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_annotation_factory(mut self, factory: Arc<dyn AnnotationModelFactory>) -> Self {
        self.annotation_factory = Some(factory);
        self
    }

    pub fn build(self) -> BufferManager<B> {
        BufferManager {
            services: Arc::new(BufferServices {
                store: ContentStore::with_backend(self.backend),
                resolver: EncodingResolver::new(self.sniffer, self.defaults),
                listeners: ListenerRegistry::new(),
                annotation_factory: self.annotation_factory,
            }),
            buffers: Mutex::new(HashMap::new()),
        }
    }
}

impl<B: ContentBackend> BufferManager<B> {
    /// Start from the default sniffer, the platform encoding and no annotations.
    pub fn builder(backend: B) -> BufferManagerBuilder<B> {
        BufferManagerBuilder {
            backend,
            sniffer: Arc::new(BomSniffer::default()),
            defaults: Arc::new(PlatformEncoding),
            annotation_factory: None,
        }
    }

    pub fn new(backend: B) -> Self {
        Self::builder(backend).build()
    }

    pub fn backend(&self) -> &B {
        self.services.store.backend()
    }

    pub fn default_encoding(&self) -> String {
        self.services.resolver.default_encoding()
    }

    pub fn add_listener(&self, listener: Arc<dyn BufferListener>) -> RegistrationId {
        self.services.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: RegistrationId) -> bool {
        self.services.listeners.remove(id)
    }

    /// Connect to `location`, loading it on first connection.
    pub fn connect(&self, location: &FileLocation) -> SharedBuffer<B> {
        let (buffer, created) = {
            let mut buffers = self.buffers.lock();
            match buffers.get_mut(location) {
                Some(connection) => {
                    connection.count += 1;
                    (connection.buffer.clone(), false)
                }
                None => {
                    let buffer = Arc::new(RwLock::new(TextFileBuffer::connect(
                        location.clone(),
                        self.services.clone(),
                    )));
                    buffers.insert(
                        location.clone(),
                        Connection {
                            buffer: buffer.clone(),
                            count: 1,
                        },
                    );
                    (buffer, true)
                }
            }
        };

        if created {
            debug!(path = %location, "Buffer created");
            self.services.listeners.fire(location, BufferEvent::BufferCreated);
        }
        buffer
    }

    /// Drop one connection. The last one disconnects and disposes the buffer.
    pub fn disconnect(&self, location: &FileLocation) -> Result<()> {
        let disposed = {
            let mut buffers = self.buffers.lock();
            let connection = buffers
                .get_mut(location)
                .ok_or_else(|| BufferError::NotConnected(location.path().to_path_buf()))?;
            connection.count -= 1;
            if connection.count == 0 {
                buffers.remove(location).map(|c| c.buffer)
            } else {
                None
            }
        };

        if let Some(buffer) = disposed {
            buffer.write().disconnect();
            debug!(path = %location, "Buffer disposed");
            self.services.listeners.fire(location, BufferEvent::BufferDisposed);
        }
        Ok(())
    }

    /// The connected buffer for `location`, if any.
    pub fn buffer(&self, location: &FileLocation) -> Option<SharedBuffer<B>> {
        self.buffers
            .lock()
            .get(location)
            .map(|c| c.buffer.clone())
    }

    pub fn connection_count(&self, location: &FileLocation) -> usize {
        self.buffers
            .lock()
            .get(location)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn locations(&self) -> Vec<FileLocation> {
        self.buffers.lock().keys().cloned().collect()
    }

    /// Run `f` on the buffer at `location` under its write lock. Events raised
    /// meanwhile are delivered once the lock is released.
    pub fn update<T>(
        &self,
        location: &FileLocation,
        f: impl FnOnce(&mut TextFileBuffer<B>) -> Result<T>,
    ) -> Result<T> {
        let buffer = self
            .buffer(location)
            .ok_or_else(|| BufferError::NotConnected(location.path().to_path_buf()))?;
        Self::update_shared(&buffer, f)
    }

    fn update_shared<T>(
        buffer: &SharedBuffer<B>,
        f: impl FnOnce(&mut TextFileBuffer<B>) -> T,
    ) -> T {
        // Declared before the lock guard so it drops, and delivers, after it.
        let _held: HeldEvents;
        let mut guard = buffer.write();
        _held = guard.hold_events();
        f(&mut *guard)
    }

    pub fn commit(&self, location: &FileLocation, overwrite: bool) -> Result<()> {
        self.update(location, |buffer| buffer.commit(overwrite))
    }

    pub fn revert(&self, location: &FileLocation) -> Result<()> {
        self.update(location, |buffer| buffer.revert())
    }

    /// Commit every dirty buffer, stopping at the first failure.
    pub fn commit_all(&self, overwrite: bool) -> Result<usize> {
        let buffers: Vec<SharedBuffer<B>> = self
            .buffers
            .lock()
            .values()
            .map(|c| c.buffer.clone())
            .collect();

        let mut committed = 0;
        for buffer in &buffers {
            let wrote = Self::update_shared(buffer, |buffer| {
                if !buffer.is_dirty() {
                    return Ok(false);
                }
                buffer.commit(overwrite).map(|_| true)
            })?;
            if wrote {
                committed += 1;
            }
        }
        Ok(committed)
    }
}
