use crate::encoding::FixedEncoding;
use crate::events::{BufferEvent, BufferListener};
use crate::manager::BufferManager;
use crate::model::FileLocation;
use crate::store::fs_backend::FsBackend;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Records every buffer event it receives.
#[derive(Default)]
pub struct RecordingListener {
    received: Mutex<Vec<(FileLocation, BufferEvent)>>,
}

impl BufferListener for RecordingListener {
    fn buffer_event(&self, location: &FileLocation, event: BufferEvent) {
        self.received.lock().push((location.clone(), event));
    }
}

impl RecordingListener {
    pub fn events(&self) -> Vec<BufferEvent> {
        self.received.lock().iter().map(|(_, e)| *e).collect()
    }

    pub fn events_for(&self, location: &FileLocation) -> Vec<BufferEvent> {
        self.received
            .lock()
            .iter()
            .filter(|(l, _)| l == location)
            .map(|(_, e)| *e)
            .collect()
    }

    pub fn count(&self, event: BufferEvent) -> usize {
        self.received
            .lock()
            .iter()
            .filter(|(_, e)| *e == event)
            .count()
    }

    pub fn clear(&self) {
        self.received.lock().clear();
    }
}

pub struct TestEnv {
    // We keep _temp_dir to ensure the directory is not dropped until the test is done
    pub _temp_dir: TempDir,
    pub manager: BufferManager<FsBackend>,
    pub events: Arc<RecordingListener>,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    /// A filesystem-backed manager in a fresh temp dir, with UTF-8 as default encoding.
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let manager = BufferManager::builder(FsBackend::new())
            .with_default_encoding(Arc::new(FixedEncoding("UTF-8".to_string())))
            .build();
        let events = Arc::new(RecordingListener::default());
        manager.add_listener(events.clone());
        Self {
            _temp_dir: temp_dir,
            manager,
            events,
            root,
        }
    }

    pub fn location(&self, name: &str) -> FileLocation {
        FileLocation::new(self.root.join(name))
    }

    /// Write `bytes` to `name` directly on disk and return its location.
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> FileLocation {
        let location = self.location(name);
        std::fs::write(location.path(), bytes).expect("failed to write test file");
        location
    }

    pub fn read_file(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.root.join(name)).expect("failed to read test file")
    }
}
