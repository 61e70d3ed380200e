//! # Context Setup
//!
//! Clients do not assemble a [`BufferManager`] by hand. [`initialize`] loads the
//! configuration, validates it and wires a filesystem-backed manager from it.
//!
//! ## Config Locations
//!
//! Two directories are searched and merged, later ones overriding earlier ones:
//!
//! 1. The user config directory: `TEXTBUF_CONFIG_DIR` if set (primarily for
//!    testing), otherwise the OS-appropriate directory from the `directories`
//!    crate.
//! 2. `.textbuf/` under the working directory.

use crate::config::BufferConfig;
use crate::encoding::BomSniffer;
use crate::error::Result;
use crate::manager::BufferManager;
use crate::store::fs_backend::FsBackend;
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "textbuf.toml";

pub struct TextbufContext {
    pub manager: BufferManager<FsBackend>,
    pub config: BufferConfig,
    pub config_dirs: Vec<PathBuf>,
}

/// The user-level config directory, if one can be determined.
pub fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os("TEXTBUF_CONFIG_DIR")
        .map(PathBuf::from)
        .or_else(|| {
            ProjectDirs::from("com", "textbuf", "textbuf").map(|d| d.config_dir().to_path_buf())
        })
}

/// Config directories in merge order (user first, local overrides).
pub fn config_dirs(cwd: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = user_config_dir().into_iter().collect();
    dirs.push(cwd.join(".textbuf"));
    dirs
}

pub fn load_config(dirs: &[PathBuf]) -> BufferConfig {
    let search_paths = dirs.iter().cloned().map(SearchPath::Path).collect();
    Clapfig::builder()
        .app_name("textbuf")
        .file_name(CONFIG_FILE_NAME)
        .search_paths(search_paths)
        .search_mode(SearchMode::Merge)
        .load()
        .unwrap_or_default()
}

/// A filesystem-backed manager configured from `config`.
pub fn build_manager(config: &BufferConfig) -> Result<BufferManager<FsBackend>> {
    config.validate()?;
    let backend = FsBackend::new().with_atomic_writes(config.atomic_writes);
    Ok(BufferManager::builder(backend)
        .with_sniffer(Arc::new(BomSniffer::new(config.sniff_limit)))
        .with_default_encoding(config.encoding_provider())
        .build())
}

pub fn initialize(cwd: &Path) -> Result<TextbufContext> {
    let config_dirs = config_dirs(cwd);
    let config = load_config(&config_dirs);
    debug!(
        atomic_writes = config.atomic_writes,
        sniff_limit = config.sniff_limit,
        default_encoding = ?config.default_encoding(),
        "Configuration loaded"
    );
    let manager = build_manager(&config)?;
    Ok(TextbufContext {
        manager,
        config,
        config_dirs,
    })
}
