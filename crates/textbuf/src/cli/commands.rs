//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdin, stdout, stderr)
//! - Installs a tracing subscriber
//! - Handles argument parsing
//!
//! Every handler follows the same shape: connect a buffer through the
//! [`BufferManager`], work on it under its write lock, disconnect. Handlers
//! that write refuse to when the content did not decode cleanly, since the
//! replaced bytes would be lost, unless `--force` is given.

use super::render::{render_info, render_info_json, BufferInfo};
use super::setup::{parse_cli, Commands, ConfigCommands};
use anyhow::{anyhow, bail, Context, Result};
use clapfig::{Clapfig, ConfigAction, SearchPath};
use console::style;
use std::io::Read;
use std::path::{Path, PathBuf};
use textbufapp::buffer::TextFileBuffer;
use textbufapp::config::BufferConfig;
use textbufapp::init::{initialize, CONFIG_FILE_NAME};
use textbufapp::manager::BufferManager;
use textbufapp::model::{BufferStatus, FileLocation};
use textbufapp::store::fs_backend::FsBackend;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<()> {
    let cli = parse_cli();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let ctx = initialize(&cwd)?;
    debug!(dirs = ?ctx.config_dirs, "Context initialized");

    match cli.command {
        Commands::Info { path, json } => handle_info(&ctx.manager, &path, json),
        Commands::Cat { path, encoding } => handle_cat(&ctx.manager, &path, encoding.as_deref()),
        Commands::Write {
            path,
            encoding,
            overwrite,
            force,
        } => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            let options = WriteOptions { overwrite, force };
            handle_write(&ctx.manager, &path, encoding.as_deref(), &input, options)
        }
        Commands::Convert { path, to, force } => {
            handle_convert(&ctx.manager, &path, &to, force)
        }
        Commands::Config { action } => {
            handle_config(action.as_ref(), &ctx.config, &ctx.config_dirs)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Copy)]
struct WriteOptions {
    overwrite: bool,
    force: bool,
}

/// Run `f` on a connected buffer, disconnecting afterwards whatever happens.
fn with_buffer<T>(
    manager: &BufferManager<FsBackend>,
    path: &Path,
    f: impl FnOnce(&mut TextFileBuffer<FsBackend>) -> Result<T>,
) -> Result<T> {
    let location = FileLocation::new(path);
    manager.connect(&location);
    let mut outcome = None;
    let updated = manager.update(&location, |buffer| {
        outcome = Some(f(buffer));
        Ok(())
    });
    manager.disconnect(&location)?;
    updated?;
    outcome.unwrap_or_else(|| Err(anyhow!("{} was not connected", path.display())))
}

fn ensure_clean_decode(buffer: &TextFileBuffer<FsBackend>, force: bool) -> Result<()> {
    if buffer.has_malformed_input() && !force {
        bail!(
            "{} is not valid {}; writing would replace the undecodable bytes. \
             Pass --force to write anyway, or name the right charset with -e",
            buffer.location(),
            buffer.encoding().charset()
        );
    }
    Ok(())
}

fn handle_info(manager: &BufferManager<FsBackend>, path: &Path, json: bool) -> Result<()> {
    let info = with_buffer(manager, path, |buffer| Ok(BufferInfo::from_buffer(buffer)))?;
    if json {
        println!("{}", render_info_json(&info)?);
    } else {
        print!("{}", render_info(&info));
    }
    Ok(())
}

fn handle_cat(
    manager: &BufferManager<FsBackend>,
    path: &Path,
    encoding: Option<&str>,
) -> Result<()> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    let text = with_buffer(manager, path, |buffer| {
        if let Some(charset) = encoding {
            buffer.set_encoding(Some(charset))?;
            buffer.revert()?;
        }
        if let BufferStatus::Error(message) = buffer.status() {
            bail!("{}", message);
        }
        Ok(buffer.document().map(|d| d.get()).unwrap_or_default())
    })?;
    print!("{}", text);
    Ok(())
}

fn handle_write(
    manager: &BufferManager<FsBackend>,
    path: &Path,
    encoding: Option<&str>,
    input: &str,
    options: WriteOptions,
) -> Result<()> {
    let charset = with_buffer(manager, path, |buffer| {
        if let Some(charset) = encoding {
            buffer.set_encoding(Some(charset))?;
            buffer.revert()?;
        }
        ensure_clean_decode(buffer, options.force)?;
        if let Some(document) = buffer.document() {
            document.set(input);
        }
        buffer.set_dirty(true)?;
        buffer.commit(options.overwrite)?;
        Ok(buffer.encoding().charset().to_string())
    })?;
    println!(
        "Wrote {} ({})",
        style(path.display()).bold(),
        style(charset).dim()
    );
    Ok(())
}

fn handle_convert(
    manager: &BufferManager<FsBackend>,
    path: &Path,
    to: &str,
    force: bool,
) -> Result<()> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    let (from, to) = with_buffer(manager, path, |buffer| {
        if let BufferStatus::Error(message) = buffer.status() {
            bail!("{}", message);
        }
        ensure_clean_decode(buffer, force)?;
        let from = buffer.encoding().charset().to_string();
        buffer.set_encoding(Some(to))?;
        buffer.set_dirty(true)?;
        buffer.commit(false)?;
        Ok((from, buffer.encoding().charset().to_string()))
    })?;
    println!(
        "Converted {} from {} to {}",
        style(path.display()).bold(),
        from,
        style(to).green()
    );
    Ok(())
}

fn handle_config(
    action: Option<&ConfigCommands>,
    config: &BufferConfig,
    dirs: &[PathBuf],
) -> Result<()> {
    match action {
        None => {
            let table = toml::Value::try_from(config)?;
            if let toml::Value::Table(t) = table {
                for (k, v) in &t {
                    println!("{} = {}", k, v);
                }
            }
            if config.default_encoding().is_none() {
                println!("# default_encoding unset, platform default is in effect");
            }
            Ok(())
        }
        Some(ConfigCommands::Get { key }) => {
            let search_paths = dirs.iter().cloned().map(SearchPath::Path).collect();
            let action = ConfigAction::Get {
                key: key.clone(),
                scope: None,
            };
            let result = Clapfig::builder::<BufferConfig>()
                .app_name("textbuf")
                .file_name(CONFIG_FILE_NAME)
                .search_paths(search_paths)
                .no_env()
                .strict(false)
                .handle(&action)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("{result}");
            Ok(())
        }
    }
}
