//! # CLI Behavior
//!
//! This is **one possible UI client** for textbufapp, not the library itself.
//! The CLI is the only place that knows about terminal I/O, exit codes and
//! output formatting.
//!
//! ## Commands
//!
//! - `textbuf info <path> [--json]`: charset, BOM, content type, stamp, status.
//! - `textbuf cat <path> [-e charset]`: decoded text on stdout.
//! - `textbuf write <path> [-e charset] [--overwrite] [--force]`: stdin becomes
//!   the new content and is committed. Refuses to clobber a file changed since
//!   it was read unless `--overwrite` is given.
//! - `textbuf convert <path> --to <charset> [--force]`: re-encode in place.
//!
//! `write` and `convert` refuse files whose bytes are not valid in the charset
//! they were decoded with, unless `--force` is given.
//! - `textbuf config [get <key>]`: resolved configuration.

mod commands;
mod render;
mod setup;

pub use commands::run;
