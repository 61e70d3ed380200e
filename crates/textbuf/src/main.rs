//! # textbuf CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this file
//! only invokes `cli::run()` and handles process termination.
//!
//! ## Workspace Structure
//!
//! - `crates/textbufapp/`: the buffer library, UI agnostic
//! - `crates/textbuf/`: this CLI, one client of the library
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/textbuf/src/cli/)                        │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Context wiring + command handlers (commands.rs)          │
//! │  - Terminal and JSON output (render.rs)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Library (crates/textbufapp/)                               │
//! │  - BufferManager: connect, disconnect                       │
//! │  - TextFileBuffer: load, revert, commit, encodings          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each invocation connects one buffer, performs one operation on it and
//! disconnects. Logging goes to stderr; `-v` turns on debug output, and
//! `RUST_LOG` overrides both.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
