use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "textbuf",
    bin_name = "textbuf",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Inspect, convert and rewrite text files through encoding-aware buffers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show charset, byte order mark, content type and status of a file
    Info {
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the decoded text of a file
    Cat {
        path: PathBuf,

        /// Decode with this charset instead of the detected one
        #[arg(short = 'e', long)]
        encoding: Option<String>,
    },

    /// Replace a file's text with stdin and save it
    Write {
        path: PathBuf,

        /// Encode with this charset instead of the detected one
        #[arg(short = 'e', long)]
        encoding: Option<String>,

        /// Write even if the file changed since it was read
        #[arg(long)]
        overwrite: bool,

        /// Write even if the current content is not valid in its charset
        #[arg(short, long)]
        force: bool,
    },

    /// Re-encode a file into another charset
    Convert {
        path: PathBuf,

        /// Target charset (e.g. UTF-8, ISO-8859-1, UTF-16LE)
        #[arg(long)]
        to: String,

        /// Convert even if the content is not valid in its charset
        #[arg(short, long)]
        force: bool,
    },

    /// Show resolved configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Get a specific value
    Get { key: String },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_flags() {
        let cli = Cli::try_parse_from(["textbuf", "write", "a.txt", "-e", "UTF-16LE", "--overwrite"])
            .unwrap();
        match cli.command {
            Commands::Write {
                path,
                encoding,
                overwrite,
                force,
            } => {
                assert_eq!(path, PathBuf::from("a.txt"));
                assert_eq!(encoding.as_deref(), Some("UTF-16LE"));
                assert!(overwrite);
                assert!(!force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["textbuf", "info", "a.txt", "-v"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_convert_requires_target() {
        assert!(Cli::try_parse_from(["textbuf", "convert", "a.txt"]).is_err());
    }

    #[test]
    fn test_convert_force_flag() {
        let cli =
            Cli::try_parse_from(["textbuf", "convert", "a.txt", "--to", "UTF-8", "-f"]).unwrap();
        assert!(matches!(cli.command, Commands::Convert { force: true, .. }));
    }

    #[test]
    fn test_bare_config() {
        let cli = Cli::try_parse_from(["textbuf", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { action: None }));
    }
}
