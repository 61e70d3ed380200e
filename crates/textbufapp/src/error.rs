use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The file is not synchronized with the local file system: {}", .0.display())]
    OutOfSync(PathBuf),

    #[error("Character encoding \"{0}\" is not supported by this platform")]
    UnsupportedEncoding(String),

    #[error("Character encoding \"{0}\" is not a legal character encoding name")]
    IllegalEncodingName(String),

    #[error("Some characters cannot be mapped using \"{charset}\" character encoding (first unmappable: {character:?})")]
    CharsetMappingFailed { charset: String, character: char },

    #[error("Could not describe content of {name}: {reason}")]
    ContentProbe { name: String, reason: String },

    #[error("Invalid document range {offset}..{end} (document length {len})")]
    BadLocation {
        offset: usize,
        end: usize,
        len: usize,
    },

    #[error("Annotation model error: {0}")]
    AnnotationModel(String),

    #[error("Buffer for {} is disconnected", .0.display())]
    Disconnected(PathBuf),

    #[error("No buffer connected for {}", .0.display())]
    NotConnected(PathBuf),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BufferError>;
