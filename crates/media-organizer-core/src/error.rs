use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Result type for the format decoders
pub type DecodeResult<T> = core::result::Result<T, DecodeError>;

/// Custom error types for the media-organizer library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Root path is neither a file nor a directory
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// No decoder claims the extension of a directly requested file
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Structural violation inside a decoder
    #[error("Failed to parse {}: {source}", path.display())]
    MalformedData {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// A template token requires a tag the record does not carry
    #[error("Pattern token '%{token}' requires missing tag {key}")]
    MissingTag { token: char, key: String },

    /// Template resolution against a record that was not preloaded
    #[error("Record was not preloaded: {0}")]
    NotPreloaded(PathBuf),

    /// Destination violates the copy mode's preconditions
    #[error("Destination conflict: {0}")]
    DestinationConflict(String),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The walk was interrupted through the shutdown flag
    #[error("Operation cancelled")]
    Cancelled,

    /// Several files of one batch failed
    #[error("{} files failed: {}", .0.len(), join_errors(.0))]
    Batch(Vec<Error>),
}

impl Error {
    /// Collapse a list of failures into a single error
    pub fn from_failures(mut failures: Vec<Error>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop(),
            _ => Some(Error::Batch(failures)),
        }
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Structural problems found while decoding a single file
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Stream ended before a declared length was satisfied
    #[error("unexpected end of data while reading {0}")]
    ShortRead(&'static str),

    /// A required signature is missing or wrong
    #[error("invalid {0} signature")]
    InvalidSignature(&'static str),

    /// Header layout the decoder does not understand
    #[error("unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// A string field has no terminator before the end of its container
    #[error("unterminated {0}")]
    Unterminated(&'static str),

    /// Text payload uses an encoding the decoder cannot read
    #[error("unsupported text encoding: {0}")]
    UnsupportedEncoding(String),

    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
