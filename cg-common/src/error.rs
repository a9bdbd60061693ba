//! Error type shared by the Card Graph crates

use thiserror::Error;

/// Result alias used throughout `cg-common` and by server-side data access
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that can occur below the HTTP layer
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (archive directories, transcripts, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding of stored metadata
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be parsed or holds an invalid value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A row addressed by id does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied a value outside the accepted domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external tool (ffmpeg, whisper, docker) failed or is missing
    #[error("External process error: {0}")]
    Process(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for [`Error::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
