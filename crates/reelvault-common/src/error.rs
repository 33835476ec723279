//! Common error types used throughout reelvault.
//!
//! This module provides the unified error taxonomy shared across crates:
//! filesystem failures, duplicate registrations, metadata provider failures,
//! database errors, and subprocess (probe/transcode) failures. "No match
//! found" is deliberately not an error; it is a normal outcome modeled by the
//! metadata query result types.

/// Common error type for reelvault.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A filesystem path is missing, unreadable, or of the wrong kind.
    #[error("Filesystem error: {0}")]
    FileSystem(String),

    /// A record with the same identity already exists (e.g. duplicate library root).
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A metadata provider request failed (network or parse failure).
    #[error("Provider error: {0}")]
    Provider(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A media probe subprocess failed.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A transcode subprocess failed or the codec is unsupported.
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new FileSystem error.
    pub fn filesystem<S: Into<String>>(msg: S) -> Self {
        Self::FileSystem(msg.into())
    }

    /// Create a new AlreadyExists error.
    pub fn already_exists<S: Into<String>>(msg: S) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a new Provider error.
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        Self::Analysis(msg.into())
    }

    /// Create a new Transcode error.
    pub fn transcode<S: Into<String>>(msg: S) -> Self {
        Self::Transcode(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
