//! Error types for the kwrank library.
//!
//! Every fallible operation returns [`Result`], whose error side is the
//! [`KwrankError`] enum. Leaf failures (store reads, decoding, cancellation)
//! are wrapped with the operation that hit them via [`ResultExt::context`],
//! and [`KwrankError::kind`] looks through those layers so callers can still
//! tell a cancellation apart from a corrupt record.
//!
//! # Examples
//!
//! ```
//! use kwrank::error::{KwrankError, Result, ResultExt};
//!
//! fn read_row() -> Result<()> {
//!     Err(KwrankError::cancelled("caller aborted"))
//! }
//!
//! let err = read_row().context("read posting row").unwrap_err();
//! assert!(err.is_cancelled());
//! assert_eq!(
//!     err.to_string(),
//!     "read posting row: Operation cancelled: caller aborted"
//! );
//! ```

use std::io;
use std::time::Duration;

use thiserror::Error;

/// The main error type for kwrank operations.
#[derive(Error, Debug)]
pub enum KwrankError {
    /// A scan or point read against a bucket failed.
    #[error("Store read error in bucket '{bucket}': {message}")]
    StoreRead { bucket: String, message: String },

    /// A bucket the operation depends on does not exist.
    #[error("Bucket not found: {0}")]
    MissingBucket(String),

    /// The hash shadow bucket of an indexed property does not exist.
    #[error("No hash bucket for property '{property}' found")]
    MissingHashBucket { property: String },

    /// A stored record could not be decoded.
    #[error("Decode error at {position}: {message}")]
    Decode { position: String, message: String },

    /// The caller cancelled the operation.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The caller's deadline passed before the operation finished.
    #[error("Operation timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    /// The query could not be executed as given.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An unexpected fault, e.g. a panic caught at the search boundary.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error wrapped with the operation that produced it.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<KwrankError>,
    },

    /// I/O errors (corpus files, config files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid wildcard pattern.
    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with KwrankError.
pub type Result<T> = std::result::Result<T, KwrankError>;

/// Coarse classification of an error, independent of context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StoreRead,
    MissingBucket,
    MissingHashBucket,
    Decode,
    Cancelled,
    TimedOut,
    InvalidQuery,
    InvalidConfig,
    Internal,
    Io,
    Serialization,
}

impl KwrankError {
    /// Create a new store read error.
    pub fn store_read<B: Into<String>, S: Into<String>>(bucket: B, msg: S) -> Self {
        KwrankError::StoreRead {
            bucket: bucket.into(),
            message: msg.into(),
        }
    }

    /// Create a new missing bucket error.
    pub fn missing_bucket<S: Into<String>>(name: S) -> Self {
        KwrankError::MissingBucket(name.into())
    }

    /// Create a new missing hash bucket error.
    pub fn missing_hash_bucket<S: Into<String>>(property: S) -> Self {
        KwrankError::MissingHashBucket {
            property: property.into(),
        }
    }

    /// Create a new decode error.
    pub fn decode<P: Into<String>, S: Into<String>>(position: P, msg: S) -> Self {
        KwrankError::Decode {
            position: position.into(),
            message: msg.into(),
        }
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(reason: S) -> Self {
        KwrankError::Cancelled(reason.into())
    }

    /// Create a new timeout error.
    pub fn timed_out(elapsed: Duration) -> Self {
        KwrankError::TimedOut { elapsed }
    }

    /// Create a new invalid query error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        KwrankError::InvalidQuery(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        KwrankError::InvalidConfig(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        KwrankError::Internal(msg.into())
    }

    /// Wrap this error with a description of the failed operation.
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        KwrankError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context layers.
    pub fn root(&self) -> &KwrankError {
        match self {
            KwrankError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classify this error, looking through context layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KwrankError::Context { source, .. } => source.kind(),
            KwrankError::StoreRead { .. } => ErrorKind::StoreRead,
            KwrankError::MissingBucket(_) => ErrorKind::MissingBucket,
            KwrankError::MissingHashBucket { .. } => ErrorKind::MissingHashBucket,
            KwrankError::Decode { .. } => ErrorKind::Decode,
            KwrankError::Cancelled(_) => ErrorKind::Cancelled,
            KwrankError::TimedOut { .. } => ErrorKind::TimedOut,
            KwrankError::InvalidQuery(_) => ErrorKind::InvalidQuery,
            KwrankError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            KwrankError::Internal(_) | KwrankError::Anyhow(_) => ErrorKind::Internal,
            KwrankError::Io(_) => ErrorKind::Io,
            KwrankError::Json(_) | KwrankError::Regex(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the caller aborted the operation (cancellation or deadline).
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled | ErrorKind::TimedOut)
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Cancellations, timeouts and store read failures are transient; schema
    /// violations and corrupt records are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Cancelled | ErrorKind::TimedOut | ErrorKind::StoreRead | ErrorKind::Io
        )
    }
}

/// Attach operation context to errors, anyhow style.
pub trait ResultExt<T> {
    /// Wrap the error side with `context`.
    fn context<S: Into<String>>(self, context: S) -> Result<T>;

    /// Wrap the error side with a lazily built context.
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T> {
        self.map_err(|e| e.with_context(f()))
    }
}
