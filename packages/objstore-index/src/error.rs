//! Error types for objstore-index

use std::fmt;
use thiserror::Error;

/// Index error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unresolvable or incompatible provider selection, bad settings
    Configuration,
    /// Unknown index data type, absent object value, malformed constraint
    Validation,
    /// Exclusive cache lock unavailable during a mandatory invalidation
    ConcurrencyTimeout,
    /// Provider operation against an undefined object type
    NotProvisioned,
    /// Failure surfaced from the backing store transport
    BackingStore,
    /// Serialization/deserialization errors
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Validation => "validation",
            ErrorKind::ConcurrencyTimeout => "concurrency_timeout",
            ErrorKind::NotProvisioned => "not_provisioned",
            ErrorKind::BackingStore => "backing_store",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct IndexError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl IndexError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn concurrency_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConcurrencyTimeout, message)
    }

    pub fn not_provisioned(object_full_name: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NotProvisioned,
            format!("Object index not provisioned: {}", object_full_name.into()),
        )
    }

    pub fn backing_store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackingStore, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// A fatal error means the cache could not guarantee it holds no stale
    /// entries; the caller should drop and recreate it.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::ConcurrencyTimeout
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::backing_store(format!("SQLite error: {}", err)).with_source(err)
    }
}

// JSON error conversions
impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::serialization(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<serde_yaml::Error> for IndexError {
    fn from(err: serde_yaml::Error) -> Self {
        IndexError::configuration(format!("YAML error: {}", err)).with_source(err)
    }
}

impl From<prometheus::Error> for IndexError {
    fn from(err: prometheus::Error) -> Self {
        IndexError::configuration(format!("Metrics error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        IndexError::configuration(format!("I/O error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IndexError>;
