//! Cache errors and lookup results.

use std::path::PathBuf;

use super::scope::Scope;

/// Errors produced by cache operations.
///
/// The lossy API (`get_data`, `decode`, ...) never returns these; they are
/// reported to the cache's [`DiagnosticSink`](super::DiagnosticSink) instead.
/// The rich API surfaces them through [`Lookup::Failed`].
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// Filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A value could not be serialized.
    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored bytes could not be deserialized into the requested type.
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        /// Path of the entry.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A keyed archive was malformed or failed its integrity check.
    #[error("Invalid archive {}: {reason}", path.display())]
    Archive {
        /// Path of the archive.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The platform reported no directory for the requested scope.
    #[error("No platform directory available for the {0} scope")]
    NoRootDirectory(Scope),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result of a read that distinguishes a missing entry from an unreadable one.
#[derive(Debug)]
pub enum Lookup<T> {
    /// The entry exists and was read.
    Found(T),
    /// No file exists for the key.
    NotFound,
    /// A file exists but could not be read or decoded.
    Failed(CacheError),
}

impl<T> Lookup<T> {
    /// The value, discarding the reason for its absence.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound | Self::Failed(_) => None,
        }
    }

    /// Returns `true` for [`Lookup::Found`].
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Returns `true` for [`Lookup::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns `true` for [`Lookup::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Transform a found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(value) => Lookup::Found(f(value)),
            Self::NotFound => Lookup::NotFound,
            Self::Failed(e) => Lookup::Failed(e),
        }
    }

    /// Chain a fallible step onto a found value.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, CacheError>) -> Lookup<U> {
        match self {
            Self::Found(value) => match f(value) {
                Ok(mapped) => Lookup::Found(mapped),
                Err(e) => Lookup::Failed(e),
            },
            Self::NotFound => Lookup::NotFound,
            Self::Failed(e) => Lookup::Failed(e),
        }
    }

    /// Convert to `Result<Option<T>>`, with `NotFound` as `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, CacheError> {
        match self {
            Self::Found(value) => Ok(Some(value)),
            Self::NotFound => Ok(None),
            Self::Failed(e) => Err(e),
        }
    }
}
