//! Soft-failure reporting.
//!
//! Cache operations absorb filesystem and serialization failures instead of
//! returning them. Each absorbed failure becomes a [`Diagnostic`] handed to a
//! [`DiagnosticSink`]. The default [`LogSink`] writes it through the `log`
//! facade; [`MemorySink`] keeps them for inspection in tests.

use std::fmt;
use std::path::PathBuf;

use crate::sync_value::SyncValue;

/// One absorbed failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Cache operation that failed (e.g. `"save"`, `"decode"`).
    pub operation: &'static str,
    /// Path the operation was working on.
    pub path: PathBuf,
    /// Human-readable cause.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed at {}: {}",
            self.operation,
            self.path.display(),
            self.message
        )
    }
}

/// Receiver for soft failures.
pub trait DiagnosticSink: Send + Sync {
    /// Record a failure. Must not panic.
    fn report(&self, diagnostic: Diagnostic);
}

/// Writes every diagnostic as a `warn!` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        log::warn!("FileCache {}", diagnostic);
    }
}

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: SyncValue<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    #[must_use]
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.read()
    }

    /// Operation names in reporting order.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        self.entries
            .with(|entries| entries.iter().map(|d| d.operation).collect())
    }

    /// Number of diagnostics reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.with(Vec::len)
    }

    /// Whether nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything reported so far.
    pub fn clear(&self) {
        self.entries.modify(Vec::clear);
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        log::debug!("FileCache {}", diagnostic);
        self.entries.modify(|entries| entries.push(diagnostic));
    }
}
