//! Disk-backed file cache for stowaway.
//!
//! This module persists named entries (raw bytes, JSON values or keyed
//! archives) as files inside a per-instance folder.
//!
//! # Architecture
//!
//! * [`store`]: The [`FileCache`] itself, its write modes and options.
//! * [`scope`]: Storage scopes and the `rootfolder/<name>` layout.
//! * [`archive`]: The checksummed keyed-archive envelope.
//! * [`outcome`]: [`CacheError`] and the [`Lookup`] result type.
//! * [`diagnostics`]: Sinks receiving soft failures.
//!
//! # Layout
//!
//! ```text
//! <data or cache dir>/rootfolder/<folder_name>/<filename>
//! ```
//!
//! Callers choose folder names and filenames; neither is sanitized. Two caches
//! opened on the same folder share files but not queues, so their writes can
//! race.

pub mod archive;
pub mod diagnostics;
pub mod outcome;
pub mod scope;
pub mod store;

pub use archive::{ARCHIVER_NAME, ARCHIVE_VERSION};
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, MemorySink};
pub use outcome::{CacheError, Lookup};
pub use scope::{cache_folder, Scope, ROOT_FOLDER};
pub use store::{CacheOptions, Completion, FileCache, WriteMode};
