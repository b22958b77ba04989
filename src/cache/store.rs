//! Disk-backed file cache.
//!
//! [`FileCache`] stores named entries as plain files inside one folder:
//! `root(scope)/rootfolder/<folder_name>/<filename>`. Entries can be raw
//! bytes, JSON-encoded values, or keyed archives.
//!
//! # Writes
//!
//! Every write removes the current file and then writes the new payload to a
//! temporary file in the same folder, which is renamed onto the target. A
//! reader never observes half-written content.
//!
//! Asynchronous writes go to the cache's own [`SerialQueue`] and run in
//! submission order. Queued jobs only hold a weak reference to the cache: once
//! every handle is dropped, jobs that have not started become no-ops and
//! their completions never fire.
//!
//! # Failures
//!
//! Nothing here returns an error to the caller. Failures are reported to the
//! cache's [`DiagnosticSink`] and the operation degrades to "nothing written"
//! or "nothing found". Use [`FileCache::lookup`] when a missing entry must be
//! told apart from a corrupt one.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tempfile::Builder;

use super::archive::{archive_bytes, unarchive_bytes};
use super::diagnostics::{Diagnostic, DiagnosticSink, LogSink};
use super::outcome::{CacheError, Lookup};
use super::scope::{cache_folder, Scope};
use crate::config::CacheSettings;
use crate::queue::{Executor, SerialQueue};

/// Prefix of in-flight temporary files; such names are hidden from [`FileCache::entries`].
const PARTIAL_PREFIX: &str = ".stowaway-";
const PARTIAL_SUFFIX: &str = ".partial";

/// Invoked once a queued or synchronous write attempt has finished.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Whether [`FileCache::save`] blocks the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Queue the write and return immediately.
    #[default]
    Async,
    /// Write on the calling thread before returning.
    Sync,
}

/// Construction options for [`FileCache`].
#[derive(Clone)]
pub struct CacheOptions {
    /// Write JSON values indented instead of compact.
    pub pretty_json: bool,
    /// Where soft failures are reported.
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("pretty_json", &self.pretty_json)
            .field("diagnostics", &"<sink>")
            .finish()
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            pretty_json: false,
            diagnostics: Arc::new(LogSink),
        }
    }
}

impl CacheOptions {
    /// Indent JSON written by [`FileCache::encode`].
    #[must_use]
    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    /// Report soft failures to `sink`.
    #[must_use]
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }
}

impl From<&CacheSettings> for CacheOptions {
    fn from(settings: &CacheSettings) -> Self {
        Self::default().with_pretty_json(settings.pretty_json)
    }
}

struct Inner {
    folder: PathBuf,
    pretty_json: bool,
    diagnostics: Arc<dyn DiagnosticSink>,
    /// `None` when the worker thread could not be spawned; async work then runs inline.
    queue: Option<SerialQueue>,
}

/// A folder of named cache entries.
///
/// Cloning is cheap; clones share the folder, queue and diagnostics sink.
#[derive(Clone)]
pub struct FileCache {
    inner: Arc<Inner>,
}

impl FileCache {
    /// Open `folder_name` under the platform directory for `scope`, using
    /// default settings.
    pub fn new(folder_name: &str, scope: Scope) -> Self {
        Self::from_settings(&CacheSettings::default(), folder_name, scope)
    }

    /// Open `folder_name` under the root `settings` resolve for `scope`.
    ///
    /// If no root can be resolved the failure is reported and the system
    /// temporary directory is used instead.
    pub fn from_settings(settings: &CacheSettings, folder_name: &str, scope: Scope) -> Self {
        let options = CacheOptions::from(settings);
        let root = match settings.root_for(scope) {
            Ok(root) => root,
            Err(e) => {
                let fallback = std::env::temp_dir();
                options.diagnostics.report(Diagnostic {
                    operation: "resolve_root",
                    path: fallback.clone(),
                    message: format!("{}; using the temporary directory", e),
                });
                fallback
            }
        };
        Self::with_options(root, folder_name, options)
    }

    /// Open `folder_name` under an explicit `root`.
    pub fn with_root(root: impl AsRef<Path>, folder_name: &str) -> Self {
        Self::with_options(root, folder_name, CacheOptions::default())
    }

    /// Open `folder_name` under `root` with custom options.
    ///
    /// The folder is created if missing. A creation failure is reported and
    /// leaves a cache that finds nothing and fails every write softly.
    pub fn with_options(root: impl AsRef<Path>, folder_name: &str, options: CacheOptions) -> Self {
        let folder = cache_folder(root.as_ref(), folder_name);

        let queue = match SerialQueue::new(format!("stowaway.cache.{}", folder_name)) {
            Ok(queue) => Some(queue),
            Err(e) => {
                options.diagnostics.report(Diagnostic {
                    operation: "spawn_queue",
                    path: folder.clone(),
                    message: format!("{}; asynchronous writes will run inline", e),
                });
                None
            }
        };

        let inner = Inner {
            folder,
            pretty_json: options.pretty_json,
            diagnostics: options.diagnostics,
            queue,
        };
        inner.create_folder();
        log::debug!("FileCache opened at {}", inner.folder.display());

        Self {
            inner: Arc::new(inner),
        }
    }

    /// The folder holding this cache's entries.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.inner.folder
    }

    /// Full path of the entry `filename`.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.inner.folder.join(filename)
    }

    /// Raw bytes of `filename`, or `None` if absent or unreadable.
    #[must_use]
    pub fn get_data(&self, filename: &str) -> Option<Vec<u8>> {
        self.inner.absorb("get_data", self.lookup_data(filename))
    }

    /// Raw bytes of `filename`, distinguishing absence from failure.
    #[must_use]
    pub fn lookup_data(&self, filename: &str) -> Lookup<Vec<u8>> {
        self.inner.read(&self.file_path(filename))
    }

    /// Decode `filename` as JSON into `T`.
    ///
    /// Returns `None` both when the entry is missing and when it fails to
    /// decode; the latter is reported to the diagnostics sink.
    #[must_use]
    pub fn decode<T: DeserializeOwned>(&self, filename: &str) -> Option<T> {
        self.inner.absorb("decode", self.lookup(filename))
    }

    /// Decode `filename` as JSON into `T`, distinguishing absence from failure.
    #[must_use]
    pub fn lookup<T: DeserializeOwned>(&self, filename: &str) -> Lookup<T> {
        let path = self.file_path(filename);
        self.inner.read(&path).and_then(|bytes| {
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Decode {
                path: path.clone(),
                source,
            })
        })
    }

    /// Read the keyed archive `filename` and return its root value.
    #[must_use]
    pub fn unarchive(&self, filename: &str) -> Option<Value> {
        let path = self.file_path(filename);
        let lookup = self
            .inner
            .read(&path)
            .and_then(|bytes| unarchive_bytes(&path, &bytes));
        self.inner.absorb("unarchive", lookup)
    }

    /// Read the keyed archive `filename` and convert its root into `T`.
    #[must_use]
    pub fn unarchive_as<T: DeserializeOwned>(&self, filename: &str) -> Option<T> {
        let path = self.file_path(filename);
        let lookup = self
            .inner
            .read(&path)
            .and_then(|bytes| unarchive_bytes(&path, &bytes))
            .and_then(|root| {
                serde_json::from_value(root).map_err(|source| CacheError::Decode {
                    path: path.clone(),
                    source,
                })
            });
        self.inner.absorb("unarchive", lookup)
    }

    /// Write `data` to `filename`, replacing any previous content.
    ///
    /// With [`WriteMode::Async`] the write is queued and `completion` runs on
    /// the cache's queue afterwards. With [`WriteMode::Sync`] both happen on
    /// the caller before this returns. `completion` runs whether or not the
    /// write succeeded.
    pub fn save(
        &self,
        data: impl Into<Vec<u8>>,
        filename: &str,
        mode: WriteMode,
        completion: Option<Completion>,
    ) {
        let data = data.into();
        let path = self.file_path(filename);
        match mode {
            WriteMode::Sync => {
                self.inner.write_replacing("save", &path, &data);
                if let Some(done) = completion {
                    done();
                }
            }
            WriteMode::Async => self.enqueue("save", move |inner| {
                inner.write_replacing("save", &path, &data);
                if let Some(done) = completion {
                    done();
                }
            }),
        }
    }

    /// Write `data` to `filename` on the caller, returning whether the new
    /// content landed. Failures are still reported to the sink.
    pub(crate) fn write_now(&self, data: &[u8], filename: &str) -> bool {
        self.inner.write_replacing("save", &self.file_path(filename), data)
    }

    /// Queue a write of `data` to `filename` without a completion.
    pub fn save_async(&self, data: impl Into<Vec<u8>>, filename: &str) {
        self.save(data, filename, WriteMode::Async, None);
    }

    /// Queue a keyed archive of `value` under `filename`.
    ///
    /// `value` is serialized on the caller so it need not be `Send`; the write
    /// itself is queued. A serialization failure is reported and nothing is
    /// written, but `completion` still runs on the queue.
    pub fn archive<T: Serialize + ?Sized>(
        &self,
        value: &T,
        filename: &str,
        completion: Option<Completion>,
    ) {
        let path = self.file_path(filename);
        let payload = archive_bytes(value);
        self.enqueue("archive", move |inner| {
            match payload {
                Ok(bytes) => {
                    inner.write_replacing("archive", &path, &bytes);
                }
                Err(e) => inner.report("archive", &path, e),
            }
            if let Some(done) = completion {
                done();
            }
        });
    }

    /// Queue a JSON encoding of `value` under `filename`.
    ///
    /// Serialization runs on the queue. On failure nothing is written, the
    /// failure is reported, and `completion` still runs.
    pub fn encode<T: Serialize + Send + 'static>(
        &self,
        value: T,
        filename: &str,
        completion: Option<Completion>,
    ) {
        let path = self.file_path(filename);
        self.enqueue("encode", move |inner| {
            let encoded = if inner.pretty_json {
                serde_json::to_vec_pretty(&value)
            } else {
                serde_json::to_vec(&value)
            };
            match encoded {
                Ok(bytes) => {
                    inner.write_replacing("encode", &path, &bytes);
                }
                Err(e) => inner.report("encode", &path, CacheError::Encode(e)),
            }
            if let Some(done) = completion {
                done();
            }
        });
    }

    /// Remove `filename` if it exists.
    pub fn delete(&self, filename: &str) {
        self.inner.remove_if_exists("delete", &self.file_path(filename));
    }

    /// Remove the file at `path` if it exists. Failures are reported.
    pub fn remove_if_file_exists(&self, path: &Path) {
        self.inner.remove_if_exists("remove_if_file_exists", path);
    }

    /// Whether a file or directory exists at `path`.
    #[must_use]
    pub fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Remove every direct child of `folder`.
    ///
    /// Does nothing if `folder` cannot be listed. Children that cannot be
    /// removed are reported and skipped.
    pub fn remove_folder_content(&self, folder: &Path) {
        self.inner.remove_folder_content(folder);
    }

    /// Remove every entry of this cache.
    pub fn clear(&self) {
        self.inner.remove_folder_content(&self.inner.folder);
    }

    /// Names of the entries currently stored, sorted.
    ///
    /// Temporary files of writes still in progress are not listed.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        let Ok(read_dir) = fs::read_dir(&self.inner.folder) else {
            return Vec::new();
        };
        let mut names: Vec<String> = read_dir
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !(name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX)))
            .collect();
        names.sort();
        names
    }

    /// Block until every operation queued before this call has finished.
    ///
    /// Returns immediately when called from a completion running on this
    /// cache's own queue.
    pub fn flush(&self) {
        if let Some(queue) = &self.inner.queue {
            queue.barrier();
        }
    }

    fn enqueue(&self, operation: &'static str, job: impl FnOnce(&Inner) + Send + 'static) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = move || {
            let Some(inner) = weak.upgrade() else {
                log::debug!("FileCache {} skipped: cache was dropped", operation);
                return;
            };
            job(&inner);
        };
        match &self.inner.queue {
            Some(queue) => queue.execute(Box::new(task)),
            None => task(),
        }
    }
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("folder", &self.inner.folder)
            .field("pretty_json", &self.inner.pretty_json)
            .field("queue", &self.inner.queue)
            .finish()
    }
}

impl Inner {
    fn report(&self, operation: &'static str, path: &Path, error: impl fmt::Display) {
        self.diagnostics.report(Diagnostic {
            operation,
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }

    fn absorb<T>(&self, operation: &'static str, lookup: Lookup<T>) -> Option<T> {
        match lookup {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
            Lookup::Failed(e) => {
                let path = failure_path(&e).unwrap_or(self.folder.as_path());
                self.report(operation, path, &e);
                None
            }
        }
    }

    fn create_folder(&self) {
        if self.folder.is_dir() {
            return;
        }
        if let Err(e) = fs::create_dir_all(&self.folder) {
            self.report("create_folder", &self.folder, e);
        }
    }

    fn read(&self, path: &Path) -> Lookup<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Lookup::Found(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Lookup::NotFound,
            Err(e) => Lookup::Failed(CacheError::io(path, e)),
        }
    }

    /// Remove the old file, then atomically put `data` in its place.
    fn write_replacing(&self, operation: &'static str, path: &Path, data: &[u8]) -> bool {
        self.remove_if_exists(operation, path);
        match write_atomic(path, data) {
            Ok(()) => {
                log::trace!("FileCache wrote {} bytes to {}", data.len(), path.display());
                true
            }
            Err(e) => {
                self.report(operation, path, e);
                false
            }
        }
    }

    fn remove_if_exists(&self, operation: &'static str, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => self.report(operation, path, e),
        }
    }

    fn remove_folder_content(&self, folder: &Path) {
        let Ok(read_dir) = fs::read_dir(folder) else {
            return;
        };
        for entry in read_dir.filter_map(Result::ok) {
            let path = entry.path();
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            let removed = if is_dir {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = removed {
                self.report("remove_folder_content", &path, e);
            }
        }
    }
}

fn failure_path(error: &CacheError) -> Option<&Path> {
    match error {
        CacheError::Io { path, .. }
        | CacheError::Decode { path, .. }
        | CacheError::Archive { path, .. } => Some(path),
        CacheError::Encode(_) | CacheError::NoRootDirectory(_) => None,
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut partial = Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| CacheError::io(dir, e))?;
    partial
        .write_all(data)
        .and_then(|()| partial.as_file().sync_all())
        .map_err(|e| CacheError::io(partial.path(), e))?;
    partial
        .persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}
