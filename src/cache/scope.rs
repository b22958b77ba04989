//! Storage scopes and folder layout.

use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Name of the folder every cache folder lives under.
///
/// Must not change: existing caches are located through it.
pub const ROOT_FOLDER: &str = "rootfolder";

/// Which platform area a cache folder is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Persistent data the user expects to keep (and back up).
    Document,
    /// Data that can be downloaded again or regenerated.
    #[default]
    Cache,
}

impl Scope {
    /// The platform root directory for this scope.
    #[must_use]
    pub fn root(self, dirs: &ProjectDirs) -> PathBuf {
        match self {
            Self::Document => dirs.data_dir().to_path_buf(),
            Self::Cache => dirs.cache_dir().to_path_buf(),
        }
    }

    /// Lowercase name, as used in config files and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Cache => "cache",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute `root / ROOT_FOLDER / folder_name`.
#[must_use]
pub fn cache_folder(root: &Path, folder_name: &str) -> PathBuf {
    root.join(ROOT_FOLDER).join(folder_name)
}
