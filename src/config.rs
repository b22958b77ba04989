//! Layered configuration.
//!
//! Settings are merged from, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. `config.toml` in the platform config directory (if present),
//! 3. `STOWAWAY_*` environment variables (`__` separates nested keys).
//!
//! ```toml
//! root = "/var/lib/myapp"
//! pretty_json = true
//! debounce_ms = 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, Scope};

/// Prefix of environment variables read by [`CacheSettings::load`].
pub const ENV_PREFIX: &str = "STOWAWAY_";

const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The merged configuration could not be extracted.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// The configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Settings shared by caches and debouncers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Explicit root replacing the platform directory for every scope.
    pub root: Option<PathBuf>,
    /// Reverse-domain qualifier used to locate platform directories.
    pub qualifier: String,
    /// Organization used to locate platform directories.
    pub organization: String,
    /// Application name used to locate platform directories.
    pub application: String,
    /// Indent JSON produced by `encode`.
    pub pretty_json: bool,
    /// Default debounce delay in milliseconds.
    pub debounce_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: None,
            qualifier: "com".to_string(),
            organization: "stowaway".to_string(),
            application: "stowaway".to_string(),
            pretty_json: false,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl CacheSettings {
    /// Load settings from the default config file and environment.
    ///
    /// Falls back to defaults if anything is malformed.
    pub fn load() -> Self {
        let file = Self::config_path().filter(|path| path.exists());
        match Self::extract(Self::figment(file.as_deref())) {
            Ok(settings) => settings,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit TOML file, then the environment.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or the merged values are invalid.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::extract(Self::figment(Some(path)))
    }

    /// The layered provider stack, exposed for callers adding their own layers.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// Default location of `config.toml`.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        let defaults = Self::default();
        defaults
            .project_dirs()
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Platform directories for the configured application identity.
    #[must_use]
    pub fn project_dirs(&self) -> Option<ProjectDirs> {
        ProjectDirs::from(&self.qualifier, &self.organization, &self.application)
    }

    /// Resolve the root directory for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NoRootDirectory`] when no explicit root is set
    /// and the platform has no home directory.
    pub fn root_for(&self, scope: Scope) -> Result<PathBuf, CacheError> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        self.project_dirs()
            .map(|dirs| scope.root(&dirs))
            .ok_or(CacheError::NoRootDirectory(scope))
    }

    /// The default debounce delay.
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Render the settings as TOML.
    ///
    /// # Errors
    ///
    /// Fails only if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
