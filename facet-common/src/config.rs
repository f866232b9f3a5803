//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `FACET_ROOT_FOLDER`
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup: compiled defaults
//! are used and the reason is handed back to be logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FACET_ROOT_FOLDER";

/// Environment variable overriding the TOML config file location
pub const CONFIG_FILE_ENV: &str = "FACET_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for baseline documents and the SQLite database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Durable baseline storage backend
    #[serde(default)]
    pub baseline_storage: BaselineStorageKind,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Detector command definitions keyed by detector name ("fer", "facs", ...)
    #[serde(default)]
    pub detectors: BTreeMap<String, DetectorCommandConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where baseline documents are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineStorageKind {
    /// One `<person_id>_baseline.json` file per person
    #[default]
    Json,
    /// `baselines` table in `facet.db`
    Sqlite,
}

/// External command wrapping one detector model
///
/// The image path is appended as the last argument; the command must print
/// the detection JSON on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorCommandConfig {
    /// Executable name or path
    pub command: String,

    /// Arguments placed before the image path
    #[serde(default)]
    pub args: Vec<String>,
}

impl TomlConfig {
    /// Load TOML config from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
    }

    /// Load TOML config, falling back to defaults when the file is missing or invalid
    ///
    /// Runs before the tracing subscriber exists, so the fallback reason is
    /// returned for the caller to log once logging is up.
    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<String>) {
        let Some(path) = path else {
            return (Self::default(), None);
        };

        if !path.exists() {
            let warning = format!("Config file not found: {}, using defaults", path.display());
            return (Self::default(), Some(warning));
        }

        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(format!("{}; using defaults", e))),
        }
    }
}

/// Default config file location: `$FACET_CONFIG`, else `<config_dir>/facet/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("facet").join(format!("{}.toml", module_name)))
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("facet"))
            .unwrap_or_else(|| PathBuf::from("./facet_data"));

        Self { root_folder }
    }
}

/// Resolves the root folder following the documented priority order
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_file: None,
        }
    }

    /// Command-line override (highest priority)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Explicit TOML file, replacing the default config location
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!("Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        let config_path = self
            .config_file
            .clone()
            .or_else(|| default_config_path(&self.module_name));
        if let Some(root) = config_path
            .as_deref()
            .filter(|p| p.exists())
            .and_then(|p| TomlConfig::load(p).ok())
            .and_then(|c| c.root_folder)
        {
            debug!("Root folder from config file");
            return root;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first use
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create root folder (and baselines directory) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.baselines_dir())?;
        Ok(())
    }

    /// Directory holding `<person_id>_baseline.json` documents
    pub fn baselines_dir(&self) -> PathBuf {
        self.root_folder.join("baselines")
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("facet.db")
    }
}
