//! Configuration loading and data folder resolution
//!
//! Bootstrap configuration lives in a small TOML file. Every field has a
//! built-in default, so a missing file is never fatal: the loader warns and
//! carries on with [`TomlConfig::default`].
//!
//! # Data folder priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `ANISUG_DATA_FOLDER` environment variable
//! 3. TOML config file (`data_folder`)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable consulted by [`DataFolderResolver`]
pub const DATA_FOLDER_ENV: &str = "ANISUG_DATA_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TomlConfig {
    /// Folder holding the CSV tables and snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_folder: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Suggestion session defaults (optional)
    #[serde(default)]
    pub suggestions: SuggestionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
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

/// Defaults applied to a suggestion session when the command line is silent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionConfig {
    /// Number of suggestions to return
    #[serde(default = "default_count")]
    pub count: usize,

    /// Which partitioner groups the graph into clusters
    #[serde(default)]
    pub partitioner: PartitionerKind,

    /// Seed for seed-dependent partitioners; `None` draws a fresh one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Iteration cap for iterative partitioners
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            partitioner: PartitionerKind::default(),
            seed: None,
            max_iterations: default_max_iterations(),
        }
    }
}

/// Partitioner selection by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionerKind {
    /// Weighted label propagation (seed-dependent)
    #[default]
    LabelPropagation,
    /// Connected components
    Components,
    /// Every node in one cluster
    Single,
}

impl PartitionerKind {
    /// Parse a partitioner name (case-insensitive, `-` and `_` interchangeable)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "label_propagation" | "labels" | "lpa" => Some(PartitionerKind::LabelPropagation),
            "components" | "connected_components" => Some(PartitionerKind::Components),
            "single" | "single_cluster" => Some(PartitionerKind::Single),
            _ => None,
        }
    }

    /// Canonical name, as written to TOML
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionerKind::LabelPropagation => "label_propagation",
            PartitionerKind::Components => "components",
            PartitionerKind::Single => "single",
        }
    }
}

impl std::fmt::Display for PartitionerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_count() -> usize {
    10
}

fn default_max_iterations() -> usize {
    100
}

/// Compiled-in fallbacks for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub config_file: Option<PathBuf>,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_folder = dirs::data_local_dir()
            .map(|d| d.join("anisug"))
            .unwrap_or_else(|| PathBuf::from("./anisug_data"));
        let config_file = dirs::config_dir().map(|d| d.join("anisug").join("config.toml"));

        Self {
            data_folder,
            config_file,
            log_level: default_log_level(),
        }
    }
}

/// Load the TOML config at `path`
///
/// A missing file yields defaults with a warning. A file that exists but
/// cannot be read or parsed is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load the config from an explicit path, or from the platform default location
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    match CompiledDefaults::for_current_platform().config_file {
        Some(path) => load_toml_config(&path),
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write the config atomically: serialize to `<target>.tmp`, then rename
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content)?;
    if let Err(e) = std::fs::rename(&tmp_path, target) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    debug!("Wrote config to {}", target.display());
    Ok(())
}

/// Resolves the data folder through the four-tier priority order
pub struct DataFolderResolver<'a> {
    cli_arg: Option<PathBuf>,
    config: Option<&'a TomlConfig>,
}

impl<'a> DataFolderResolver<'a> {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            config: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_config(mut self, config: &'a TomlConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = self.config.and_then(|c| c.data_folder.clone()) {
            return path;
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().data_folder
    }
}

impl Default for DataFolderResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioner_kind_parse() {
        assert_eq!(
            PartitionerKind::from_str("label-propagation"),
            Some(PartitionerKind::LabelPropagation)
        );
        assert_eq!(PartitionerKind::from_str("LPA"), Some(PartitionerKind::LabelPropagation));
        assert_eq!(PartitionerKind::from_str("components"), Some(PartitionerKind::Components));
        assert_eq!(PartitionerKind::from_str(" single "), Some(PartitionerKind::Single));
        assert_eq!(PartitionerKind::from_str("louvain"), None);
    }

    #[test]
    fn test_partitioner_kind_round_trip() {
        for kind in [
            PartitionerKind::LabelPropagation,
            PartitionerKind::Components,
            PartitionerKind::Single,
        ] {
            assert_eq!(PartitionerKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.suggestions.count, 10);
        assert_eq!(config.suggestions.max_iterations, 100);
        assert_eq!(config.suggestions.partitioner, PartitionerKind::LabelPropagation);
    }

    #[test]
    fn test_partial_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            data_folder = "/srv/anime"

            [suggestions]
            count = 5
            partitioner = "components"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_folder, Some(PathBuf::from("/srv/anime")));
        assert_eq!(config.suggestions.count, 5);
        assert_eq!(config.suggestions.partitioner, PartitionerKind::Components);
        assert_eq!(config.suggestions.seed, None);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_cli_arg_has_highest_priority() {
        let config = TomlConfig {
            data_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = DataFolderResolver::new()
            .with_cli_arg(Some(PathBuf::from("/from/cli")))
            .with_config(&config)
            .resolve();
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }
}
