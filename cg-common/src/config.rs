//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `CARDGRAPH_ROOT_FOLDER`, then `CARDGRAPH_ROOT`
//! 3. `root_folder` in the module's TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! the compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Primary environment variable for the root folder
pub const ROOT_FOLDER_ENV: &str = "CARDGRAPH_ROOT_FOLDER";
/// Alternate (shorter) environment variable for the root folder
pub const ROOT_ENV: &str = "CARDGRAPH_ROOT";
/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "cardgraph.db";

/// Contents of `<config_dir>/cardgraph/<module>.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Listen address (e.g. "127.0.0.1")
    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Shared key accepted by the scheduler endpoints
    #[serde(default)]
    pub scheduler_key: Option<String>,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
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

/// `[tools]` table: external programs used by the session runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_whisper")]
    pub whisper: String,
    #[serde(default = "default_docker")]
    pub docker: String,
    /// Directory holding downloaded Whisper model files (`<model>.pt`)
    #[serde(default)]
    pub whisper_model_dir: Option<PathBuf>,
    /// Image used for browser-automation recording
    #[serde(default = "default_recorder_image")]
    pub browser_recorder_image: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            whisper: default_whisper(),
            docker: default_docker(),
            whisper_model_dir: None,
            browser_recorder_image: default_recorder_image(),
        }
    }
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_whisper() -> String {
    "whisper".to_string()
}

fn default_docker() -> String {
    "docker".to_string()
}

fn default_recorder_image() -> String {
    "cg-browser-recorder:latest".to_string()
}

/// Compiled-in fallbacks for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("cardgraph"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cardgraph"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("cardgraph"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cardgraph"))
        } else {
            dirs::data_local_dir()
                .map(|d| d.join("cardgraph"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/cardgraph"))
        };

        Self { root_folder }
    }
}

/// Path of the module's TOML file, preferring the user config directory
///
/// On Linux `/etc/cardgraph/<module>.toml` is used when the user file does
/// not exist.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user = dirs::config_dir().map(|d| d.join("cardgraph").join(&file_name));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user {
            if path.exists() {
                return user;
            }
        }
        let system = PathBuf::from("/etc/cardgraph").join(&file_name);
        if system.exists() {
            return Some(system);
        }
        return user;
    }

    user
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<TomlConfig>(&content)?;
    Ok(config)
}

/// Load the module's TOML config, falling back to defaults on any problem
pub fn load_toml_config(module_name: &str) -> TomlConfig {
    let Some(path) = config_file_path(module_name) else {
        debug!("No config directory available, using defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        debug!("Config file {} not found, using defaults", path.display());
        return TomlConfig::default();
    }

    match read_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Resolves the root folder for one module
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Highest-priority override taken from the command line
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(root) = load_toml_config(&self.module_name).root_folder {
            return root;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
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

    /// Create the directory (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder).map_err(|e| {
            Error::Config(format!(
                "Failed to create root folder {}: {}",
                self.root_folder.display(),
                e
            ))
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_defaults_apply_when_table_missing() {
        let config: TomlConfig = toml::from_str("port = 6000").unwrap();
        assert_eq!(config.port, Some(6000));
        assert_eq!(config.tools.ffmpeg, "ffmpeg");
        assert_eq!(config.tools.browser_recorder_image, "cg-browser-recorder:latest");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_read_toml_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        let err = read_toml_config(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cli_arg_wins() {
        let resolver = RootFolderResolver::new("cardgraph-test")
            .with_cli_arg(Some(PathBuf::from("/tmp/cg-cli-root")));
        assert_eq!(resolver.resolve(), PathBuf::from("/tmp/cg-cli-root"));
    }
}
