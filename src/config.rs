use log::{LevelFilter, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
}

/// Shell configuration, read from TOML. Every key is optional.
///
/// ```toml
/// [settings]
/// prompt = "aesh> "
/// abort_on_parse_errors = false
///
/// [logging]
/// level = "debug"
/// file = "/tmp/aesh.log"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShellConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub prompt: String,
    /// When set, a line with any parser error runs nothing.
    pub abort_on_parse_errors: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            abort_on_parse_errors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log to this file instead of the terminal.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::UnknownLevel(self.level.clone()))
    }
}

impl ShellConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration with resolution order:
    /// 1. `explicit`, which must exist
    /// 2. `~/.config/aesh/config.toml`, if present
    /// 3. built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match Self::user_config_path() {
            Some(path) if path.is_file() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `~/.config/aesh/config.toml`, when HOME is set.
    pub fn user_config_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/aesh/config.toml"))
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.logging.level_filter().is_err() {
            warn!(
                "{}: unknown log level '{}'",
                path.display(),
                config.logging.level
            );
        }
        Ok(config)
    }
}
