//! Configuration loading for kbase.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::item::Metadata;

/// Environment variable overriding the default config path.
pub const CONFIG_ENV: &str = "KBASE_CONFIG";

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub knowledge_bases: Vec<KnowledgeBaseConfig>,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Settings for search behavior.
#[derive(Debug, Deserialize)]
pub struct SearchConfig {
    /// Result count used when the caller does not ask for one.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Per-backend time budget inside fan-out search, in milliseconds.
    /// Unset means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_top_k() -> usize {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            timeout_ms: None,
        }
    }
}

/// Describes how to construct one backend instance.
///
/// Immutable after construction; used only at registration time.
/// `connection_info` keys are backend-specific and forwarded verbatim.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeBaseConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub backend_type: String,
    /// Disabled knowledge bases stay registered but are skipped by fan-out
    /// search.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub connection_info: Metadata,
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_enabled() -> bool {
    true
}

impl KnowledgeBaseConfig {
    /// Minimal config for the given name and backend type.
    #[must_use]
    pub fn new(name: impl Into<String>, backend_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            backend_type: backend_type.into(),
            enabled: true,
            connection_info: Metadata::new(),
            metadata: Metadata::new(),
        }
    }

    /// String-valued `connection_info` entry, if present.
    #[must_use]
    pub fn connection_str(&self, key: &str) -> Option<&str> {
        self.connection_info
            .get(key)
            .and_then(serde_json::Value::as_str)
    }
}

/// The closed set of backend kinds the manager can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Vector,
}

/// A `backend_type` string outside the supported set.
#[derive(Debug, thiserror::Error)]
#[error("unsupported backend type '{0}' (supported: vector)")]
pub struct UnsupportedBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnsupportedBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            other => Err(UnsupportedBackend(other.to_string())),
        }
    }
}

impl Config {
    /// Load config from `KBASE_CONFIG`, then ~/.config/kbase/config.toml,
    /// falling back to defaults when neither file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        if let Some(path) = Self::config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Config::default())
    }

    /// Load config from a specific path; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kbase").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Expand ~ to the user's home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(base_dirs) = BaseDirs::new() {
            return base_dirs.home_dir().join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
