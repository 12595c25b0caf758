//! Configuration loading, validation, and management for Concord.
//!
//! Loads configuration from `~/.concord/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.concord/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Sync engine limits
    #[serde(default)]
    pub engine: EngineConfig,

    /// Which concept routes bypass the sync registry
    #[serde(default)]
    pub passthrough: PassthroughConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Prefix every concept route is mounted under, e.g. `/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_base_url() -> String {
    "/api".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            base_url: default_base_url(),
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scan rounds allowed before a request is failed as non-terminating
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Invocation records allowed in one request's log
    #[serde(default = "default_max_log_len")]
    pub max_log_len: usize,

    /// Wall-clock bound per request, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_rounds() -> u32 {
    32
}
fn default_max_log_len() -> usize {
    4096
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_log_len: default_max_log_len(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Passthrough policy for concept routes.
///
/// Routes are written without the base URL, e.g. `/UserAuth/register`.
/// Included routes call the concept directly and need a justification.
/// Excluded routes go through `Requesting.request` and the sync registry.
/// Routes in neither list are also routed through the registry but are
/// reported as unverified at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassthroughConfig {
    #[serde(default = "default_inclusions")]
    pub inclusions: BTreeMap<String, String>,

    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,
}

fn default_inclusions() -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert(
        "/UserAuth/register".into(),
        "public action - anyone can register".into(),
    );
    map
}

fn default_exclusions() -> Vec<String> {
    [
        "/UserAuth/login",
        "/UserAuth/_getUserByUsername",
        "/Sessioning/create",
        "/Sessioning/delete",
        "/Sessioning/_getUser",
        "/Profile/createProfile",
        "/Profile/updateName",
        "/Profile/deleteProfile",
        "/Profile/_getProfile",
        "/Profile/_getName",
        "/Relationship/createRelationship",
        "/Relationship/updateRelationship",
        "/Relationship/deleteRelationship",
        "/Relationship/_getRelationship",
        "/Relationship/_getRelationships",
        "/Relationship/_getRelationshipByName",
        "/Notes/createNote",
        "/Notes/updateNote",
        "/Notes/deleteNote",
        "/Notes/_getNote",
        "/Notes/_getNotes",
        "/Notes/_getNotesByRelationship",
        "/Notes/_getNoteByTitle",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl PassthroughConfig {
    pub fn is_included(&self, route: &str) -> bool {
        self.inclusions.contains_key(route)
    }

    pub fn is_excluded(&self, route: &str) -> bool {
        self.exclusions.iter().any(|r| r == route)
    }
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            inclusions: default_inclusions(),
            exclusions: default_exclusions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.concord/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `CONCORD_HOST`
    /// - `CONCORD_PORT`
    /// - `CONCORD_BASE_URL`
    /// - `CONCORD_MAX_ROUNDS`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = lookup("CONCORD_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("CONCORD_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("CONCORD_PORT is not a port number: {port}"))
            })?;
        }
        if let Some(base_url) = lookup("CONCORD_BASE_URL") {
            self.gateway.base_url = base_url;
        }
        if let Some(rounds) = lookup("CONCORD_MAX_ROUNDS") {
            self.engine.max_rounds = rounds.parse().map_err(|_| {
                ConfigError::ValidationError(format!("CONCORD_MAX_ROUNDS is not a number: {rounds}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".concord")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_rounds must be > 0".into(),
            ));
        }

        if self.engine.max_log_len == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_log_len must be > 0".into(),
            ));
        }

        if self.engine.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "engine.request_timeout_ms must be > 0".into(),
            ));
        }

        if !self.gateway.base_url.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "gateway.base_url must start with '/': {}",
                self.gateway.base_url
            )));
        }

        for (route, justification) in &self.passthrough.inclusions {
            if !route.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "passthrough route must start with '/': {route}"
                )));
            }
            if justification.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "passthrough inclusion {route} needs a justification"
                )));
            }
            if self.passthrough.is_excluded(route) {
                return Err(ConfigError::ValidationError(format!(
                    "route {route} is both included and excluded"
                )));
            }
        }

        Ok(())
    }

    /// The socket address string the gateway binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
