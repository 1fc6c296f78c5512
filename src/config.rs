//! Bus-level configuration.
//!
//! Mirrors the convention of a YAML file (path
//! from an env var, defaulting to a well-known filename, skipped entirely
//! if absent) deserialized with `serde_yaml`, then overridden field-by-field
//! from environment variables. Scoped to what a `Bus` itself needs rather
//! than a whole server process. The primary `Bus::builder()` path takes
//! options programmatically and never requires a config file;
//! `BusConfig::load` is an alternate entry point for applications that
//! prefer file/env-driven bootstrap.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, ErrorKind, Result};

/// Environment variable naming the config file path. Defaults to
/// `busline.yaml` in the current directory.
pub const CONFIG_ENV_VAR: &str = "BUSLINE_CONFIG";
/// Default config file path used when `BUSLINE_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "busline.yaml";

/// Bus-wide defaults consulted by the publish/subscribe pipeline and
/// available to drivers that want them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Schema major version used when a type's `schema_version` is `0`.
    pub major_version: u32,
    /// Consumer group applied to subscribers that don't set their own.
    pub consumer_group: String,
    /// Gates the bus's own informational (`info!`-level) log chatter.
    /// Error/warn diagnostics are always emitted regardless of this flag.
    pub enable_logging: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            major_version: 1,
            consumer_group: String::new(),
            enable_logging: false,
        }
    }
}

impl BusConfig {
    /// Load configuration: defaults, then an optional YAML file (path from
    /// `BUSLINE_CONFIG`, default `busline.yaml`, skipped entirely if
    /// absent), then `BUSLINE_*` environment variable overrides.
    ///
    /// Priority (highest to lowest): environment variables, config file,
    /// defaults.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a YAML file, with no environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::new(ErrorKind::Transport, format!("reading config file '{path}'")).with_source(e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::new(ErrorKind::Transport, "parsing bus config").with_source(e))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(version) = std::env::var("BUSLINE_MAJOR_VERSION") {
            if let Ok(version) = version.parse() {
                self.major_version = version;
            }
        }
        if let Ok(group) = std::env::var("BUSLINE_CONSUMER_GROUP") {
            self.consumer_group = group;
        }
        if let Ok(enabled) = std::env::var("BUSLINE_ENABLE_LOGGING") {
            self.enable_logging = enabled.eq_ignore_ascii_case("true") || enabled == "1";
        }
    }
}
