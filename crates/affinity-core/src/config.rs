// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Configuration management for the affinity tooling.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// How to reach the cluster control plane.
    pub cluster: ClusterConfig,
    /// External topology converter.
    pub converter: ConverterConfig,
    /// Scratch space for topology descriptors.
    pub workspace: WorkspaceConfig,
    /// Parameters of synthesized rules.
    pub rule: RuleConfig,
    /// Background service.
    pub service: ServiceConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::Error::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed.
    pub fn parse(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.rule.validate()?;
        Ok(config)
    }

    /// Load configuration from `path` when given, otherwise use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Control-plane client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Path or name of the `ceph` command line client.
    pub ceph_binary: PathBuf,
    /// Cluster configuration file passed as `--conf`.
    pub conf: Option<PathBuf>,
    /// Client entity passed as `--name`.
    pub client_name: String,
    /// Keyring passed as `--keyring`.
    pub keyring: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            ceph_binary: PathBuf::from("ceph"),
            conf: None,
            client_name: "client.admin".to_string(),
            keyring: None,
        }
    }
}

/// Topology converter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Path or name of the `crushtool` binary.
    pub crushtool_binary: PathBuf,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self { crushtool_binary: PathBuf::from("crushtool") }
    }
}

/// Scratch space configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory for temporary descriptor files (defaults to the OS temp dir).
    pub temp_dir: Option<PathBuf>,
}

impl WorkspaceConfig {
    /// Returns the directory temporary files are created in.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Parameters applied to every synthesized rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Minimum replica count the rule accepts.
    pub min_size: u32,
    /// Maximum replica count the rule accepts.
    pub max_size: u32,
    /// Bucket type each `chooseleaf` step selects.
    pub leaf_type: String,
    /// Appended to the pool name to form the rule name.
    pub name_suffix: String,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            leaf_type: "host".to_string(),
            name_suffix: "rule".to_string(),
        }
    }
}

impl RuleConfig {
    /// Replication bounds as `(min_size, max_size)`.
    #[must_use]
    pub const fn bounds(&self) -> (u32, u32) {
        (self.min_size, self.max_size)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.min_size == 0 || self.min_size > self.max_size {
            return Err(crate::Error::Config(format!(
                "rule bounds must satisfy 1 <= min_size <= max_size, got {}..{}",
                self.min_size, self.max_size
            )));
        }
        if self.leaf_type.trim().is_empty() {
            return Err(crate::Error::Config("rule.leaf_type must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Background service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Seconds the idle loop waits for a stop request per iteration.
    pub interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}
