// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use votstream::{IPC_FORMAT, IteratorOptions, LimitUnit, Quota};

/// Upload settings of the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Name of the table builder used to parse uploads
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub limit: LimitConfig,

    /// Longest time a reader waits for the parser before giving up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_ms: Option<u64>,
}

/// Per-table read limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitConfig {
    #[serde(default)]
    pub unit: LimitUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

fn default_format() -> String {
    IPC_FORMAT.to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            format: default_format(),
            limit: LimitConfig::default(),
            wait_timeout_ms: None,
        }
    }
}

impl UploadConfig {
    /// The effective quota. A zero limit disables it.
    #[must_use]
    pub fn quota(&self) -> Quota {
        match (self.limit.unit, self.limit.limit) {
            (LimitUnit::None, _) | (_, None | Some(0)) => Quota::none(),
            (unit, Some(limit)) => Quota { unit, limit },
        }
    }

    #[must_use]
    pub fn iterator_options(&self) -> IteratorOptions {
        IteratorOptions {
            wait_timeout: self.wait_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Load configuration from YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<UploadConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    parse_config(&content)
}

/// Parse and validate a YAML configuration
pub fn parse_config(content: &str) -> Result<UploadConfig> {
    let config: UploadConfig = serde_yaml_ng::from_str(content)
        .with_context(|| "Failed to parse YAML configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub(crate) fn validate_config(config: &UploadConfig) -> Result<()> {
    if config.format.trim().is_empty() {
        anyhow::bail!("format cannot be empty");
    }

    if config.limit.unit != LimitUnit::None && config.limit.limit.is_none() {
        anyhow::bail!(
            "limit.limit is required when limit.unit is {}",
            config.limit.unit
        );
    }

    if config.wait_timeout_ms == Some(0) {
        anyhow::bail!("wait_timeout_ms must be greater than 0");
    }

    Ok(())
}
