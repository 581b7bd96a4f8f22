// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result, anyhow};
use arrow::util::pretty::pretty_format_batches;
use diagnostics::*;
use upload::{ArrowDestination, Upload, UploadConfig, Uploader};
use votstream::LimitUnit;

/// Quota overrides given on the command line
#[derive(Debug, Clone, Default)]
pub struct LoadArgs {
    pub limit_unit: Option<LimitUnit>,
    pub limit: Option<u64>,
}

impl LoadArgs {
    /// `config` with the command-line quota applied over it
    fn apply(&self, config: &UploadConfig) -> UploadConfig {
        let mut config = config.clone();
        if let Some(unit) = self.limit_unit {
            config.limit.unit = unit;
        }
        if let Some(limit) = self.limit {
            config.limit.limit = Some(limit);
        }
        config
    }
}

/// Load command - uploads each document and prints the stored table
pub fn load_command<F>(
    config: &UploadConfig,
    uploads: &[Upload],
    args: &LoadArgs,
    mut handler: F,
) -> Result<()>
where
    F: FnMut(&str),
{
    let config = args.apply(config);
    if config.limit.unit != LimitUnit::None && config.limit.limit.is_none() {
        return Err(anyhow!("--limit is required with --limit-unit {}", config.limit.unit));
    }

    let quota = config.quota();
    let unit = quota.unit.as_str();
    let limit = quota.limit;
    debug!("load_command with quota {limit} {unit}", limit: limit, unit: unit);

    let mut uploader = Uploader::new(&config, ArrowDestination::new())?;
    _ = uploader.upload(uploads)?;

    let (schema, destination) = uploader.into_parts();
    for table in schema.tables() {
        let batch = destination
            .table(&table.db_name)
            .ok_or_else(|| anyhow!("Table {} missing from the destination", table.db_name))?;
        let pretty = pretty_format_batches(std::slice::from_ref(batch))
            .with_context(|| format!("Failed to format table {}", table.label))?;
        handler(&format!(
            "{} -> {}.{} ({} rows)\n{pretty}\n",
            table.label,
            schema.name(),
            table.db_name,
            table.rows
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quota_overrides_config() {
        let args = LoadArgs {
            limit_unit: Some(LimitUnit::Bytes),
            limit: Some(512),
        };
        let config = args.apply(&UploadConfig::default());
        assert_eq!(config.quota(), votstream::Quota::bytes(512));
    }

    #[test]
    fn test_unit_without_limit() {
        let args = LoadArgs {
            limit_unit: Some(LimitUnit::Rows),
            limit: None,
        };
        let err = load_command(&UploadConfig::default(), &[], &args, |_| {})
            .expect_err("limit is required");
        assert!(err.to_string().contains("--limit"));
    }
}
