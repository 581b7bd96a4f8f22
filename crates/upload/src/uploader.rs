// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::UploadError;
use crate::config::UploadConfig;
use crate::destination::UploadDestination;
use diagnostics::*;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use votstream::{
    BuilderRegistry, IteratorOptions, LimitedTableIterator, Quota, StreamingTableIterator,
    TableIterator, TableMetadata,
};

/// Name every upload schema must carry
pub const UPLOAD_SCHEMA: &str = "TAP_UPLOAD";

/// A table received from a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedTable {
    /// Name the user refers to the table by
    pub label: String,
    /// Unique name in the destination
    pub db_name: String,
    pub columns: Arc<TableMetadata>,
    /// Rows stored, once loaded
    pub rows: u64,
}

impl UploadedTable {
    pub fn new<S: Into<String>>(label: S, columns: Arc<TableMetadata>) -> Self {
        let label = label.into();
        let db_name = format!("{}_{}", label, chrono::Utc::now().timestamp_millis());
        Self {
            label,
            db_name,
            columns,
            rows: 0,
        }
    }
}

/// Schema grouping the tables of one upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSchema {
    name: String,
    description: String,
    tables: Vec<UploadedTable>,
}

impl Default for UploadSchema {
    fn default() -> Self {
        Self {
            name: UPLOAD_SCHEMA.to_string(),
            description: "Schema for tables uploaded by users.".to_string(),
            tables: Vec::new(),
        }
    }
}

impl UploadSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema with a caller-chosen spelling of [`UPLOAD_SCHEMA`]
    pub fn named<S: Into<String>>(name: S, description: S) -> Result<Self, UploadError> {
        let name = name.into();
        if !name.eq_ignore_ascii_case(UPLOAD_SCHEMA) {
            return Err(UploadError::BadUploadSchema { name });
        }
        Ok(Self {
            name,
            description: description.into(),
            tables: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn tables(&self) -> &[UploadedTable] {
        &self.tables
    }

    #[must_use]
    pub fn table(&self, label: &str) -> Option<&UploadedTable> {
        self.tables.iter().find(|t| t.label == label)
    }
}

/// Where the bytes of an upload come from
#[derive(Debug, Clone)]
pub enum UploadSource {
    File(PathBuf),
    Inline(Vec<u8>),
}

/// One uploaded document and the label it is known by
#[derive(Debug, Clone)]
pub struct Upload {
    pub label: String,
    pub source: UploadSource,
}

impl Upload {
    pub fn file<S: Into<String>, P: Into<PathBuf>>(label: S, path: P) -> Self {
        Self {
            label: label.into(),
            source: UploadSource::File(path.into()),
        }
    }

    pub fn inline<S: Into<String>>(label: S, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            source: UploadSource::Inline(bytes),
        }
    }

    /// Parse a `label=path` command-line argument
    pub fn parse_arg(arg: &str) -> Result<Self, String> {
        match arg.split_once('=') {
            Some((label, path)) if !label.trim().is_empty() && !path.is_empty() => {
                Ok(Self::file(label.trim(), path))
            }
            _ => Err(format!("expected LABEL=PATH, got \"{arg}\"")),
        }
    }

    /// Open the document for reading
    pub fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(match &self.source {
            UploadSource::File(path) => Box::new(BufReader::new(File::open(path)?)),
            UploadSource::Inline(bytes) => Box::new(Cursor::new(bytes.clone())),
        })
    }
}

/// Loads uploaded tables into a destination, one after the other.
///
/// Each table is read through a quota-limited stream; the first failure
/// stops the upload and names the table it happened on.
#[derive(Debug)]
pub struct Uploader<D> {
    destination: D,
    schema: UploadSchema,
    registry: BuilderRegistry,
    format: String,
    quota: Quota,
    options: IteratorOptions,
}

impl<D: UploadDestination> Uploader<D> {
    pub fn new(config: &UploadConfig, destination: D) -> Result<Self, UploadError> {
        Self::with_schema(config, destination, UploadSchema::new())
    }

    pub fn with_schema(
        config: &UploadConfig,
        destination: D,
        schema: UploadSchema,
    ) -> Result<Self, UploadError> {
        if !config.enabled {
            return Err(UploadError::Disabled);
        }
        if !schema.name.eq_ignore_ascii_case(UPLOAD_SCHEMA) {
            return Err(UploadError::BadUploadSchema { name: schema.name });
        }

        Ok(Self {
            destination,
            schema,
            registry: BuilderRegistry::with_defaults(),
            format: config.format.clone(),
            quota: config.quota(),
            options: config.iterator_options(),
        })
    }

    /// Use `registry` to find the table builder
    #[must_use]
    pub fn with_registry(mut self, registry: BuilderRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn quota(&self) -> Quota {
        self.quota
    }

    #[must_use]
    pub fn schema(&self) -> &UploadSchema {
        &self.schema
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn into_parts(self) -> (UploadSchema, D) {
        (self.schema, self.destination)
    }

    /// Load every upload, in order.
    pub fn upload(&mut self, uploads: &[Upload]) -> Result<&UploadSchema, UploadError> {
        for upload in uploads {
            let table = self.upload_one(upload)?;
            self.schema.tables.push(table);
        }
        Ok(&self.schema)
    }

    fn upload_one(&mut self, upload: &Upload) -> Result<UploadedTable, UploadError> {
        let label = upload.label.as_str();
        let input = upload.open().map_err(|source| UploadError::Open {
            table: label.to_string(),
            source,
        })?;

        let stream = StreamingTableIterator::open(
            &self.format,
            input,
            &self.registry,
            self.options.clone(),
        )
        .map_err(|e| UploadError::reading(label, e))?;
        let mut rows = LimitedTableIterator::new(stream, self.quota);

        let columns = rows
            .metadata()
            .map_err(|e| UploadError::reading(label, e))?;
        let mut table = UploadedTable::new(label, columns);
        let db_name = table.db_name.as_str();
        let column_count = table.columns.len();
        info!(
            "uploading {label} into {db_name} with {column_count} columns",
            label: label,
            db_name: db_name,
            column_count: column_count
        );

        let loaded = self.destination.add_uploaded_table(&table, &mut rows);
        let cancelled = rows.get_ref().was_cancelled();
        rows.close();
        table.rows = loaded?;

        if cancelled {
            self.destination.discard_uploaded_table(&table);
            let count = table.rows;
            warn!(
                "upload of {label} interrupted after {count} rows",
                label: label,
                count: count
            );
            return Err(UploadError::Interrupted {
                table: label.to_string(),
                rows: count,
            });
        }

        let count = table.rows;
        info!("uploaded {count} rows for {label}", count: count, label: label);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::ArrowDestination;

    #[test]
    fn test_disabled_uploads() {
        let config = UploadConfig {
            enabled: false,
            ..UploadConfig::default()
        };
        assert!(matches!(
            Uploader::new(&config, ArrowDestination::new()),
            Err(UploadError::Disabled)
        ));
    }

    #[test]
    fn test_upload_schema_name() {
        assert!(UploadSchema::named("tap_upload", "mine").is_ok());
        match UploadSchema::named("uploads", "mine") {
            Err(UploadError::BadUploadSchema { name }) => assert_eq!(name, "uploads"),
            other => panic!("expected a bad schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_db_name_is_label_and_millis() {
        let table = UploadedTable::new("stars", Arc::new(TableMetadata::default()));
        let suffix = table
            .db_name
            .strip_prefix("stars_")
            .expect("label prefix");
        assert!(suffix.parse::<i64>().is_ok());
    }

    #[test]
    fn test_parse_arg() {
        let upload = Upload::parse_arg("stars=/tmp/stars.arrows").expect("valid argument");
        assert_eq!(upload.label, "stars");
        assert!(matches!(upload.source, UploadSource::File(ref p) if p.ends_with("stars.arrows")));
        assert!(Upload::parse_arg("stars").is_err());
        assert!(Upload::parse_arg("=x").is_err());
    }

    #[test]
    fn test_missing_file_names_table() {
        let mut uploader =
            Uploader::new(&UploadConfig::default(), ArrowDestination::new()).expect("enabled");
        let err = uploader
            .upload(&[Upload::file("ghost", "/nonexistent/ghost.arrows")])
            .expect_err("file does not exist");
        assert!(matches!(err, UploadError::Open { .. }));
        assert_eq!(err.table(), Some("ghost"));
    }
}
