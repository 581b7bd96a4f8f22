// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Uploading Arrow IPC documents into the Arrow destination

use arrow::ipc::writer::StreamWriter;
use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type};
use arrow_array::{
    Array, ArrayRef, Float64Array, Int64Array, ListArray, RecordBatch, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use upload::{
    ArrowDestination, LimitConfig, Upload, UploadConfig, UploadError, Uploader, parse_config,
};
use votstream::{
    BuildError, BuilderRegistry, DbDatatype, DbType, LimitUnit, RawColumn, TableBuilder,
    TableSink, Value,
};

fn write_catalog(dir: &Path, name: &str, rows: i64) -> PathBuf {
    let schema = Arc::new(Schema::new(vec![
        Field::new("source_id", DataType::Int64, false),
        Field::new("flux", DataType::Float64, true).with_metadata(HashMap::from([(
            "unit".to_string(),
            "mJy".to_string(),
        )])),
        Field::new("band", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(0..rows)),
        Arc::new(Float64Array::from_iter_values((0..rows).map(|n| n as f64 / 10.0))),
        Arc::new(StringArray::from_iter_values((0..rows).map(|n| {
            if n % 2 == 0 { "g" } else { "r" }
        }))),
    ];
    let batch = RecordBatch::try_new(Arc::clone(&schema), columns).expect("valid batch");

    let path = dir.join(format!("{name}.arrows"));
    let file = std::fs::File::create(&path).expect("create fixture");
    let mut writer = StreamWriter::try_new(file, &schema).expect("IPC writer");
    writer.write(&batch).expect("write batch");
    writer.finish().expect("finish stream");
    path
}

#[test]
fn test_upload_two_tables() {
    let dir = tempfile::tempdir().expect("temp dir");
    let uploads = vec![
        Upload::file("bright", write_catalog(dir.path(), "bright", 3)),
        Upload::file("faint", write_catalog(dir.path(), "faint", 40)),
    ];

    let mut uploader =
        Uploader::new(&UploadConfig::default(), ArrowDestination::new()).expect("enabled");
    let schema = uploader.upload(&uploads).expect("upload succeeds");
    assert_eq!(schema.name(), "TAP_UPLOAD");
    assert_eq!(schema.tables().len(), 2);

    let faint = schema.table("faint").expect("faint registered").clone();
    assert_eq!(faint.rows, 40);
    assert!(faint.db_name.starts_with("faint_"));
    let types: Vec<DbType> = faint.columns.iter().map(|c| c.datatype).collect();
    assert_eq!(
        types,
        vec![
            DbType::new(DbDatatype::Bigint),
            DbType::new(DbDatatype::Double),
            DbType::new(DbDatatype::Varchar),
        ]
    );
    assert!(faint.columns.iter().all(|c| !c.principal && !c.indexed && !c.std));

    let (_, destination) = uploader.into_parts();
    let batch = destination.table(&faint.db_name).expect("faint stored");
    assert_eq!(batch.num_rows(), 40);
    assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(39), 39);
    assert_eq!(batch.column(1).as_primitive::<Float64Type>().value(5), 0.5);
    assert_eq!(batch.column(2).as_string::<i32>().value(1), "r");
}

#[test]
fn test_row_quota_names_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = UploadConfig {
        limit: LimitConfig {
            unit: LimitUnit::Rows,
            limit: Some(10),
        },
        ..UploadConfig::default()
    };
    let uploads = vec![
        Upload::file("small", write_catalog(dir.path(), "small", 10)),
        Upload::file("large", write_catalog(dir.path(), "large", 11)),
    ];

    let mut uploader = Uploader::new(&config, ArrowDestination::new()).expect("enabled");
    match uploader.upload(&uploads) {
        Err(UploadError::QuotaExceeded { table, unit, limit }) => {
            assert_eq!(table, "large");
            assert_eq!(unit, LimitUnit::Rows);
            assert_eq!(limit, 10);
        }
        other => panic!("expected a quota error, got {other:?}"),
    }

    // The first table made it in before the failure.
    assert_eq!(uploader.schema().tables().len(), 1);
    assert_eq!(uploader.destination().tables().count(), 1);
}

#[test]
fn test_byte_quota_from_yaml() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = parse_config("limit:\n  unit: bytes\n  limit: 64\n").expect("valid config");
    let uploads = vec![Upload::file("cat", write_catalog(dir.path(), "cat", 100))];

    let mut uploader = Uploader::new(&config, ArrowDestination::new()).expect("enabled");
    let err = uploader.upload(&uploads).expect_err("64 bytes is too small");
    assert!(matches!(err, UploadError::QuotaExceeded { unit: LimitUnit::Bytes, .. }));
    assert_eq!(err.table(), Some("cat"));
}

#[test]
fn test_unknown_format_names_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = UploadConfig {
        format: "votable".to_string(),
        ..UploadConfig::default()
    };
    let uploads = vec![Upload::file("cat", write_catalog(dir.path(), "cat", 1))];

    let mut uploader = Uploader::new(&config, ArrowDestination::new()).expect("enabled");
    let err = uploader.upload(&uploads).expect_err("format is not registered");
    assert!(matches!(err, UploadError::Setup { .. }));
    assert_eq!(err.table(), Some("cat"));
}

#[test]
fn test_list_column_stored_as_binary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let schema = Arc::new(Schema::new(vec![Field::new_list(
        "spectrum",
        Field::new_list_field(DataType::Float64, true),
        true,
    )]));
    let spectra: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Float64Type, _, _>(vec![
        Some(vec![Some(1.0), Some(0.5)]),
        None,
    ]));
    let batch = RecordBatch::try_new(Arc::clone(&schema), vec![spectra]).expect("valid batch");
    let path = dir.path().join("spectra.arrows");
    let file = std::fs::File::create(&path).expect("create fixture");
    let mut writer = StreamWriter::try_new(file, &schema).expect("IPC writer");
    writer.write(&batch).expect("write batch");
    writer.finish().expect("finish stream");

    let mut uploader =
        Uploader::new(&UploadConfig::default(), ArrowDestination::new()).expect("enabled");
    let table = uploader
        .upload(&[Upload::file("spectra", path)])
        .expect("upload succeeds")
        .tables()[0]
        .clone();
    assert_eq!(table.columns[0].datatype, DbType::new(DbDatatype::Varbinary));

    let (_, destination) = uploader.into_parts();
    let stored = destination.table(&table.db_name).expect("stored");
    let spectrum = stored.column(0).as_binary::<i32>();
    let mut expected = 1.0f64.to_be_bytes().to_vec();
    expected.extend_from_slice(&0.5f64.to_be_bytes());
    assert_eq!(spectrum.value(0), expected.as_slice());
    assert_eq!(spectrum.null_count(), 1);
}

#[test]
fn test_malformed_document_names_table() {
    // Continuation marker, then an 8 byte message that never arrives.
    let junk = vec![0xff, 0xff, 0xff, 0xff, 0x08, 0x00, 0x00, 0x00, 0x01];
    let uploads = vec![Upload::inline("junk", junk)];
    let mut uploader =
        Uploader::new(&UploadConfig::default(), ArrowDestination::new()).expect("enabled");
    let err = uploader.upload(&uploads).expect_err("junk is not an IPC stream");
    assert!(matches!(err, UploadError::Read { .. }));
    assert!(err.to_string().contains("\"junk\""));
}

/// Emits `rows` integers, pausing for `pause` before row `pause_before`
struct SlowBuilder {
    rows: i32,
    pause_before: i32,
    pause: Duration,
}

impl TableBuilder for SlowBuilder {
    fn name(&self) -> &str {
        "slow"
    }

    fn stream_table(
        &self,
        _input: Box<dyn Read + Send>,
        sink: &dyn TableSink,
    ) -> Result<(), BuildError> {
        for n in 0..self.rows {
            if n == self.pause_before {
                thread::sleep(self.pause);
            }
            if n == 0 {
                sink.accept_metadata(vec![RawColumn::new("n").datatype("int")])?;
            }
            sink.accept_row(vec![Value::Int(n)])?;
        }
        sink.end_rows()?;
        Ok(())
    }
}

fn slow_uploader(pause_before: i32) -> Uploader<ArrowDestination> {
    let config = UploadConfig {
        format: "slow".to_string(),
        wait_timeout_ms: Some(100),
        ..UploadConfig::default()
    };
    let mut registry = BuilderRegistry::new();
    registry.register(Arc::new(SlowBuilder {
        rows: 5,
        pause_before,
        pause: Duration::from_millis(400),
    }));
    Uploader::new(&config, ArrowDestination::new())
        .expect("enabled")
        .with_registry(registry)
}

#[test]
fn test_timed_out_table_is_not_registered() {
    let mut uploader = slow_uploader(2);
    let uploads = vec![Upload::inline("slow", Vec::new())];

    match uploader.upload(&uploads) {
        Err(UploadError::Interrupted { table, rows }) => {
            assert_eq!(table, "slow");
            assert_eq!(rows, 2);
        }
        other => panic!("expected an interrupted upload, got {other:?}"),
    }
    assert!(uploader.schema().tables().is_empty());
    assert_eq!(uploader.destination().tables().count(), 0);
}

#[test]
fn test_timeout_before_schema_is_an_error() {
    let mut uploader = slow_uploader(0);
    let uploads = vec![Upload::inline("slow", Vec::new())];

    let err = uploader.upload(&uploads).expect_err("no schema within the timeout");
    assert!(matches!(err, UploadError::Interrupted { rows: 0, .. }));
    assert_eq!(err.table(), Some("slow"));
    assert!(uploader.schema().tables().is_empty());
}

#[test]
fn test_slow_table_within_timeout() {
    let config = UploadConfig {
        format: "slow".to_string(),
        wait_timeout_ms: Some(2000),
        ..UploadConfig::default()
    };
    let mut registry = BuilderRegistry::new();
    registry.register(Arc::new(SlowBuilder {
        rows: 5,
        pause_before: 2,
        pause: Duration::from_millis(50),
    }));
    let mut uploader = Uploader::new(&config, ArrowDestination::new())
        .expect("enabled")
        .with_registry(registry);

    let schema = uploader
        .upload(&[Upload::inline("slow", Vec::new())])
        .expect("the pause fits the timeout");
    assert_eq!(schema.tables()[0].rows, 5);
}
