// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Where uploaded rows end up

use crate::UploadError;
use crate::uploader::UploadedTable;
use arrow_array::builder::{
    BinaryBuilder, Float32Builder, Float64Builder, Int16Builder, Int32Builder, Int64Builder,
    StringBuilder,
};
use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use diagnostics::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use votstream::{ColumnDescriptor, DbType, TableIterator, TableMetadata, Value};

/// Receives each uploaded table once and persists its rows.
pub trait UploadDestination {
    /// Create `table` and drain `rows` into it. Returns the number of rows stored.
    fn add_uploaded_table(
        &mut self,
        table: &UploadedTable,
        rows: &mut dyn TableIterator,
    ) -> Result<u64, UploadError>;

    /// Forget a table stored by `add_uploaded_table` whose upload did not
    /// complete.
    fn discard_uploaded_table(&mut self, table: &UploadedTable);
}

impl<D: UploadDestination + ?Sized> UploadDestination for &mut D {
    fn add_uploaded_table(
        &mut self,
        table: &UploadedTable,
        rows: &mut dyn TableIterator,
    ) -> Result<u64, UploadError> {
        (**self).add_uploaded_table(table, rows)
    }

    fn discard_uploaded_table(&mut self, table: &UploadedTable) {
        (**self).discard_uploaded_table(table);
    }
}

/// Keeps every uploaded table as one Arrow [`RecordBatch`], keyed by its
/// database name.
#[derive(Debug, Default)]
pub struct ArrowDestination {
    tables: BTreeMap<String, RecordBatch>,
}

impl ArrowDestination {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn table(&self, db_name: &str) -> Option<&RecordBatch> {
        self.tables.get(db_name)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &RecordBatch)> {
        self.tables.iter().map(|(name, batch)| (name.as_str(), batch))
    }

    #[must_use]
    pub fn into_tables(self) -> BTreeMap<String, RecordBatch> {
        self.tables
    }
}

impl UploadDestination for ArrowDestination {
    fn add_uploaded_table(
        &mut self,
        table: &UploadedTable,
        rows: &mut dyn TableIterator,
    ) -> Result<u64, UploadError> {
        let label = table.label.as_str();
        if self.tables.contains_key(&table.db_name) {
            return Err(UploadError::load(label, format!("table {} already exists", table.db_name)));
        }

        let schema = table_schema(&table.columns);
        let mut builders: Vec<ColumnBuilder> = table
            .columns
            .iter()
            .map(|column| ColumnBuilder::new(column.datatype))
            .collect();

        let mut count: u64 = 0;
        while rows.next_row().map_err(|e| UploadError::reading(label, e))? {
            for (builder, column) in builders.iter_mut().zip(table.columns.iter()) {
                let value = rows
                    .next_column()
                    .map_err(|e| UploadError::reading(label, e))?;
                builder.append(value).map_err(|value| {
                    UploadError::load(
                        label,
                        format!(
                            "column \"{}\": cannot store \"{value}\" as {}",
                            column.name, column.datatype
                        ),
                    )
                })?;
            }
            count += 1;
        }

        let columns: Vec<ArrayRef> = builders.into_iter().map(ColumnBuilder::finish).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(count as usize));
        let batch = RecordBatch::try_new_with_options(schema, columns, &options)?;

        let db_name = table.db_name.as_str();
        debug!("stored {count} rows in {db_name}", count: count, db_name: db_name);
        _ = self.tables.insert(table.db_name.clone(), batch);
        Ok(count)
    }

    fn discard_uploaded_table(&mut self, table: &UploadedTable) {
        if self.tables.remove(&table.db_name).is_some() {
            let db_name = table.db_name.as_str();
            debug!("discarded {db_name}", db_name: db_name);
        }
    }
}

/// Arrow schema of a resolved table. Declared types and annotations are
/// kept as field metadata.
fn table_schema(metadata: &TableMetadata) -> SchemaRef {
    let fields: Vec<Field> = metadata.iter().map(arrow_field).collect();
    Arc::new(Schema::new(fields))
}

fn arrow_field(column: &ColumnDescriptor) -> Field {
    let mut annotations = HashMap::from([("dbtype".to_string(), column.datatype.to_string())]);
    let optional = [
        ("description", &column.description),
        ("unit", &column.unit),
        ("ucd", &column.ucd),
        ("utype", &column.utype),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            _ = annotations.insert(key.to_string(), value.clone());
        }
    }
    Field::new(&column.name, column.datatype.to_arrow(), true).with_metadata(annotations)
}

/// Arrow builder for one column, accepting [`Value`]s of compatible kinds
enum ColumnBuilder {
    Short(Int16Builder),
    Int(Int32Builder),
    Long(Int64Builder),
    Float(Float32Builder),
    Double(Float64Builder),
    Binary(BinaryBuilder),
    Text(StringBuilder),
}

impl ColumnBuilder {
    fn new(datatype: DbType) -> Self {
        match datatype.to_arrow() {
            DataType::Int16 => ColumnBuilder::Short(Int16Builder::new()),
            DataType::Int32 => ColumnBuilder::Int(Int32Builder::new()),
            DataType::Int64 => ColumnBuilder::Long(Int64Builder::new()),
            DataType::Float32 => ColumnBuilder::Float(Float32Builder::new()),
            DataType::Float64 => ColumnBuilder::Double(Float64Builder::new()),
            DataType::Binary => ColumnBuilder::Binary(BinaryBuilder::new()),
            _ => ColumnBuilder::Text(StringBuilder::new()),
        }
    }

    /// Append `value`, handing it back when it does not fit the column.
    fn append(&mut self, value: Value) -> Result<(), Value> {
        if value.is_null() {
            self.append_null();
            return Ok(());
        }

        match self {
            ColumnBuilder::Short(b) => {
                let v = value.as_i64().and_then(|v| i16::try_from(v).ok());
                b.append_value(v.ok_or(value)?);
            }
            ColumnBuilder::Int(b) => {
                let v = value.as_i64().and_then(|v| i32::try_from(v).ok());
                b.append_value(v.ok_or(value)?);
            }
            ColumnBuilder::Long(b) => b.append_value(value.as_i64().ok_or(value)?),
            ColumnBuilder::Float(b) => {
                let v = value.as_f64().ok_or(value)?;
                b.append_value(v as f32);
            }
            ColumnBuilder::Double(b) => b.append_value(value.as_f64().ok_or(value)?),
            ColumnBuilder::Binary(b) => match value {
                Value::Bytes(bytes) => b.append_value(bytes),
                Value::Text(text) => b.append_value(text.as_bytes()),
                other => b.append_value(other.to_be_bytes().ok_or(other)?),
            },
            ColumnBuilder::Text(b) => match value {
                Value::Text(text) => b.append_value(text),
                other => b.append_value(other.to_string()),
            },
        }
        Ok(())
    }

    fn append_null(&mut self) {
        match self {
            ColumnBuilder::Short(b) => b.append_null(),
            ColumnBuilder::Int(b) => b.append_null(),
            ColumnBuilder::Long(b) => b.append_null(),
            ColumnBuilder::Float(b) => b.append_null(),
            ColumnBuilder::Double(b) => b.append_null(),
            ColumnBuilder::Binary(b) => b.append_null(),
            ColumnBuilder::Text(b) => b.append_null(),
        }
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Short(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Int(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Long(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Float(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Double(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Binary(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Text(mut b) => Arc::new(b.finish()),
        }
    }
}
