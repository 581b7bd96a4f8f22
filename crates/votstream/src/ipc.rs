// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Push parser for Arrow IPC streams
//!
//! Each field's declared type is read from its metadata (`datatype`,
//! `arraysize`, `xtype`, plus the `description`, `unit`, `ucd` and `utype`
//! annotations). Fields without a declared `datatype` get one derived from
//! their Arrow type. List cells become [`Value::Array`]. Cells of Arrow
//! types with no matching [`Value`] are passed on as their display text.

use crate::builder::{TableBuilder, TableSink};
use crate::error::{BuildError, StreamAborted};
use crate::metadata::{RawColumn, RawSchema};
use crate::value::{Row, Value};
use arrow::ipc::reader::StreamReader;
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type, UInt16Type,
    UInt32Type,
};
use arrow_array::{Array, RecordBatch};
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use arrow_schema::{DataType, Field};
use diagnostics::*;
use std::io::Read;

/// Registry name of [`IpcTableBuilder`]
pub const IPC_FORMAT: &str = "arrow-ipc";

#[derive(Debug, Clone, Copy, Default)]
pub struct IpcTableBuilder;

impl TableBuilder for IpcTableBuilder {
    fn name(&self) -> &str {
        IPC_FORMAT
    }

    fn stream_table(
        &self,
        input: Box<dyn Read + Send>,
        sink: &dyn TableSink,
    ) -> Result<(), BuildError> {
        let reader = StreamReader::try_new(input, None)?;
        let schema = reader.schema();

        let raw: RawSchema = schema.fields().iter().map(|f| raw_column(f)).collect();
        let columns = raw.len();
        debug!("arrow IPC stream declares {columns} columns", columns: columns);
        sink.accept_metadata(raw)?;

        let mut rows: u64 = 0;
        for batch in reader {
            if sink.is_cancelled() {
                return Err(StreamAborted.into());
            }
            let batch = batch?;
            rows += push_batch(&batch, sink)?;
        }

        debug!("arrow IPC stream delivered {rows} rows", rows: rows);
        sink.end_rows()?;
        Ok(())
    }
}

/// Send every row of `batch` to the sink, returning how many were sent.
fn push_batch(batch: &RecordBatch, sink: &dyn TableSink) -> Result<u64, BuildError> {
    // A row without values would read as the end of the rows.
    if batch.num_columns() == 0 {
        return Ok(0);
    }

    let mut columns = batch
        .columns()
        .iter()
        .map(|array| column_values(array.as_ref()).map(Vec::into_iter))
        .collect::<Result<Vec<_>, _>>()?;

    for _ in 0..batch.num_rows() {
        let row: Row = columns
            .iter_mut()
            .map(|column| column.next().unwrap_or_default())
            .collect();
        sink.accept_row(row)?;
    }
    Ok(batch.num_rows() as u64)
}

fn column_values(array: &dyn Array) -> Result<Vec<Value>, BuildError> {
    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; array.len()],
        DataType::Boolean => array.as_boolean().iter().map(Value::from).collect(),
        DataType::Int8 => array
            .as_primitive::<Int8Type>()
            .iter()
            .map(|v| Value::from(v.map(i16::from)))
            .collect(),
        DataType::UInt8 => array
            .as_primitive::<UInt8Type>()
            .iter()
            .map(|v| Value::from(v.map(i16::from)))
            .collect(),
        DataType::Int16 => array
            .as_primitive::<Int16Type>()
            .iter()
            .map(Value::from)
            .collect(),
        DataType::UInt16 => array
            .as_primitive::<UInt16Type>()
            .iter()
            .map(|v| Value::from(v.map(i32::from)))
            .collect(),
        DataType::Int32 => array
            .as_primitive::<Int32Type>()
            .iter()
            .map(Value::from)
            .collect(),
        DataType::UInt32 => array
            .as_primitive::<UInt32Type>()
            .iter()
            .map(|v| Value::from(v.map(i64::from)))
            .collect(),
        DataType::Int64 => array
            .as_primitive::<Int64Type>()
            .iter()
            .map(Value::from)
            .collect(),
        DataType::Float32 => array
            .as_primitive::<Float32Type>()
            .iter()
            .map(Value::from)
            .collect(),
        DataType::Float64 => array
            .as_primitive::<Float64Type>()
            .iter()
            .map(Value::from)
            .collect(),
        DataType::Utf8 => array.as_string::<i32>().iter().map(Value::from).collect(),
        DataType::Binary => array
            .as_binary::<i32>()
            .iter()
            .map(|v| Value::from(v.map(<[u8]>::to_vec)))
            .collect(),
        DataType::List(_) => array
            .as_list::<i32>()
            .iter()
            .map(|entry| match entry {
                Some(items) => column_values(items.as_ref()).map(Value::Array),
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>, BuildError>>()?,
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array, &options)?;
            (0..array.len())
                .map(|i| {
                    if array.is_null(i) {
                        Value::Null
                    } else {
                        Value::Text(formatter.value(i).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(values)
}

/// VOTable-style declaration of a field, from its metadata or its Arrow type
fn raw_column(field: &Field) -> RawColumn {
    let metadata = field.metadata();
    let annotation = |key: &str| metadata.get(key).filter(|v| !v.trim().is_empty()).cloned();

    let mut column = RawColumn::new(field.name().as_str());
    match annotation("datatype") {
        Some(datatype) => {
            column.datatype = Some(datatype);
            column.arraysize = annotation("arraysize");
            column.xtype = annotation("xtype");
        }
        None => {
            if let Some((datatype, arraysize, xtype)) = derived_type(field.data_type()) {
                column.datatype = Some(datatype.to_string());
                column.arraysize = arraysize.map(str::to_string);
                column.xtype = xtype.map(str::to_string);
            }
        }
    }
    column.description = annotation("description");
    column.unit = annotation("unit");
    column.ucd = annotation("ucd");
    column.utype = annotation("utype");
    column
}

type Declared = (&'static str, Option<&'static str>, Option<&'static str>);

fn derived_type(data_type: &DataType) -> Option<Declared> {
    Some(match data_type {
        DataType::Boolean => ("boolean", None, None),
        DataType::Int8 | DataType::Int16 | DataType::UInt8 => ("short", None, None),
        DataType::Int32 | DataType::UInt16 => ("int", None, None),
        DataType::Int64 | DataType::UInt32 => ("long", None, None),
        DataType::Float32 => ("float", None, None),
        DataType::Float64 => ("double", None, None),
        DataType::Utf8 => ("char", Some("*"), None),
        DataType::Binary => ("unsignedByte", Some("*"), None),
        DataType::Timestamp(_, _) => ("char", Some("*"), Some("timestamp")),
        DataType::List(item) => match derived_type(item.data_type())? {
            (datatype, None, None) => (datatype, Some("*"), None),
            _ => return None,
        },
        _ => return None,
    })
}
