// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! A [`TableIterator`] over rows already in memory

use crate::error::{DataError, Result};
use crate::iterator::{RowCursor, TableIterator};
use crate::metadata::TableMetadata;
use crate::types::DbType;
use crate::value::{Row, Value};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
pub struct MemoryTableIterator {
    metadata: Arc<TableMetadata>,
    rows: VecDeque<Row>,
    cursor: RowCursor,
}

impl MemoryTableIterator {
    #[must_use]
    pub fn new(metadata: TableMetadata, rows: Vec<Row>) -> Self {
        Self {
            metadata: Arc::new(metadata),
            rows: rows.into(),
            cursor: RowCursor::default(),
        }
    }
}

impl TableIterator for MemoryTableIterator {
    fn metadata(&mut self) -> Result<Arc<TableMetadata>> {
        Ok(Arc::clone(&self.metadata))
    }

    fn next_row(&mut self) -> Result<bool> {
        if self.cursor.is_ended() {
            return Ok(false);
        }
        self.cursor.start();

        match self.rows.pop_front() {
            Some(row) if row.len() != self.metadata.len() => {
                let found = row.len();
                self.close();
                Err(DataError::state(format!(
                    "row has {found} values, expected {}",
                    self.metadata.len()
                )))
            }
            Some(row) => {
                self.cursor.load(row);
                Ok(true)
            }
            None => {
                self.cursor.finish();
                Ok(false)
            }
        }
    }

    fn has_next_column(&self) -> Result<bool> {
        self.cursor.has_next(self.metadata.len())
    }

    fn next_column(&mut self) -> Result<Value> {
        self.cursor.next(self.metadata.len())
    }

    fn column_type(&self) -> Result<DbType> {
        self.cursor.column_type(&self.metadata)
    }

    fn row_byte_size(&self) -> u64 {
        self.cursor.row_size()
    }

    fn close(&mut self) {
        self.rows.clear();
        self.cursor.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDescriptor, RawColumn};

    #[test]
    fn test_reads_rows_in_order() {
        let metadata = TableMetadata::new(vec![
            ColumnDescriptor::from_raw(&RawColumn::new("name").datatype("char").arraysize("*"))
                .unwrap(),
        ]);
        let mut it = MemoryTableIterator::new(
            metadata,
            vec![vec![Value::from("vega")], vec![Value::from("deneb")]],
        );

        assert!(it.next_row().unwrap());
        assert_eq!(it.next_column().unwrap(), Value::from("vega"));
        assert!(it.next_row().unwrap());
        assert_eq!(it.next_column().unwrap(), Value::from("deneb"));
        assert!(!it.next_row().unwrap());
        assert!(!it.next_row().unwrap());
        assert!(matches!(it.next_column(), Err(DataError::State(_))));
    }

    #[test]
    fn test_close_ends_iteration() {
        let mut it = MemoryTableIterator::new(TableMetadata::default(), vec![vec![], vec![]]);
        assert!(it.next_row().unwrap());
        it.close();
        it.close();
        assert!(!it.next_row().unwrap());
    }
}
