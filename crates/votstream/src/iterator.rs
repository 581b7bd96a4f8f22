// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Row/column cursor over a table, and its streaming implementation
//!
//! [`StreamingTableIterator::start`] spawns one producer thread running a
//! [`TableBuilder`] against a fresh [`StreamSink`] and returns at once. The
//! caller then pulls rows at its own pace; the producer never runs more than
//! one row ahead.
//!
//! Shutdown is cooperative and best-effort: [`TableIterator::close`] cancels
//! the sink, and the producer leaves at its next callback. Nothing bounds how
//! long a parser that never calls back may keep its thread alive.

use crate::builder::{BuilderRegistry, TableBuilder, TableSink};
use crate::error::{BuildError, DataError, Result};
use crate::metadata::TableMetadata;
use crate::sink::{Fetch, StreamSink};
use crate::types::DbType;
use crate::value::{Row, Value, row_byte_size};
use diagnostics::*;
use std::io::Read;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const PRODUCER_THREAD: &str = "votstream-producer";

/// Sequential access to the rows and columns of a table.
///
/// Call order: [`next_row`](Self::next_row), then `next_column` until
/// `has_next_column` is false, then `next_row` again. Reading columns before
/// the first row or after the end is a [`DataError::State`].
pub trait TableIterator {
    /// Resolved column metadata
    fn metadata(&mut self) -> Result<Arc<TableMetadata>>;

    /// Advance to the next row. `false` once the table is exhausted (or the
    /// stream was cancelled), and forever after.
    fn next_row(&mut self) -> Result<bool>;

    fn has_next_column(&self) -> Result<bool>;

    /// Value of the next column of the current row
    fn next_column(&mut self) -> Result<Value>;

    /// Type of the column most recently returned by `next_column`
    fn column_type(&self) -> Result<DbType>;

    /// Serialized size of the current row, 0 when there is none
    fn row_byte_size(&self) -> u64;

    /// Stop iterating. Idempotent.
    fn close(&mut self);
}

impl<I: TableIterator + ?Sized> TableIterator for &mut I {
    fn metadata(&mut self) -> Result<Arc<TableMetadata>> {
        (**self).metadata()
    }

    fn next_row(&mut self) -> Result<bool> {
        (**self).next_row()
    }

    fn has_next_column(&self) -> Result<bool> {
        (**self).has_next_column()
    }

    fn next_column(&mut self) -> Result<Value> {
        (**self).next_column()
    }

    fn column_type(&self) -> Result<DbType> {
        (**self).column_type()
    }

    fn row_byte_size(&self) -> u64 {
        (**self).row_byte_size()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

impl<I: TableIterator + ?Sized> TableIterator for Box<I> {
    fn metadata(&mut self) -> Result<Arc<TableMetadata>> {
        (**self).metadata()
    }

    fn next_row(&mut self) -> Result<bool> {
        (**self).next_row()
    }

    fn has_next_column(&self) -> Result<bool> {
        (**self).has_next_column()
    }

    fn next_column(&mut self) -> Result<Value> {
        (**self).next_column()
    }

    fn column_type(&self) -> Result<DbType> {
        (**self).column_type()
    }

    fn row_byte_size(&self) -> u64 {
        (**self).row_byte_size()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Consumer-side cursor shared by the iterator implementations
#[derive(Debug, Default)]
pub(crate) struct RowCursor {
    started: bool,
    ended: bool,
    row: Row,
    column: usize,
    row_size: u64,
}

impl RowCursor {
    pub(crate) fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn start(&mut self) {
        self.started = true;
    }

    pub(crate) fn load(&mut self, row: Row) {
        self.row_size = row_byte_size(&row);
        self.row = row;
        self.column = 0;
    }

    pub(crate) fn finish(&mut self) {
        self.ended = true;
        self.row.clear();
        self.row_size = 0;
        self.column = 0;
    }

    pub(crate) fn row_size(&self) -> u64 {
        self.row_size
    }

    fn check_read_state(&self) -> Result<()> {
        if !self.started {
            Err(DataError::state("no row has yet been read"))
        } else if self.ended {
            Err(DataError::state("end of the table already reached"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn has_next(&self, columns: usize) -> Result<bool> {
        self.check_read_state()?;
        Ok(self.column < columns)
    }

    pub(crate) fn next(&mut self, columns: usize) -> Result<Value> {
        if !self.has_next(columns)? {
            return Err(DataError::no_such_element("no more field to read"));
        }
        let value = self
            .row
            .get_mut(self.column)
            .map(std::mem::take)
            .ok_or_else(|| DataError::no_such_element("row is shorter than its metadata"))?;
        self.column += 1;
        Ok(value)
    }

    pub(crate) fn column_type(&self, metadata: &TableMetadata) -> Result<DbType> {
        self.check_read_state()?;
        if self.column == 0 {
            return Err(DataError::state("no field has yet been read"));
        }
        metadata
            .get(self.column - 1)
            .map(|column| column.datatype)
            .ok_or_else(|| DataError::state("all fields have already been read"))
    }
}

/// Options for [`StreamingTableIterator::start`]
#[derive(Debug, Clone, Default)]
pub struct IteratorOptions {
    /// Upper bound on each consumer wait (metadata or row). `None` waits
    /// forever. An expired wait cancels the stream, which the consumer then
    /// observes as the end of the table.
    pub wait_timeout: Option<Duration>,
}

impl IteratorOptions {
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

/// How a streaming table stopped delivering rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The parser reported the end of the rows
    Exhausted,
    /// Cancelled, closed early, or a consumer wait timed out
    Cancelled,
}

/// Cancels a stream from any thread
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sink: Arc<StreamSink>,
}

impl CancelHandle {
    /// Release a consumer blocked in `next_row`; it then sees the end of the table.
    pub fn cancel(&self) {
        self.sink.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.sink.is_cancelled()
    }
}

/// [`TableIterator`] fed by a push parser running on its own thread
#[derive(Debug)]
pub struct StreamingTableIterator {
    sink: Arc<StreamSink>,
    producer: JoinHandle<()>,
    cursor: RowCursor,
    metadata: Option<Arc<TableMetadata>>,
    rows_read: u64,
    end_reason: Option<EndReason>,
}

impl StreamingTableIterator {
    /// Start parsing `input` with `builder` on a new producer thread.
    ///
    /// Returns as soon as the thread is running; only a failure to start
    /// the thread is reported here.
    pub fn start(
        input: Box<dyn Read + Send>,
        builder: Arc<dyn TableBuilder>,
        options: IteratorOptions,
    ) -> Result<Self> {
        let sink = Arc::new(StreamSink::with_wait_timeout(options.wait_timeout));
        let producer_sink = Arc::clone(&sink);
        let format = builder.name().to_string();

        let producer = std::thread::Builder::new()
            .name(format!("{PRODUCER_THREAD}-{format}"))
            .spawn(move || run_producer(builder.as_ref(), input, &producer_sink))
            .map_err(|e| DataError::Setup {
                message: format!("unable to start the {format} reader thread"),
                source: Some(e),
            })?;

        debug!("started {format_name} producer thread", format_name: format);

        Ok(Self {
            sink,
            producer,
            cursor: RowCursor::default(),
            metadata: None,
            rows_read: 0,
            end_reason: None,
        })
    }

    /// Start parsing `input` with the builder registered for `format`.
    pub fn open(
        format: &str,
        input: Box<dyn Read + Send>,
        registry: &BuilderRegistry,
        options: IteratorOptions,
    ) -> Result<Self> {
        let builder = registry.get(format)?;
        Self::start(input, builder, options)
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sink: Arc::clone(&self.sink),
        }
    }

    /// Whether the producer thread has exited
    #[must_use]
    pub fn producer_finished(&self) -> bool {
        self.producer.is_finished()
    }

    /// Number of rows fetched so far
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Why the rows stopped, once they have
    #[must_use]
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Whether the table ended by cancellation rather than by reaching its
    /// last row. A table cut short this way is incomplete.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.end_reason == Some(EndReason::Cancelled)
    }

    fn column_count(&self) -> usize {
        self.metadata.as_ref().map_or(0, |m| m.len())
    }
}

impl TableIterator for StreamingTableIterator {
    fn metadata(&mut self) -> Result<Arc<TableMetadata>> {
        if let Some(metadata) = &self.metadata {
            return Ok(Arc::clone(metadata));
        }
        // `None` only comes back once the stream is over, so caching the
        // empty metadata is safe.
        let metadata = match self.sink.metadata()? {
            Some(metadata) => metadata,
            None => {
                self.end_reason = Some(if self.sink.is_cancelled() {
                    EndReason::Cancelled
                } else {
                    EndReason::Exhausted
                });
                Arc::default()
            }
        };
        self.metadata = Some(Arc::clone(&metadata));
        Ok(metadata)
    }

    fn next_row(&mut self) -> Result<bool> {
        if self.cursor.is_ended() {
            return Ok(false);
        }

        if !self.cursor.is_started() {
            // Surfaces a schema failure here instead of reporting an empty table.
            _ = self.metadata()?;
            self.cursor.start();
        }

        match self.sink.fetch_row() {
            Ok(Fetch::Row(row)) => {
                let expected = self.column_count();
                if row.len() != expected {
                    let found = row.len();
                    self.close();
                    return Err(DataError::Parse(Arc::new(BuildError::format(format!(
                        "row {} has {found} values, expected {expected}",
                        self.rows_read + 1
                    )))));
                }
                self.rows_read += 1;
                self.cursor.load(row);
                Ok(true)
            }
            Ok(Fetch::EndOfStream) => {
                let rows = self.rows_read;
                debug!("end of table after {rows} rows", rows: rows);
                self.end_reason = Some(EndReason::Exhausted);
                self.cursor.finish();
                Ok(false)
            }
            Ok(Fetch::Cancelled) => {
                let rows = self.rows_read;
                debug!("table stream cancelled after {rows} rows", rows: rows);
                self.end_reason = Some(EndReason::Cancelled);
                self.cursor.finish();
                Ok(false)
            }
            Err(err) => {
                self.cursor.finish();
                Err(err)
            }
        }
    }

    fn has_next_column(&self) -> Result<bool> {
        self.cursor.has_next(self.column_count())
    }

    fn next_column(&mut self) -> Result<Value> {
        let columns = self.column_count();
        self.cursor.next(columns)
    }

    fn column_type(&self) -> Result<DbType> {
        match &self.metadata {
            Some(metadata) => self.cursor.column_type(metadata),
            None => self.cursor.column_type(&TableMetadata::default()),
        }
    }

    fn row_byte_size(&self) -> u64 {
        self.cursor.row_size()
    }

    fn close(&mut self) {
        if !self.cursor.is_ended() {
            self.cursor.finish();
        }
        if self.end_reason.is_none() {
            self.end_reason = Some(EndReason::Cancelled);
        }
        self.sink.cancel();
    }
}

impl Drop for StreamingTableIterator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Moves the stream to a terminal phase when the producer leaves, whether
/// the parser returned or panicked.
struct ProducerGuard<'a> {
    sink: &'a StreamSink,
}

impl Drop for ProducerGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.sink.fail(BuildError::format("table parser panicked"));
        } else {
            self.sink.finish();
        }
    }
}

fn run_producer(builder: &dyn TableBuilder, input: Box<dyn Read + Send>, sink: &StreamSink) {
    let _guard = ProducerGuard { sink };

    match builder.stream_table(input, sink) {
        Ok(()) => {
            debug!("producer thread finished");
        }
        Err(err) if err.is_aborted() || sink.is_cancelled() => {
            let reason = err.to_string();
            debug!("producer thread stopped: {reason}", reason: reason);
        }
        Err(err) => sink.fail(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDescriptor, RawColumn};

    fn metadata() -> TableMetadata {
        TableMetadata::new(vec![
            ColumnDescriptor::from_raw(&RawColumn::new("a").datatype("int")).unwrap(),
            ColumnDescriptor::from_raw(&RawColumn::new("b").datatype("char").arraysize("*"))
                .unwrap(),
        ])
    }

    #[test]
    fn test_cursor_state_errors() {
        let mut cursor = RowCursor::default();
        assert!(matches!(cursor.has_next(2), Err(DataError::State(_))));
        assert!(matches!(cursor.next(2), Err(DataError::State(_))));

        cursor.start();
        cursor.load(vec![Value::Int(1), Value::from("x")]);
        assert!(matches!(
            cursor.column_type(&metadata()),
            Err(DataError::State(msg)) if msg == "no field has yet been read"
        ));

        assert_eq!(cursor.next(2).unwrap(), Value::Int(1));
        assert_eq!(cursor.column_type(&metadata()).unwrap(), metadata()[0].datatype);
        assert_eq!(cursor.next(2).unwrap(), Value::from("x"));
        assert_eq!(cursor.column_type(&metadata()).unwrap(), metadata()[1].datatype);

        assert!(!cursor.has_next(2).unwrap());
        assert!(matches!(cursor.next(2), Err(DataError::NoSuchElement(_))));

        cursor.finish();
        assert!(matches!(cursor.has_next(2), Err(DataError::State(_))));
        assert!(matches!(cursor.column_type(&metadata()), Err(DataError::State(_))));
    }

    #[test]
    fn test_cursor_short_row() {
        let mut cursor = RowCursor::default();
        cursor.start();
        cursor.load(vec![Value::Int(1)]);
        _ = cursor.next(2).unwrap();
        assert!(matches!(cursor.next(2), Err(DataError::NoSuchElement(_))));
    }
}
