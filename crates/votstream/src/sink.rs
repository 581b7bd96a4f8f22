// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Rendezvous between a push parser and a pull consumer
//!
//! [`StreamSink`] is the only state shared by the producer thread and the
//! consumer thread. Everything lives behind one mutex and one condition
//! variable:
//!
//! - a single-row slot (the producer waits while it is occupied, the
//!   consumer waits while it is empty);
//! - a one-shot metadata slot (ready, or the conversion failure);
//! - the stream phase: streaming, ended, cancelled, or failed. The last three
//!   are terminal and never revert to streaming.
//!
//! Cancellation releases every waiter. A consumer wait that exceeds the
//! optional wait timeout is handled like an interruption, which is the same
//! as a cancellation: the stream ends quietly, no error is raised.

use crate::builder::TableSink;
use crate::error::{BuildError, DataError, SchemaError, StreamAborted};
use crate::metadata::{RawSchema, TableMetadata};
use crate::value::Row;
use diagnostics::*;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
enum MetadataSlot {
    Pending,
    Ready(Arc<TableMetadata>),
    Failed(SchemaError),
}

#[derive(Debug)]
enum Phase {
    Streaming,
    Ended,
    Cancelled,
    Failed(Arc<BuildError>),
}

#[derive(Debug)]
struct SinkState {
    metadata: MetadataSlot,
    row: Option<Row>,
    phase: Phase,
}

impl SinkState {
    fn is_streaming(&self) -> bool {
        matches!(self.phase, Phase::Streaming)
    }

    fn metadata_pending(&self) -> bool {
        matches!(self.metadata, MetadataSlot::Pending)
    }
}

/// Outcome of a consumer-side row fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    Row(Row),
    EndOfStream,
    Cancelled,
}

/// Single-slot handoff between the producer and the consumer of a table
#[derive(Debug)]
pub struct StreamSink {
    state: Mutex<SinkState>,
    changed: Condvar,
    wait_timeout: Option<Duration>,
}

impl Default for StreamSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSink {
    /// A sink whose consumer waits are unbounded
    #[must_use]
    pub fn new() -> Self {
        Self::with_wait_timeout(None)
    }

    /// A sink whose consumer waits give up after `wait_timeout`.
    ///
    /// Producer waits are never bounded: a slow consumer is legitimate
    /// backpressure.
    #[must_use]
    pub fn with_wait_timeout(wait_timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(SinkState {
                metadata: MetadataSlot::Pending,
                row: None,
                phase: Phase::Streaming,
            }),
            changed: Condvar::new(),
            wait_timeout,
        }
    }

    // The state is a plain value that is never left half-updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block the consumer while `blocked` holds. The boolean is true when
    /// the wait timed out with the condition still holding.
    fn wait_consumer<'a, F>(
        &'a self,
        guard: MutexGuard<'a, SinkState>,
        blocked: F,
    ) -> (MutexGuard<'a, SinkState>, bool)
    where
        F: FnMut(&mut SinkState) -> bool,
    {
        match self.wait_timeout {
            None => (
                self.changed
                    .wait_while(guard, blocked)
                    .unwrap_or_else(PoisonError::into_inner),
                false,
            ),
            Some(timeout) => {
                let (guard, result) = self
                    .changed
                    .wait_timeout_while(guard, timeout, blocked)
                    .unwrap_or_else(PoisonError::into_inner);
                (guard, result.timed_out())
            }
        }
    }

    /// Treat an expired consumer wait like an interrupted thread: cancel.
    fn interrupt(&self, state: &mut SinkState, waiting_for: &str) {
        debug!("consumer wait for {waiting_for} timed out, cancelling the stream", waiting_for: waiting_for);
        if state.is_streaming() {
            state.phase = Phase::Cancelled;
        }
        state.row = None;
        self.changed.notify_all();
    }

    /// Cancel the stream. Idempotent.
    ///
    /// The producer is not stopped here; its next callback observes the
    /// cancellation and answers [`StreamAborted`].
    pub fn cancel(&self) {
        let mut state = self.lock();
        if state.is_streaming() {
            debug!("stream cancelled by the consumer");
            state.phase = Phase::Cancelled;
        }
        state.row = None;
        self.changed.notify_all();
    }

    /// Record a parser failure that was not caused by cancellation.
    pub fn fail(&self, error: BuildError) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let reason = error.to_string();
        match state.phase {
            Phase::Streaming => {
                error!("table parser failed: {reason}", reason: reason);
                state.phase = Phase::Failed(Arc::new(error));
            }
            Phase::Cancelled => {
                debug!("table parser stopped after cancellation: {reason}", reason: reason);
            }
            Phase::Ended | Phase::Failed(_) => {
                warn!("table parser failed after the end of the rows: {reason}", reason: reason);
            }
        }
        self.changed.notify_all();
    }

    /// Mark the rows as ended if the stream is still running.
    ///
    /// Used when a parser returns without calling `end_rows`.
    pub fn finish(&self) {
        let mut state = self.lock();
        if state.is_streaming() {
            debug!("table parser returned without ending the rows");
            state.phase = Phase::Ended;
        }
        self.changed.notify_all();
    }

    /// Whether the stream reached a terminal phase
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.lock().is_streaming()
    }

    /// Wait for the table metadata.
    ///
    /// `Ok(None)` means the stream ended, was cancelled, or the wait timed
    /// out before any metadata arrived.
    pub fn metadata(&self) -> Result<Option<Arc<TableMetadata>>, DataError> {
        let guard = self.lock();
        let (mut state, timed_out) =
            self.wait_consumer(guard, |s| s.metadata_pending() && s.is_streaming());

        if timed_out {
            self.interrupt(&mut state, "metadata");
            return Ok(None);
        }

        match &state.metadata {
            MetadataSlot::Ready(metadata) => Ok(Some(Arc::clone(metadata))),
            MetadataSlot::Failed(err) => Err(DataError::Schema(err.clone())),
            MetadataSlot::Pending => match &state.phase {
                Phase::Failed(err) => Err(DataError::Parse(Arc::clone(err))),
                _ => Ok(None),
            },
        }
    }

    /// Wait for the next row, freeing the slot for the producer.
    ///
    /// A row already in the slot is delivered before the end of the rows
    /// or a parser failure is reported; nothing is delivered once cancelled.
    pub fn fetch_row(&self) -> Result<Fetch, DataError> {
        let guard = self.lock();
        let (mut state, timed_out) =
            self.wait_consumer(guard, |s| s.row.is_none() && s.is_streaming());

        if timed_out {
            self.interrupt(&mut state, "a row");
            return Ok(Fetch::Cancelled);
        }

        if matches!(state.phase, Phase::Cancelled) {
            return Ok(Fetch::Cancelled);
        }

        if let Some(row) = state.row.take() {
            self.changed.notify_all();
            return Ok(Fetch::Row(row));
        }

        match &state.phase {
            Phase::Failed(err) => Err(DataError::Parse(Arc::clone(err))),
            _ => Ok(Fetch::EndOfStream),
        }
    }
}

impl TableSink for StreamSink {
    fn accept_metadata(&self, schema: RawSchema) -> Result<(), StreamAborted> {
        let converted = TableMetadata::from_raw(&schema);

        let mut state = self.lock();
        if matches!(state.phase, Phase::Cancelled) {
            return Err(StreamAborted);
        }
        if !state.metadata_pending() {
            warn!("table metadata reported twice, keeping the first");
            return Ok(());
        }

        state.metadata = match converted {
            Ok(metadata) => {
                let columns = metadata.len();
                debug!("table metadata resolved with {columns} columns", columns: columns);
                MetadataSlot::Ready(Arc::new(metadata))
            }
            Err(err) => {
                // Kept for the consumer; the parser keeps reading.
                let reason = err.to_string();
                debug!("table metadata rejected: {reason}", reason: reason);
                MetadataSlot::Failed(err)
            }
        };
        self.changed.notify_all();
        Ok(())
    }

    fn accept_row(&self, row: Row) -> Result<(), StreamAborted> {
        let guard = self.lock();
        let mut guard = self
            .changed
            .wait_while(guard, |s| s.row.is_some() && s.is_streaming())
            .unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;

        match state.phase {
            Phase::Streaming => {}
            Phase::Cancelled => return Err(StreamAborted),
            Phase::Ended | Phase::Failed(_) => {
                warn!("row received after the end of the rows");
                return Err(StreamAborted);
            }
        }

        if state.metadata_pending() {
            // The consumer resolves metadata before its first row; without
            // it both sides would wait on each other forever.
            state.phase = Phase::Failed(Arc::new(BuildError::format(
                "row received before the table metadata",
            )));
            self.changed.notify_all();
            return Err(StreamAborted);
        }

        if row.is_empty() {
            state.phase = Phase::Ended;
        } else {
            state.row = Some(row);
        }
        self.changed.notify_all();
        Ok(())
    }

    fn end_rows(&self) -> Result<(), StreamAborted> {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.phase {
            Phase::Streaming => state.phase = Phase::Ended,
            Phase::Cancelled => state.row = None,
            Phase::Ended | Phase::Failed(_) => {}
        }
        self.changed.notify_all();
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        matches!(self.lock().phase, Phase::Cancelled)
    }
}
