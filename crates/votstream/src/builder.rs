// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Push-parser contract
//!
//! A [`TableBuilder`] reads a document and drives a [`TableSink`]:
//! `accept_metadata` at most once before any row, `accept_row` zero or more
//! times, then `end_rows` exactly once. Any callback may answer
//! [`StreamAborted`]; the builder must then stop calling back and return
//! (typically with [`BuildError::Aborted`]).

use crate::error::{BuildError, DataError, StreamAborted};
use crate::ipc::IpcTableBuilder;
use crate::metadata::RawSchema;
use crate::value::Row;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

/// Receiver of push-parser callbacks
pub trait TableSink: Sync {
    /// The document header. Called at most once, before any row.
    fn accept_metadata(&self, schema: RawSchema) -> Result<(), StreamAborted>;

    /// One row. May block until the consumer has taken the previous one.
    /// An empty row is treated as the end of the rows.
    fn accept_row(&self, row: Row) -> Result<(), StreamAborted>;

    /// No more rows will follow.
    fn end_rows(&self) -> Result<(), StreamAborted>;

    /// Cooperative parsers may poll this between callbacks.
    fn is_cancelled(&self) -> bool;
}

/// A push-style document parser
pub trait TableBuilder: Send + Sync {
    /// Format name this builder is registered under
    fn name(&self) -> &str;

    /// Parse `input`, reporting everything to `sink`. Runs on the producer thread.
    fn stream_table(
        &self,
        input: Box<dyn Read + Send>,
        sink: &dyn TableSink,
    ) -> Result<(), BuildError>;
}

/// Format name to builder lookup
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: BTreeMap<String, Arc<dyn TableBuilder>>,
}

impl BuilderRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the builders shipped in this crate
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(IpcTableBuilder));
        registry
    }

    /// Register a builder under its own name, replacing any previous one
    pub fn register(&mut self, builder: Arc<dyn TableBuilder>) {
        let name = builder.name().to_ascii_lowercase();
        _ = self.builders.insert(name, builder);
    }

    /// Look up a builder; an unknown format cannot even start reading.
    pub fn get(&self, format: &str) -> Result<Arc<dyn TableBuilder>, DataError> {
        self.builders
            .get(&format.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| DataError::setup(format!("no table builder for format \"{format}\"")))
    }

    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("formats", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}
