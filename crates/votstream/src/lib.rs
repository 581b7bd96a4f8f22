// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! votstream - pull-style, quota-aware reading of streamed tables
//!
//! A push parser ([`TableBuilder`]) runs on its own thread and reports a
//! table through a [`TableSink`]. [`StreamingTableIterator`] turns those
//! callbacks into a cursor the consumer drives one row at a time, holding at
//! most one row in flight. [`LimitedTableIterator`] caps how many rows or
//! bytes may be read from any [`TableIterator`].

pub mod builder;
pub mod error;
pub mod ipc;
pub mod iterator;
pub mod limited;
pub mod memory;
pub mod metadata;
pub mod sink;
pub mod types;
pub mod value;
pub mod votype;

pub use builder::{BuilderRegistry, TableBuilder, TableSink};
pub use error::{BuildError, DataError, Result, SchemaError, StreamAborted};
pub use ipc::{IPC_FORMAT, IpcTableBuilder};
pub use iterator::{
    CancelHandle, EndReason, IteratorOptions, StreamingTableIterator, TableIterator,
};
pub use limited::{LimitUnit, LimitedTableIterator, Quota};
pub use memory::MemoryTableIterator;
pub use metadata::{ColumnDescriptor, RawColumn, RawSchema, TableMetadata};
pub use sink::{Fetch, StreamSink};
pub use types::{DbDatatype, DbType};
pub use value::{Row, Value, row_byte_size};
pub use votype::{ArraySize, VotDatatype, VotType, resolve_vot_type};
