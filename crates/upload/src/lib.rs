// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Upload - ingestion of user-supplied tables
//!
//! An [`Uploader`] opens every uploaded document, streams it through a
//! quota-limited [`votstream::StreamingTableIterator`], records the table in
//! the upload schema and hands its rows to an [`UploadDestination`].

use thiserror::Error;
use votstream::{DataError, LimitUnit};

mod config;
mod destination;
mod uploader;

pub use config::{LimitConfig, UploadConfig, load_config, parse_config};
pub use destination::{ArrowDestination, UploadDestination};
pub use uploader::{UPLOAD_SCHEMA, Upload, UploadSchema, UploadSource, UploadedTable, Uploader};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload aborted: this functionality is disabled")]
    Disabled,

    #[error("incorrect upload schema: its name must be \"TAP_UPLOAD\", not \"{name}\"")]
    BadUploadSchema { name: String },

    #[error("unable to start reading the upload \"{table}\": {source}")]
    Setup {
        table: String,
        #[source]
        source: DataError,
    },

    #[error("IO error while opening the upload \"{table}\": {source}")]
    Open {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upload \"{table}\" exceeds the data read limit of {limit} {unit}")]
    QuotaExceeded {
        table: String,
        unit: LimitUnit,
        limit: u64,
    },

    #[error("error while reading the upload \"{table}\": {source}")]
    Read {
        table: String,
        #[source]
        source: DataError,
    },

    #[error("upload \"{table}\" was interrupted after {rows} rows")]
    Interrupted { table: String, rows: u64 },

    #[error("unable to load the upload \"{table}\": {message}")]
    Load { table: String, message: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl UploadError {
    /// Attach the uploaded table's label to a read failure
    pub fn reading(table: &str, err: DataError) -> Self {
        let table = table.to_string();
        match err {
            DataError::QuotaExceeded { unit, limit } => {
                UploadError::QuotaExceeded { table, unit, limit }
            }
            source @ DataError::Setup { .. } => UploadError::Setup { table, source },
            source => UploadError::Read { table, source },
        }
    }

    pub fn load<S: Into<String>>(table: &str, message: S) -> Self {
        UploadError::Load {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// Label of the uploaded table the error is about, if any
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            UploadError::Setup { table, .. }
            | UploadError::Open { table, .. }
            | UploadError::QuotaExceeded { table, .. }
            | UploadError::Read { table, .. }
            | UploadError::Interrupted { table, .. }
            | UploadError::Load { table, .. } => Some(table),
            UploadError::Disabled | UploadError::BadUploadSchema { .. } | UploadError::Arrow(_) => {
                None
            }
        }
    }
}
