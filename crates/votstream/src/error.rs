// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for table streaming

use crate::limited::LimitUnit;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised while converting declared column types into [`crate::DbType`]s.
///
/// Kept `Clone` because a schema failure is captured once on the producer
/// thread and may be reported to the consumer several times.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown field datatype: \"{datatype}\"")]
    UnknownType { datatype: String },

    #[error("multi-dimensional arrays are not supported (arraysize=\"{arraysize}\")")]
    MultiDimensional { arraysize: String },

    #[error("incorrect arraysize: \"{arraysize}\"")]
    BadArraySize { arraysize: String },

    #[error("column \"{column}\": {source}")]
    Column {
        column: String,
        #[source]
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    /// Attach the offending column name
    #[must_use]
    pub fn in_column(self, column: &str) -> Self {
        SchemaError::Column {
            column: column.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, without column context
    #[must_use]
    pub fn root(&self) -> &SchemaError {
        match self {
            SchemaError::Column { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Signal returned to a push parser when the consumer no longer wants rows.
///
/// A parser receiving it must stop calling back and unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("streaming aborted")]
pub struct StreamAborted;

/// Errors a push parser reports when it stops reading a document.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("malformed document: {0}")]
    Format(String),

    #[error(transparent)]
    Aborted(#[from] StreamAborted),
}

impl BuildError {
    pub fn format<S: Into<String>>(message: S) -> Self {
        BuildError::Format(message.into())
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, BuildError::Aborted(_))
    }
}

/// Errors surfaced to the consumer of a [`crate::TableIterator`].
///
/// Cancellation is deliberately absent: a cancelled stream is observed as
/// end-of-stream.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("unable to start reading the table: {message}")]
    Setup {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    State(String),

    #[error("{0}")]
    NoSuchElement(String),

    #[error("data read limit exceeded: at most {limit} {unit} may be read")]
    QuotaExceeded { unit: LimitUnit, limit: u64 },

    #[error("unable to parse the table: {0}")]
    Parse(#[source] Arc<BuildError>),
}

impl DataError {
    pub fn setup<S: Into<String>>(message: S) -> Self {
        DataError::Setup {
            message: message.into(),
            source: None,
        }
    }

    pub fn state<S: Into<String>>(message: S) -> Self {
        DataError::State(message.into())
    }

    pub fn no_such_element<S: Into<String>>(message: S) -> Self {
        DataError::NoSuchElement(message.into())
    }

    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, DataError::QuotaExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_column_and_type() {
        let err = SchemaError::UnknownType {
            datatype: "quaternion".to_string(),
        }
        .in_column("q");

        assert_eq!(
            err.to_string(),
            "column \"q\": unknown field datatype: \"quaternion\""
        );
        assert_eq!(
            err.root(),
            &SchemaError::UnknownType {
                datatype: "quaternion".to_string()
            }
        );
    }

    #[test]
    fn test_quota_message() {
        let err = DataError::QuotaExceeded {
            unit: LimitUnit::Rows,
            limit: 5,
        };
        assert!(err.is_quota_exceeded());
        assert_eq!(
            err.to_string(),
            "data read limit exceeded: at most 5 rows may be read"
        );
    }

    #[test]
    fn test_aborted_build_error() {
        let err: BuildError = StreamAborted.into();
        assert!(err.is_aborted());
        assert!(!BuildError::format("bad header").is_aborted());
    }
}
