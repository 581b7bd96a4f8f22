// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Internal column type vocabulary of the service

use arrow_schema::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar kind of a column as known by the destination store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DbDatatype {
    Smallint,
    Integer,
    Bigint,
    Real,
    Double,
    Binary,
    Varbinary,
    Char,
    Varchar,
    Blob,
    Clob,
    Timestamp,
    Point,
    Region,
    Unknown,
}

impl DbDatatype {
    /// Whether a length is meaningful for this kind
    #[must_use]
    pub fn has_length(self) -> bool {
        matches!(
            self,
            DbDatatype::Binary | DbDatatype::Varbinary | DbDatatype::Char | DbDatatype::Varchar
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DbDatatype::Smallint => "SMALLINT",
            DbDatatype::Integer => "INTEGER",
            DbDatatype::Bigint => "BIGINT",
            DbDatatype::Real => "REAL",
            DbDatatype::Double => "DOUBLE",
            DbDatatype::Binary => "BINARY",
            DbDatatype::Varbinary => "VARBINARY",
            DbDatatype::Char => "CHAR",
            DbDatatype::Varchar => "VARCHAR",
            DbDatatype::Blob => "BLOB",
            DbDatatype::Clob => "CLOB",
            DbDatatype::Timestamp => "TIMESTAMP",
            DbDatatype::Point => "POINT",
            DbDatatype::Region => "REGION",
            DbDatatype::Unknown => "UNKNOWN",
        }
    }
}

/// A column type: kind plus an optional length.
///
/// `length` is only set for kinds where [`DbDatatype::has_length`] holds.
/// For `CHAR`/`BINARY` it is the fixed length, for `VARCHAR`/`VARBINARY`
/// the upper bound; `None` on a variable kind means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbType {
    pub datatype: DbDatatype,
    pub length: Option<u32>,
}

impl DbType {
    #[must_use]
    pub fn new(datatype: DbDatatype) -> Self {
        Self {
            datatype,
            length: None,
        }
    }

    #[must_use]
    pub fn with_length(datatype: DbDatatype, length: u32) -> Self {
        if datatype.has_length() {
            Self {
                datatype,
                length: Some(length),
            }
        } else {
            Self::new(datatype)
        }
    }

    /// Unbounded text, the fallback for columns without a declared type
    #[must_use]
    pub fn unbounded_text() -> Self {
        Self::new(DbDatatype::Varchar)
    }

    /// Arrow type used when the column is materialized in a record batch.
    ///
    /// Geometries and timestamps stay textual: their values arrive as the
    /// serialized strings declared in the document.
    #[must_use]
    pub fn to_arrow(&self) -> DataType {
        match self.datatype {
            DbDatatype::Smallint => DataType::Int16,
            DbDatatype::Integer => DataType::Int32,
            DbDatatype::Bigint => DataType::Int64,
            DbDatatype::Real => DataType::Float32,
            DbDatatype::Double => DataType::Float64,
            DbDatatype::Binary | DbDatatype::Varbinary | DbDatatype::Blob => DataType::Binary,
            DbDatatype::Char
            | DbDatatype::Varchar
            | DbDatatype::Clob
            | DbDatatype::Point
            | DbDatatype::Region
            | DbDatatype::Timestamp
            | DbDatatype::Unknown => DataType::Utf8,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length {
            Some(length) => write!(f, "{}({})", self.datatype.name(), length),
            None => f.write_str(self.datatype.name()),
        }
    }
}
