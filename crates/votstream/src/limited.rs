// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Row and byte quotas on top of any [`TableIterator`]

use crate::error::{DataError, Result};
use crate::iterator::TableIterator;
use crate::metadata::TableMetadata;
use crate::types::DbType;
use crate::value::Value;
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// What a quota counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitUnit {
    /// No quota
    #[default]
    None,
    Rows,
    Bytes,
}

impl LimitUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LimitUnit::None => "none",
            LimitUnit::Rows => "rows",
            LimitUnit::Bytes => "bytes",
        }
    }
}

impl fmt::Display for LimitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LimitUnit::None),
            "rows" | "row" => Ok(LimitUnit::Rows),
            "bytes" | "byte" => Ok(LimitUnit::Bytes),
            other => Err(format!("unknown limit unit \"{other}\"")),
        }
    }
}

/// A ceiling on what may be read from one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub unit: LimitUnit,
    #[serde(default)]
    pub limit: u64,
}

impl Quota {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rows(limit: u64) -> Self {
        Self {
            unit: LimitUnit::Rows,
            limit,
        }
    }

    #[must_use]
    pub fn bytes(limit: u64) -> Self {
        Self {
            unit: LimitUnit::Bytes,
            limit,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.unit != LimitUnit::None
    }
}

/// Fails a table read as soon as more than the quota has been consumed.
///
/// The row that crosses the limit is never exposed: its `next_row` fails
/// with [`DataError::QuotaExceeded`], as does every later one.
#[derive(Debug)]
pub struct LimitedTableIterator<I> {
    inner: I,
    quota: Quota,
    consumed: u64,
    exceeded: bool,
}

impl<I: TableIterator> LimitedTableIterator<I> {
    pub fn new(inner: I, quota: Quota) -> Self {
        Self {
            inner,
            quota,
            consumed: 0,
            exceeded: false,
        }
    }

    /// Rows or bytes counted so far, in the quota's unit
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[must_use]
    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn into_inner(self) -> I {
        self.inner
    }

    fn exceeded_error(&self) -> DataError {
        DataError::QuotaExceeded {
            unit: self.quota.unit,
            limit: self.quota.limit,
        }
    }

    fn check_readable(&self) -> Result<()> {
        if self.exceeded {
            Err(DataError::state("data read limit exceeded"))
        } else {
            Ok(())
        }
    }
}

impl<I: TableIterator> TableIterator for LimitedTableIterator<I> {
    fn metadata(&mut self) -> Result<Arc<TableMetadata>> {
        self.inner.metadata()
    }

    fn next_row(&mut self) -> Result<bool> {
        if self.exceeded {
            return Err(self.exceeded_error());
        }
        if !self.inner.next_row()? {
            return Ok(false);
        }

        match self.quota.unit {
            LimitUnit::None => return Ok(true),
            LimitUnit::Rows => self.consumed = self.consumed.saturating_add(1),
            LimitUnit::Bytes => {
                self.consumed = self.consumed.saturating_add(self.inner.row_byte_size());
            }
        }

        if self.consumed > self.quota.limit {
            let limit = self.quota.limit;
            let unit = self.quota.unit.as_str();
            warn!("data read limit of {limit} {unit} exceeded", limit: limit, unit: unit);
            self.exceeded = true;
            return Err(self.exceeded_error());
        }
        Ok(true)
    }

    fn has_next_column(&self) -> Result<bool> {
        self.check_readable()?;
        self.inner.has_next_column()
    }

    fn next_column(&mut self) -> Result<Value> {
        self.check_readable()?;
        self.inner.next_column()
    }

    fn column_type(&self) -> Result<DbType> {
        self.check_readable()?;
        self.inner.column_type()
    }

    fn row_byte_size(&self) -> u64 {
        if self.exceeded {
            0
        } else {
            self.inner.row_byte_size()
        }
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
