// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Column metadata, as declared by a document and as resolved for the service

use crate::error::SchemaError;
use crate::types::DbType;
use crate::votype::resolve_vot_type;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// A field exactly as a push parser reports it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    pub datatype: Option<String>,
    pub arraysize: Option<String>,
    pub xtype: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub utype: Option<String>,
}

impl RawColumn {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn datatype<S: Into<String>>(mut self, datatype: S) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    #[must_use]
    pub fn arraysize<S: Into<String>>(mut self, arraysize: S) -> Self {
        self.arraysize = Some(arraysize.into());
        self
    }

    #[must_use]
    pub fn xtype<S: Into<String>>(mut self, xtype: S) -> Self {
        self.xtype = Some(xtype.into());
        self
    }

    #[must_use]
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn ucd<S: Into<String>>(mut self, ucd: S) -> Self {
        self.ucd = Some(ucd.into());
        self
    }

    #[must_use]
    pub fn utype<S: Into<String>>(mut self, utype: S) -> Self {
        self.utype = Some(utype.into());
        self
    }
}

/// The header of a document: its fields, in order
pub type RawSchema = Vec<RawColumn>;

/// A resolved column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub datatype: DbType,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub utype: Option<String>,
    pub principal: bool,
    pub indexed: bool,
    pub std: bool,
}

impl ColumnDescriptor {
    /// Resolve a declared field. Ingested columns are never principal,
    /// indexed or standard.
    pub fn from_raw(raw: &RawColumn) -> Result<Self, SchemaError> {
        let vot = resolve_vot_type(
            raw.datatype.as_deref(),
            raw.arraysize.as_deref(),
            raw.xtype.as_deref(),
        )
        .map_err(|e| e.in_column(&raw.name))?;

        Ok(Self {
            name: raw.name.clone(),
            datatype: vot.to_db_type(),
            description: raw.description.clone(),
            unit: raw.unit.clone(),
            ucd: raw.ucd.clone(),
            utype: raw.utype.clone(),
            principal: false,
            indexed: false,
            std: false,
        })
    }
}

/// Ordered, immutable list of resolved columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    columns: Vec<ColumnDescriptor>,
}

impl TableMetadata {
    #[must_use]
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    /// Resolve every field of a raw schema; the first failure wins.
    pub fn from_raw(schema: &[RawColumn]) -> Result<Self, SchemaError> {
        let columns = schema
            .iter()
            .map(ColumnDescriptor::from_raw)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl Deref for TableMetadata {
    type Target = [ColumnDescriptor];

    fn deref(&self) -> &Self::Target {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DbDatatype;

    #[test]
    fn test_from_raw_keeps_order_and_annotations() {
        let schema = vec![
            RawColumn::new("id").datatype("int"),
            RawColumn::new("ra")
                .datatype("double")
                .unit("deg")
                .ucd("pos.eq.ra;meta.main"),
            RawColumn::new("name").datatype("char").arraysize("*"),
        ];

        let meta = TableMetadata::from_raw(&schema).unwrap();
        assert_eq!(meta.len(), 3);
        assert_eq!(meta[0].name, "id");
        assert_eq!(meta[0].datatype, DbType::new(DbDatatype::Integer));
        assert_eq!(meta[1].unit.as_deref(), Some("deg"));
        assert_eq!(meta[1].ucd.as_deref(), Some("pos.eq.ra;meta.main"));
        assert_eq!(meta[2].datatype, DbType::new(DbDatatype::Varchar));

        assert!(meta.iter().all(|c| !c.principal && !c.indexed && !c.std));
        assert_eq!(meta.column("ra").map(|c| c.datatype.datatype), Some(DbDatatype::Double));
    }

    #[test]
    fn test_from_raw_reports_offending_column() {
        let schema = vec![
            RawColumn::new("id").datatype("int"),
            RawColumn::new("flux").datatype("float128"),
        ];

        let err = TableMetadata::from_raw(&schema).unwrap_err();
        assert_eq!(
            err.to_string(),
            "column \"flux\": unknown field datatype: \"float128\""
        );
    }
}
