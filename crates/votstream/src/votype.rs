// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Resolution of declared VOTable field types
//!
//! A document declares each field with a `datatype`, an optional `arraysize`
//! and an optional `xtype`. [`resolve_vot_type`] validates that triple and
//! [`VotType::to_db_type`] maps it onto the service's [`DbType`] vocabulary.

use crate::error::SchemaError;
use crate::types::{DbDatatype, DbType};
use std::fmt;
use std::str::FromStr;

/// Primitive datatypes a VOTable field may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VotDatatype {
    Boolean,
    Bit,
    UnsignedByte,
    Short,
    Int,
    Long,
    Char,
    UnicodeChar,
    Float,
    Double,
    FloatComplex,
    DoubleComplex,
}

impl VotDatatype {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            VotDatatype::Boolean => "boolean",
            VotDatatype::Bit => "bit",
            VotDatatype::UnsignedByte => "unsignedByte",
            VotDatatype::Short => "short",
            VotDatatype::Int => "int",
            VotDatatype::Long => "long",
            VotDatatype::Char => "char",
            VotDatatype::UnicodeChar => "unicodeChar",
            VotDatatype::Float => "float",
            VotDatatype::Double => "double",
            VotDatatype::FloatComplex => "floatComplex",
            VotDatatype::DoubleComplex => "doubleComplex",
        }
    }
}

impl FromStr for VotDatatype {
    type Err = SchemaError;

    /// Names are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let datatype = match s.trim().to_ascii_lowercase().as_str() {
            "boolean" => VotDatatype::Boolean,
            "bit" => VotDatatype::Bit,
            "unsignedbyte" => VotDatatype::UnsignedByte,
            "short" => VotDatatype::Short,
            "int" => VotDatatype::Int,
            "long" => VotDatatype::Long,
            "char" => VotDatatype::Char,
            "unicodechar" => VotDatatype::UnicodeChar,
            "float" => VotDatatype::Float,
            "double" => VotDatatype::Double,
            "floatcomplex" => VotDatatype::FloatComplex,
            "doublecomplex" => VotDatatype::DoubleComplex,
            _ => {
                return Err(SchemaError::UnknownType {
                    datatype: s.to_string(),
                });
            }
        };
        Ok(datatype)
    }
}

/// Parsed `arraysize` attribute (one dimension only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArraySize {
    Scalar,
    Fixed(u32),
    /// `*` when `None`, `n*` when bounded
    Variable(Option<u32>),
}

impl ArraySize {
    /// Parse an `arraysize` attribute; absent or blank means scalar.
    pub fn parse(arraysize: Option<&str>) -> Result<Self, SchemaError> {
        let Some(raw) = arraysize.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(ArraySize::Scalar);
        };

        if raw.contains('x') {
            return Err(SchemaError::MultiDimensional {
                arraysize: raw.to_string(),
            });
        }

        let bad = || SchemaError::BadArraySize {
            arraysize: raw.to_string(),
        };

        if raw == "*" {
            Ok(ArraySize::Variable(None))
        } else if let Some(bound) = raw.strip_suffix('*') {
            let bound = bound.parse::<u32>().map_err(|_| bad())?;
            Ok(ArraySize::Variable(Some(bound)))
        } else {
            let size = raw.parse::<u32>().map_err(|_| bad())?;
            Ok(ArraySize::Fixed(size))
        }
    }

    fn is_scalar(self) -> bool {
        matches!(self, ArraySize::Scalar | ArraySize::Fixed(1))
    }
}

impl fmt::Display for ArraySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySize::Scalar => Ok(()),
            ArraySize::Fixed(n) => write!(f, "{n}"),
            ArraySize::Variable(None) => f.write_str("*"),
            ArraySize::Variable(Some(n)) => write!(f, "{n}*"),
        }
    }
}

/// A validated VOTable field type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VotType {
    pub datatype: VotDatatype,
    pub arraysize: ArraySize,
    pub xtype: Option<String>,
}

impl VotType {
    pub fn new(datatype: VotDatatype, arraysize: ArraySize, xtype: Option<&str>) -> Self {
        Self {
            datatype,
            arraysize,
            xtype: xtype
                .map(str::trim)
                .filter(|x| !x.is_empty())
                .map(str::to_string),
        }
    }

    fn xtype_is(&self, names: &[&str]) -> bool {
        self.xtype.as_deref().is_some_and(|x| {
            let x = x.strip_prefix("adql:").unwrap_or(x);
            names.iter().any(|name| x.eq_ignore_ascii_case(name))
        })
    }

    /// Map onto the service's type vocabulary
    #[must_use]
    pub fn to_db_type(&self) -> DbType {
        match self.datatype {
            VotDatatype::Boolean | VotDatatype::Short => self.numeric(DbDatatype::Smallint),
            VotDatatype::Int => self.numeric(DbDatatype::Integer),
            VotDatatype::Long => self.numeric(DbDatatype::Bigint),
            VotDatatype::Float => self.numeric(DbDatatype::Real),
            VotDatatype::Double => self.numeric(DbDatatype::Double),

            VotDatatype::Bit | VotDatatype::UnsignedByte => {
                if self.xtype_is(&["blob"]) {
                    return DbType::new(DbDatatype::Blob);
                }
                match self.arraysize {
                    ArraySize::Scalar => DbType::new(DbDatatype::Smallint),
                    ArraySize::Fixed(n) => DbType::with_length(DbDatatype::Binary, n),
                    ArraySize::Variable(Some(n)) => DbType::with_length(DbDatatype::Varbinary, n),
                    ArraySize::Variable(None) => DbType::new(DbDatatype::Varbinary),
                }
            }

            VotDatatype::Char | VotDatatype::UnicodeChar => {
                if self.xtype_is(&["timestamp"]) {
                    DbType::new(DbDatatype::Timestamp)
                } else if self.xtype_is(&["point"]) {
                    DbType::new(DbDatatype::Point)
                } else if self.xtype_is(&["region", "circle", "polygon", "box"]) {
                    DbType::new(DbDatatype::Region)
                } else if self.xtype_is(&["clob"]) {
                    DbType::new(DbDatatype::Clob)
                } else {
                    match self.arraysize {
                        ArraySize::Scalar => DbType::with_length(DbDatatype::Char, 1),
                        ArraySize::Fixed(n) => DbType::with_length(DbDatatype::Char, n),
                        ArraySize::Variable(Some(n)) => {
                            DbType::with_length(DbDatatype::Varchar, n)
                        }
                        ArraySize::Variable(None) => DbType::new(DbDatatype::Varchar),
                    }
                }
            }

            VotDatatype::FloatComplex | VotDatatype::DoubleComplex => {
                DbType::new(DbDatatype::Unknown)
            }
        }
    }

    fn numeric(&self, scalar: DbDatatype) -> DbType {
        if self.arraysize.is_scalar() {
            DbType::new(scalar)
        } else {
            DbType::new(DbDatatype::Varbinary)
        }
    }
}

impl fmt::Display for VotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.datatype.name())?;
        if self.arraysize != ArraySize::Scalar {
            write!(f, "[{}]", self.arraysize)?;
        }
        if let Some(xtype) = &self.xtype {
            write!(f, " ({xtype})")?;
        }
        Ok(())
    }
}

/// Resolve a declared field type.
///
/// An absent or blank `datatype` resolves to unbounded text (`char[*]`) so
/// loosely typed documents stay loadable.
pub fn resolve_vot_type(
    datatype: Option<&str>,
    arraysize: Option<&str>,
    xtype: Option<&str>,
) -> Result<VotType, SchemaError> {
    let Some(declared) = datatype.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(VotType::new(
            VotDatatype::Char,
            ArraySize::Variable(None),
            None,
        ));
    };

    let datatype = declared.parse::<VotDatatype>()?;
    let arraysize = ArraySize::parse(arraysize)?;
    Ok(VotType::new(datatype, arraysize, xtype))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(datatype: &str, arraysize: Option<&str>, xtype: Option<&str>) -> DbType {
        resolve_vot_type(Some(datatype), arraysize, xtype)
            .unwrap()
            .to_db_type()
    }

    #[test]
    fn test_missing_datatype_is_unbounded_text() {
        let vot = resolve_vot_type(None, None, None).unwrap();
        assert_eq!(vot.to_db_type(), DbType::unbounded_text());

        let vot = resolve_vot_type(Some("   "), Some("12"), None).unwrap();
        assert_eq!(vot.to_db_type(), DbType::unbounded_text());
    }

    #[test]
    fn test_numeric_scalars() {
        assert_eq!(db("boolean", None, None), DbType::new(DbDatatype::Smallint));
        assert_eq!(db("short", None, None), DbType::new(DbDatatype::Smallint));
        assert_eq!(db("int", None, None), DbType::new(DbDatatype::Integer));
        assert_eq!(db("INT", None, None), DbType::new(DbDatatype::Integer));
        assert_eq!(db("long", None, None), DbType::new(DbDatatype::Bigint));
        assert_eq!(db("float", None, None), DbType::new(DbDatatype::Real));
        assert_eq!(db("double", Some("1"), None), DbType::new(DbDatatype::Double));
    }

    #[test]
    fn test_numeric_arrays_become_varbinary() {
        assert_eq!(db("double", Some("3"), None), DbType::new(DbDatatype::Varbinary));
        assert_eq!(db("int", Some("*"), None), DbType::new(DbDatatype::Varbinary));
    }

    #[test]
    fn test_character_types() {
        assert_eq!(db("char", None, None), DbType::with_length(DbDatatype::Char, 1));
        assert_eq!(db("char", Some("8"), None), DbType::with_length(DbDatatype::Char, 8));
        assert_eq!(
            db("unicodeChar", Some("16*"), None),
            DbType::with_length(DbDatatype::Varchar, 16)
        );
        assert_eq!(db("char", Some("*"), None), DbType::new(DbDatatype::Varchar));
    }

    #[test]
    fn test_xtypes() {
        assert_eq!(
            db("char", Some("*"), Some("timestamp")),
            DbType::new(DbDatatype::Timestamp)
        );
        assert_eq!(
            db("char", Some("*"), Some("adql:POINT")),
            DbType::new(DbDatatype::Point)
        );
        assert_eq!(
            db("char", Some("*"), Some("circle")),
            DbType::new(DbDatatype::Region)
        );
        assert_eq!(db("char", Some("*"), Some("clob")), DbType::new(DbDatatype::Clob));
        assert_eq!(
            db("unsignedByte", Some("*"), Some("adql:BLOB")),
            DbType::new(DbDatatype::Blob)
        );
    }

    #[test]
    fn test_binary_types() {
        assert_eq!(db("unsignedByte", None, None), DbType::new(DbDatatype::Smallint));
        assert_eq!(
            db("unsignedByte", Some("4"), None),
            DbType::with_length(DbDatatype::Binary, 4)
        );
        assert_eq!(
            db("bit", Some("8*"), None),
            DbType::with_length(DbDatatype::Varbinary, 8)
        );
    }

    #[test]
    fn test_complex_is_unknown() {
        assert_eq!(db("doubleComplex", None, None), DbType::new(DbDatatype::Unknown));
    }

    #[test]
    fn test_unknown_datatype() {
        let err = resolve_vot_type(Some("quaternion"), None, None).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownType {
                datatype: "quaternion".to_string()
            }
        );
    }

    #[test]
    fn test_bad_arraysize() {
        assert_eq!(
            resolve_vot_type(Some("double"), Some("3x3"), None).unwrap_err(),
            SchemaError::MultiDimensional {
                arraysize: "3x3".to_string()
            }
        );
        assert_eq!(
            resolve_vot_type(Some("char"), Some("ten"), None).unwrap_err(),
            SchemaError::BadArraySize {
                arraysize: "ten".to_string()
            }
        );
        assert_eq!(
            resolve_vot_type(Some("char"), Some("-2*"), None).unwrap_err(),
            SchemaError::BadArraySize {
                arraysize: "-2*".to_string()
            }
        );
    }

    #[test]
    fn test_display() {
        let vot = resolve_vot_type(Some("char"), Some("12*"), Some("timestamp")).unwrap();
        assert_eq!(vot.to_string(), "char[12*] (timestamp)");
    }
}
