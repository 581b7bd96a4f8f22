// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Cell values carried from the parser to the consumer

use std::fmt;

/// One cell of a row. The core never interprets values; it only moves them
/// and measures them for byte quotas.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
}

/// A full row, one value per column
pub type Row = Vec<Value>;

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Number of bytes this value occupies once serialized
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Short(_) => 2,
            Value::Int(_) | Value::Float(_) => 4,
            Value::Long(_) | Value::Double(_) => 8,
            Value::Text(s) => s.len() as u64,
            Value::Bytes(b) => b.len() as u64,
            Value::Array(values) => values.iter().map(Value::byte_size).sum(),
        }
    }

    /// Big-endian binary form, as stored in VARBINARY columns. Array
    /// elements are concatenated. `None` when a null has to be encoded.
    #[must_use]
    pub fn to_be_bytes(&self) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(usize::try_from(self.byte_size()).unwrap_or(0));
        self.write_be_bytes(&mut out).then_some(out)
    }

    fn write_be_bytes(&self, out: &mut Vec<u8>) -> bool {
        match self {
            Value::Null => return false,
            Value::Boolean(v) => out.push(u8::from(*v)),
            Value::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Text(v) => out.extend_from_slice(v.as_bytes()),
            Value::Bytes(v) => out.extend_from_slice(v),
            Value::Array(values) => return values.iter().all(|v| v.write_be_bytes(out)),
        }
        true
    }

    /// Widen any integral value to `i64`
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Widen any numeric value to `f64`
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }
}

/// Serialized size of a whole row
#[must_use]
pub fn row_byte_size(row: &[Value]) -> u64 {
    row.iter().map(Value::byte_size).sum()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => {
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Array(values) => {
                let mut first = true;
                for value in values {
                    if !first {
                        f.write_str(" ")?;
                    }
                    first = false;
                    write!(f, "{value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_sizes() {
        let row: Row = vec![
            Value::Int(1),
            Value::Double(10.5),
            Value::Null,
            Value::from("vega"),
            Value::Array(vec![Value::Short(1), Value::Short(2)]),
        ];
        assert_eq!(row_byte_size(&row), 4 + 8 + 4 + 4);
    }

    #[test]
    fn test_big_endian_bytes() {
        let array = Value::Array(vec![Value::Short(1), Value::Double(-2.0)]);
        let bytes = array.to_be_bytes().expect("no nulls");
        assert_eq!(bytes.len() as u64, array.byte_size());
        assert_eq!(&bytes[..2], &[0x00, 0x01]);
        assert_eq!(&bytes[2..], &(-2.0f64).to_be_bytes());

        assert_eq!(Value::Array(vec![Value::Int(1), Value::Null]).to_be_bytes(), None);
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(Value::Short(-3).as_i64(), Some(-3));
        assert_eq!(Value::Boolean(true).as_i64(), Some(1));
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::from("1").as_f64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(None::<i32>).to_string(), "null");
        assert_eq!(Value::Bytes(vec![0xca, 0xfe]).to_string(), "cafe");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "1 2"
        );
    }
}
