//! Defines an enum of all the possible values a logged column can have.

use enum_as_inner::EnumAsInner;

/// A single column value, borrowed from the host.
///
/// Integer and float widths are kept exactly as the host supplied them; the
/// on-disk serial type is chosen from the variant (see `serial_type`).
/// A 4-byte float is the one exception: it is widened to an 8-byte double
/// on disk, because the record format has no 4-byte float serial type.
#[derive(Debug, Clone, Copy, PartialEq, EnumAsInner)]
pub enum Value<'a> {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Real32(f32),
    Real64(f64),
    Blob(&'a [u8]),
    Text(&'a str),
}

impl<'a> Value<'a> {
    /// The value widened to i64, for integer variants.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl<'a> std::fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int8(x) => write!(f, "{}", x),
            Value::Int16(x) => write!(f, "{}", x),
            Value::Int32(x) => write!(f, "{}", x),
            Value::Int64(x) => write!(f, "{}", x),
            Value::Real32(x) => write!(f, "{}", x),
            Value::Real64(x) => write!(f, "{}", x),
            Value::Blob(_) => write!(f, "<BLOB>"),
            Value::Text(x) => write!(f, "{}", x),
        }
    }
}
