//! Heterogeneous scalar values and object rows.

use std::collections::BTreeMap;
use std::fmt;

/// A single scalar value of an object field.
///
/// This is the dynamic value type flowing in and out of an
/// [`ObjectColumn`](crate::object::ObjectColumn): typed paths accept only
/// the scalar kind they were declared with, dynamic paths and shared data
/// accept any of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

impl Scalar {
    /// Returns `true` if this is the null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Returns the kind of a non-null scalar, or `None` for null.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(ScalarKind::Bool),
            Scalar::Int(_) => Some(ScalarKind::Int64),
            Scalar::UInt(_) => Some(ScalarKind::UInt64),
            Scalar::Float(_) => Some(ScalarKind::Float64),
            Scalar::String(_) => Some(ScalarKind::String),
            Scalar::Binary(_) => Some(ScalarKind::Binary),
        }
    }
}

/// The declared kind of a scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarKind {
    Bool,
    Int64,
    UInt64,
    Float64,
    String,
    Binary,
}

impl ScalarKind {
    /// Returns the fixed element size in bytes, or `None` for
    /// variable-length kinds.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            ScalarKind::Bool => Some(1),
            ScalarKind::Int64 | ScalarKind::UInt64 | ScalarKind::Float64 => Some(8),
            ScalarKind::String | ScalarKind::Binary => None,
        }
    }

    /// Returns `true` for kinds whose values need offsets.
    pub fn requires_offsets(&self) -> bool {
        self.fixed_size().is_none()
    }

    /// Returns the wire tag of this kind, used by the column blob format.
    pub(crate) fn to_tag(self) -> u8 {
        match self {
            ScalarKind::Bool => 1,
            ScalarKind::Int64 => 2,
            ScalarKind::UInt64 => 3,
            ScalarKind::Float64 => 4,
            ScalarKind::String => 5,
            ScalarKind::Binary => 6,
        }
    }

    /// Resolves a wire tag back to a kind.
    pub(crate) fn from_tag(tag: u8) -> Option<ScalarKind> {
        match tag {
            1 => Some(ScalarKind::Bool),
            2 => Some(ScalarKind::Int64),
            3 => Some(ScalarKind::UInt64),
            4 => Some(ScalarKind::Float64),
            5 => Some(ScalarKind::String),
            6 => Some(ScalarKind::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "Bool",
            ScalarKind::Int64 => "Int64",
            ScalarKind::UInt64 => "UInt64",
            ScalarKind::Float64 => "Float64",
            ScalarKind::String => "String",
            ScalarKind::Binary => "Binary",
        };
        f.write_str(name)
    }
}

/// One object row: a mapping from dotted paths to scalar values.
///
/// The map keeps paths sorted by byte order, which the shared-data writer
/// relies on.
pub type ObjectRow = BTreeMap<String, Scalar>;
