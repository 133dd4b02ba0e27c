//! Field types and tagged field values.

use serde::{Deserialize, Serialize};

/// Storage type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int64,
    #[serde(rename = "uint64")]
    UInt64,
    Float32,
    String,
    Binary,
    #[serde(alias = "boolean")]
    Bool,
    ListInt64,
    ListString,
    ListFloat32,
}

impl FieldType {
    /// Width of this field's slot in the fixed region.
    ///
    /// Variable-length types store a 4-byte absolute offset into the
    /// variable region.
    #[inline]
    pub fn slot_size(&self) -> usize {
        match self {
            FieldType::Int64 | FieldType::UInt64 => 8,
            FieldType::Float32 => 4,
            FieldType::Bool => 1,
            FieldType::String
            | FieldType::Binary
            | FieldType::ListInt64
            | FieldType::ListString
            | FieldType::ListFloat32 => 4,
        }
    }

    /// Returns true if values of this type live in the variable region.
    #[inline]
    pub fn is_variable(&self) -> bool {
        !matches!(
            self,
            FieldType::Int64 | FieldType::UInt64 | FieldType::Float32 | FieldType::Bool
        )
    }

    /// The zero value of this type.
    pub fn zero_value(&self) -> FieldValue {
        match self {
            FieldType::Int64 => FieldValue::Int64(0),
            FieldType::UInt64 => FieldValue::UInt64(0),
            FieldType::Float32 => FieldValue::Float32(0.0),
            FieldType::Bool => FieldValue::Bool(false),
            FieldType::String => FieldValue::String(String::new()),
            FieldType::Binary => FieldValue::Binary(Vec::new()),
            FieldType::ListInt64 => FieldValue::ListInt64(Vec::new()),
            FieldType::ListString => FieldValue::ListString(Vec::new()),
            FieldType::ListFloat32 => FieldValue::ListFloat32(Vec::new()),
        }
    }
}

/// A single field value, or `Absent` when the caller supplied nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Absent,
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Bool(bool),
    String(String),
    Binary(Vec<u8>),
    ListInt64(Vec<i64>),
    ListString(Vec<String>),
    ListFloat32(Vec<f32>),
}

impl FieldValue {
    /// Returns true for [`FieldValue::Absent`].
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Returns true if this value can be stored in a field of type `ty`.
    ///
    /// Int64 and UInt64 are interchangeable; every other type must match
    /// exactly.
    pub fn fits(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (FieldValue::Int64(_), FieldType::Int64 | FieldType::UInt64)
                | (FieldValue::UInt64(_), FieldType::Int64 | FieldType::UInt64)
                | (FieldValue::Float32(_), FieldType::Float32)
                | (FieldValue::Bool(_), FieldType::Bool)
                | (FieldValue::String(_), FieldType::String)
                | (FieldValue::Binary(_), FieldType::Binary)
                | (FieldValue::ListInt64(_), FieldType::ListInt64)
                | (FieldValue::ListString(_), FieldType::ListString)
                | (FieldValue::ListFloat32(_), FieldType::ListFloat32)
        )
    }

    /// Converts this value to the canonical variant for `ty`.
    ///
    /// Values that do not fit become the type's zero value.
    pub fn coerce(self, ty: FieldType) -> FieldValue {
        match (self, ty) {
            (FieldValue::UInt64(v), FieldType::Int64) => FieldValue::Int64(v as i64),
            (FieldValue::Int64(v), FieldType::UInt64) => FieldValue::UInt64(v as u64),
            (v, ty) if v.fits(ty) => v,
            (_, ty) => ty.zero_value(),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt64(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float32(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Binary(v)
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(v: Vec<i64>) -> Self {
        FieldValue::ListInt64(v)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::ListString(v)
    }
}

impl From<Vec<f32>> for FieldValue {
    fn from(v: Vec<f32>) -> Self {
        FieldValue::ListFloat32(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_sizes() {
        assert_eq!(FieldType::Int64.slot_size(), 8);
        assert_eq!(FieldType::Float32.slot_size(), 4);
        assert_eq!(FieldType::Bool.slot_size(), 1);
        assert_eq!(FieldType::ListString.slot_size(), 4);
        assert!(FieldType::Binary.is_variable());
        assert!(!FieldType::UInt64.is_variable());
    }

    #[test]
    fn test_coerce_integer_variants() {
        assert_eq!(
            FieldValue::UInt64(7).coerce(FieldType::Int64),
            FieldValue::Int64(7)
        );
        assert_eq!(
            FieldValue::Int64(-1).coerce(FieldType::UInt64),
            FieldValue::UInt64(u64::MAX)
        );
    }

    #[test]
    fn test_coerce_mismatch_is_zero() {
        assert_eq!(
            FieldValue::from("x").coerce(FieldType::Float32),
            FieldValue::Float32(0.0)
        );
        assert_eq!(
            FieldValue::Absent.coerce(FieldType::ListInt64),
            FieldValue::ListInt64(Vec::new())
        );
    }

    #[test]
    fn test_field_type_names() {
        let ty: FieldType = serde_json::from_str("\"list_float32\"").unwrap();
        assert_eq!(ty, FieldType::ListFloat32);
        let ty: FieldType = serde_json::from_str("\"uint64\"").unwrap();
        assert_eq!(ty, FieldType::UInt64);
        let ty: FieldType = serde_json::from_str("\"boolean\"").unwrap();
        assert_eq!(ty, FieldType::Bool);
    }
}
