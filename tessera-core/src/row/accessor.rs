//! Accessor protocol for encoding rows from arbitrary in-memory shapes.
//!
//! The codec only ever talks to a [`RowAccessor`]. A slice of
//! [`FieldValue`]s is one accessor ([`ValueRow`]), a JSON object is another
//! ([`JsonRowAccessor`]); both feed the same encoder and therefore produce
//! identical bytes for the same logical row.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::cursor::RowWriter;
use super::schema::FieldMeta;
use super::value::{FieldType, FieldValue};

/// Typed, per-field view of a row that the encoder can read from.
///
/// Getters are only called after [`RowAccessor::has_value`] returned true
/// for the field, and only for the field's declared type.
pub trait RowAccessor {
    fn has_value(&self, field: &FieldMeta) -> bool;

    fn get_int64(&self, field: &FieldMeta) -> i64;
    fn get_uint64(&self, field: &FieldMeta) -> u64;
    fn get_float32(&self, field: &FieldMeta) -> f32;
    fn get_bool(&self, field: &FieldMeta) -> bool;
    fn get_string(&self, field: &FieldMeta) -> &str;
    fn get_binary(&self, field: &FieldMeta) -> Cow<'_, [u8]>;

    /// Element count of a list field.
    fn list_len(&self, field: &FieldMeta) -> usize;
    fn list_int64_at(&self, field: &FieldMeta, index: usize) -> i64;
    fn list_float32_at(&self, field: &FieldMeta, index: usize) -> f32;
    fn list_string_at(&self, field: &FieldMeta, index: usize) -> &str;

    /// Appends the first `count` elements of an int64 list.
    fn write_list_int64(&self, field: &FieldMeta, count: usize, out: &mut RowWriter) {
        for i in 0..count {
            out.append_i64(self.list_int64_at(field, i));
        }
    }

    /// Appends the first `count` elements of a float32 list.
    fn write_list_float32(&self, field: &FieldMeta, count: usize, out: &mut RowWriter) {
        for i in 0..count {
            out.append_f32(self.list_float32_at(field, i));
        }
    }
}

/// Accessor over values laid out in field-id order.
///
/// Missing trailing values and values whose variant does not fit the field
/// type count as absent.
pub struct ValueRow<'a> {
    values: &'a [FieldValue],
}

impl<'a> ValueRow<'a> {
    pub fn new(values: &'a [FieldValue]) -> Self {
        Self { values }
    }

    #[inline]
    fn value(&self, field: &FieldMeta) -> &'a FieldValue {
        self.values.get(field.id).unwrap_or(&ABSENT)
    }
}

/// Accessor that reads each field's schema default.
pub(crate) struct DefaultRow<'a> {
    fields: &'a [FieldMeta],
}

impl<'a> DefaultRow<'a> {
    pub(crate) fn new(fields: &'a [FieldMeta]) -> Self {
        Self { fields }
    }

    #[inline]
    fn value(&self, field: &FieldMeta) -> &'a FieldValue {
        self.fields.get(field.id).map(|f| &f.default).unwrap_or(&ABSENT)
    }
}

static ABSENT: FieldValue = FieldValue::Absent;
static NULL: Value = Value::Null;

macro_rules! value_accessor {
    ($ty:ty, $this:ident, $field:ident => $lookup:expr) => {
        impl RowAccessor for $ty {
            fn has_value(&self, $field: &FieldMeta) -> bool {
                let $this = self;
                let v: &FieldValue = $lookup;
                !v.is_absent() && v.fits($field.field_type)
            }

            fn get_int64(&self, $field: &FieldMeta) -> i64 {
                let $this = self;
                match $lookup {
                    FieldValue::Int64(v) => *v,
                    FieldValue::UInt64(v) => *v as i64,
                    _ => 0,
                }
            }

            fn get_uint64(&self, $field: &FieldMeta) -> u64 {
                let $this = self;
                match $lookup {
                    FieldValue::UInt64(v) => *v,
                    FieldValue::Int64(v) => *v as u64,
                    _ => 0,
                }
            }

            fn get_float32(&self, $field: &FieldMeta) -> f32 {
                let $this = self;
                match $lookup {
                    FieldValue::Float32(v) => *v,
                    _ => 0.0,
                }
            }

            fn get_bool(&self, $field: &FieldMeta) -> bool {
                let $this = self;
                matches!($lookup, FieldValue::Bool(true))
            }

            fn get_string(&self, $field: &FieldMeta) -> &str {
                let $this = self;
                match $lookup {
                    FieldValue::String(s) => s.as_str(),
                    _ => "",
                }
            }

            fn get_binary(&self, $field: &FieldMeta) -> Cow<'_, [u8]> {
                let $this = self;
                match $lookup {
                    FieldValue::Binary(b) => Cow::Borrowed(b.as_slice()),
                    _ => Cow::Borrowed(&[]),
                }
            }

            fn list_len(&self, $field: &FieldMeta) -> usize {
                let $this = self;
                match $lookup {
                    FieldValue::ListInt64(v) => v.len(),
                    FieldValue::ListString(v) => v.len(),
                    FieldValue::ListFloat32(v) => v.len(),
                    _ => 0,
                }
            }

            fn list_int64_at(&self, $field: &FieldMeta, index: usize) -> i64 {
                let $this = self;
                match $lookup {
                    FieldValue::ListInt64(v) => v.get(index).copied().unwrap_or(0),
                    _ => 0,
                }
            }

            fn list_float32_at(&self, $field: &FieldMeta, index: usize) -> f32 {
                let $this = self;
                match $lookup {
                    FieldValue::ListFloat32(v) => v.get(index).copied().unwrap_or(0.0),
                    _ => 0.0,
                }
            }

            fn list_string_at(&self, $field: &FieldMeta, index: usize) -> &str {
                let $this = self;
                match $lookup {
                    FieldValue::ListString(v) => v.get(index).map(String::as_str).unwrap_or(""),
                    _ => "",
                }
            }

            fn write_list_int64(&self, $field: &FieldMeta, count: usize, out: &mut RowWriter) {
                let $this = self;
                if let FieldValue::ListInt64(v) = $lookup {
                    for x in v.iter().take(count) {
                        out.append_i64(*x);
                    }
                }
            }

            fn write_list_float32(&self, $field: &FieldMeta, count: usize, out: &mut RowWriter) {
                let $this = self;
                if let FieldValue::ListFloat32(v) = $lookup {
                    for x in v.iter().take(count) {
                        out.append_f32(*x);
                    }
                }
            }
        }
    };
}

value_accessor!(ValueRow<'_>, this, field => this.value(field));
value_accessor!(DefaultRow<'_>, this, field => this.value(field));

/// Accessor over a JSON object keyed by field name.
///
/// Numbers, booleans, strings and arrays map onto the matching field types.
/// Binary fields accept either a string (its UTF-8 bytes) or an array of
/// byte values.
pub struct JsonRowAccessor<'a> {
    object: &'a Map<String, Value>,
}

impl<'a> JsonRowAccessor<'a> {
    pub fn new(object: &'a Map<String, Value>) -> Self {
        Self { object }
    }

    #[inline]
    fn value(&self, field: &FieldMeta) -> &'a Value {
        self.object.get(&field.name).unwrap_or(&NULL)
    }

    fn element(&self, field: &FieldMeta, index: usize) -> &'a Value {
        self.value(field)
            .as_array()
            .and_then(|a| a.get(index))
            .unwrap_or(&NULL)
    }
}

impl RowAccessor for JsonRowAccessor<'_> {
    fn has_value(&self, field: &FieldMeta) -> bool {
        json_fits(self.value(field), field.field_type)
    }

    fn get_int64(&self, field: &FieldMeta) -> i64 {
        json_i64(self.value(field))
    }

    fn get_uint64(&self, field: &FieldMeta) -> u64 {
        json_u64(self.value(field))
    }

    fn get_float32(&self, field: &FieldMeta) -> f32 {
        self.value(field).as_f64().unwrap_or(0.0) as f32
    }

    fn get_bool(&self, field: &FieldMeta) -> bool {
        self.value(field).as_bool().unwrap_or(false)
    }

    fn get_string(&self, field: &FieldMeta) -> &str {
        self.value(field).as_str().unwrap_or("")
    }

    fn get_binary(&self, field: &FieldMeta) -> Cow<'_, [u8]> {
        json_bytes(self.value(field))
    }

    fn list_len(&self, field: &FieldMeta) -> usize {
        self.value(field).as_array().map(Vec::len).unwrap_or(0)
    }

    fn list_int64_at(&self, field: &FieldMeta, index: usize) -> i64 {
        json_i64(self.element(field, index))
    }

    fn list_float32_at(&self, field: &FieldMeta, index: usize) -> f32 {
        self.element(field, index).as_f64().unwrap_or(0.0) as f32
    }

    fn list_string_at(&self, field: &FieldMeta, index: usize) -> &str {
        self.element(field, index).as_str().unwrap_or("")
    }
}

fn json_i64(v: &Value) -> i64 {
    v.as_i64()
        .or_else(|| v.as_u64().map(|u| u as i64))
        .or_else(|| v.as_f64().map(|f| f as i64))
        .unwrap_or(0)
}

fn json_u64(v: &Value) -> u64 {
    v.as_u64()
        .or_else(|| v.as_i64().map(|i| i as u64))
        .or_else(|| v.as_f64().map(|f| f as u64))
        .unwrap_or(0)
}

fn json_bytes(v: &Value) -> Cow<'_, [u8]> {
    match v {
        Value::String(s) => Cow::Borrowed(s.as_bytes()),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|b| b.as_u64().unwrap_or(0) as u8)
                .collect(),
        ),
        _ => Cow::Borrowed(&[]),
    }
}

fn json_fits(v: &Value, ty: FieldType) -> bool {
    match ty {
        FieldType::Int64 | FieldType::UInt64 | FieldType::Float32 => v.is_number(),
        FieldType::Bool => v.is_boolean(),
        FieldType::String => v.is_string(),
        FieldType::Binary => v.is_string() || v.is_array(),
        FieldType::ListInt64 | FieldType::ListString | FieldType::ListFloat32 => v.is_array(),
    }
}

/// Converts a JSON value to a [`FieldValue`] of type `ty`.
///
/// Returns [`FieldValue::Absent`] when the JSON shape does not fit the type.
pub fn json_to_field_value(v: &Value, ty: FieldType) -> FieldValue {
    if !json_fits(v, ty) {
        return FieldValue::Absent;
    }
    let items = || v.as_array().map(Vec::as_slice).unwrap_or(&[]);
    match ty {
        FieldType::Int64 => FieldValue::Int64(json_i64(v)),
        FieldType::UInt64 => FieldValue::UInt64(json_u64(v)),
        FieldType::Float32 => FieldValue::Float32(v.as_f64().unwrap_or(0.0) as f32),
        FieldType::Bool => FieldValue::Bool(v.as_bool().unwrap_or(false)),
        FieldType::String => FieldValue::String(v.as_str().unwrap_or("").to_string()),
        FieldType::Binary => FieldValue::Binary(json_bytes(v).into_owned()),
        FieldType::ListInt64 => FieldValue::ListInt64(items().iter().map(json_i64).collect()),
        FieldType::ListFloat32 => FieldValue::ListFloat32(
            items()
                .iter()
                .map(|x| x.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        ),
        FieldType::ListString => FieldValue::ListString(
            items()
                .iter()
                .map(|x| x.as_str().unwrap_or("").to_string())
                .collect(),
        ),
    }
}
