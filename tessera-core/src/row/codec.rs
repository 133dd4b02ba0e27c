//! Row encoder and decoder.
//!
//! # Format
//!
//! ```text
//! [count:u8][fixed region: one slot per field, id order][variable region]
//! ```
//!
//! Fixed slots hold int64/uint64 (8 bytes), float32 (4) and bool (1) values
//! directly. Variable fields hold a 4-byte absolute offset to their payload:
//!
//! ```text
//! string        [len:u16][utf8 bytes]
//! binary        [len:u32][bytes]
//! list_int64    [count:u16][i64 * count]
//! list_float32  [count:u16][f32 * count]
//! list_string   [count:u16]([len:u16][utf8 bytes]) * count
//! ```
//!
//! All integers and floats use native byte order.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use super::accessor::{DefaultRow, RowAccessor, ValueRow};
use super::cursor::{RowReader, RowWriter};
use super::schema::{FieldMeta, Schema};
use super::value::{FieldType, FieldValue};
use crate::error::{Error, Result};

const SHORT_MAX: usize = u16::MAX as usize;
const LONG_MAX: usize = u32::MAX as usize;

/// Encoder/decoder for rows of one [`Schema`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tessera_core::{BytesRow, FieldDef, FieldType, FieldValue, Schema};
///
/// let schema = Schema::new(vec![
///     FieldDef::new("id", 0, FieldType::Int64),
///     FieldDef::new("name", 1, FieldType::String),
/// ])
/// .unwrap();
/// let codec = BytesRow::new(Arc::new(schema));
///
/// let buf = codec.serialize(&[FieldValue::Int64(7), FieldValue::from("seven")]).unwrap();
/// assert_eq!(codec.deserialize_field(&buf, "name"), FieldValue::from("seven"));
/// ```
#[derive(Debug, Clone)]
pub struct BytesRow {
    schema: Arc<Schema>,
}

/// A decode that ran past the end of the buffer, carrying what was recovered.
struct Overrun(FieldValue);

type Decoded = std::result::Result<FieldValue, Overrun>;

impl BytesRow {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encodes values given in field-id order.
    ///
    /// Absent values, missing trailing values and values of the wrong type
    /// are replaced by the field default. Fails with [`Error::InvalidInput`]
    /// when a payload would start beyond the 4-byte offset range.
    pub fn serialize(&self, values: &[FieldValue]) -> Result<Vec<u8>> {
        self.serialize_with(&ValueRow::new(values))
    }

    /// Encodes a row read through an accessor.
    pub fn serialize_with<A: RowAccessor>(&self, row: &A) -> Result<Vec<u8>> {
        let fields = self.schema.fields();
        let defaults = DefaultRow::new(fields);
        let row: &dyn RowAccessor = row;
        let defaults: &dyn RowAccessor = &defaults;
        let source = |f: &FieldMeta| if row.has_value(f) { row } else { defaults };

        // Pass 1: size the variable region.
        let mut total = self.schema.fixed_len();
        for f in fields.iter().filter(|f| f.field_type.is_variable()) {
            variable_offset(total)?;
            total += payload_len(source(f), f);
        }

        // Pass 2: write every field into its slot.
        let mut out = RowWriter::new(self.schema.fixed_len(), total);
        out.write_slot(0, &[fields.len() as u8]);
        for f in fields {
            let src = source(f);
            match f.field_type {
                FieldType::Int64 => out.write_slot(f.offset, &src.get_int64(f).to_ne_bytes()),
                FieldType::UInt64 => out.write_slot(f.offset, &src.get_uint64(f).to_ne_bytes()),
                FieldType::Float32 => {
                    out.write_slot(f.offset, &src.get_float32(f).to_ne_bytes())
                }
                FieldType::Bool => out.write_slot(f.offset, &[src.get_bool(f) as u8]),
                _ => {
                    let at = variable_offset(out.position())?;
                    out.write_slot(f.offset, &at.to_ne_bytes());
                    write_payload(src, f, &mut out);
                }
            }
        }

        debug_assert_eq!(out.position(), total);
        Ok(out.into_inner())
    }

    /// Decodes one field by name.
    ///
    /// Unknown names yield [`FieldValue::Absent`]. Fields the buffer predates
    /// yield the schema default. Payloads that overrun the buffer yield an
    /// empty or zero value; a truncated string list keeps the elements read
    /// before the overrun.
    pub fn deserialize_field(&self, buf: &[u8], name: &str) -> FieldValue {
        match self.schema.field(name) {
            Some(f) => decode_field(buf, f).unwrap_or_else(|Overrun(partial)| partial),
            None => FieldValue::Absent,
        }
    }

    /// Like [`BytesRow::deserialize_field`] but reports overruns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] if any length or offset read for the
    /// field points past the end of the buffer.
    pub fn try_deserialize_field(&self, buf: &[u8], name: &str) -> Result<FieldValue> {
        match self.schema.field(name) {
            Some(f) => decode_field(buf, f).map_err(|_| {
                Error::Corrupted(format!(
                    "field {} overruns row buffer of {} bytes",
                    f.name,
                    buf.len()
                ))
            }),
            None => Ok(FieldValue::Absent),
        }
    }

    /// Decodes every field into a name-keyed map.
    pub fn deserialize(&self, buf: &[u8]) -> BTreeMap<String, FieldValue> {
        self.schema
            .fields()
            .iter()
            .map(|f| {
                let value = decode_field(buf, f).unwrap_or_else(|Overrun(partial)| partial);
                (f.name.clone(), value)
            })
            .collect()
    }

    /// Decodes every field in id order.
    pub fn deserialize_values(&self, buf: &[u8]) -> Vec<FieldValue> {
        self.schema
            .fields()
            .iter()
            .map(|f| decode_field(buf, f).unwrap_or_else(|Overrun(partial)| partial))
            .collect()
    }
}

/// Longest prefix of `s` that fits a u16 length and ends on a char boundary.
fn clamp_str(s: &str) -> &str {
    if s.len() <= SHORT_MAX {
        return s;
    }
    let mut end = SHORT_MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Position of a variable payload as stored in its fixed slot.
fn variable_offset(position: usize) -> Result<u32> {
    u32::try_from(position).map_err(|_| {
        Error::InvalidInput(format!(
            "row payload offset {} exceeds the 4-byte offset range",
            position
        ))
    })
}

fn payload_len(src: &dyn RowAccessor, f: &FieldMeta) -> usize {
    match f.field_type {
        FieldType::String => 2 + clamp_str(src.get_string(f)).len(),
        FieldType::Binary => 4 + src.get_binary(f).len().min(LONG_MAX),
        FieldType::ListInt64 => 2 + 8 * src.list_len(f).min(SHORT_MAX),
        FieldType::ListFloat32 => 2 + 4 * src.list_len(f).min(SHORT_MAX),
        FieldType::ListString => {
            let count = src.list_len(f).min(SHORT_MAX);
            2 + (0..count)
                .map(|i| 2 + clamp_str(src.list_string_at(f, i)).len())
                .sum::<usize>()
        }
        FieldType::Int64 | FieldType::UInt64 | FieldType::Float32 | FieldType::Bool => 0,
    }
}

fn write_payload(src: &dyn RowAccessor, f: &FieldMeta, out: &mut RowWriter) {
    match f.field_type {
        FieldType::String => {
            let s = src.get_string(f);
            let kept = clamp_str(s);
            if kept.len() < s.len() {
                warn!(field = %f.name, len = s.len(), "string truncated to u16 length");
            }
            out.append_u16(kept.len() as u16);
            out.append(kept.as_bytes());
        }
        FieldType::Binary => {
            let bytes = src.get_binary(f);
            let kept = &bytes[..bytes.len().min(LONG_MAX)];
            out.append_u32(kept.len() as u32);
            out.append(kept);
        }
        FieldType::ListInt64 | FieldType::ListFloat32 | FieldType::ListString => {
            let len = src.list_len(f);
            let count = len.min(SHORT_MAX);
            if count < len {
                warn!(field = %f.name, len, "list truncated to u16 element count");
            }
            out.append_u16(count as u16);
            match f.field_type {
                FieldType::ListInt64 => src.write_list_int64(f, count, out),
                FieldType::ListFloat32 => src.write_list_float32(f, count, out),
                _ => {
                    for i in 0..count {
                        let s = clamp_str(src.list_string_at(f, i));
                        out.append_u16(s.len() as u16);
                        out.append(s.as_bytes());
                    }
                }
            }
        }
        FieldType::Int64 | FieldType::UInt64 | FieldType::Float32 | FieldType::Bool => {}
    }
}

fn decode_field(buf: &[u8], f: &FieldMeta) -> Decoded {
    // Rows written before this field existed.
    let encoded_count = buf.first().copied().unwrap_or(0) as usize;
    if buf.len() <= f.offset || f.id >= encoded_count {
        return Ok(f.default.clone());
    }

    let zero = || Overrun(f.field_type.zero_value());
    let mut slot = RowReader::at(buf, f.offset);

    match f.field_type {
        FieldType::Int64 => slot.i64().map(FieldValue::Int64).ok_or_else(zero),
        FieldType::UInt64 => slot.u64().map(FieldValue::UInt64).ok_or_else(zero),
        FieldType::Float32 => slot.f32().map(FieldValue::Float32).ok_or_else(zero),
        FieldType::Bool => slot.u8().map(|b| FieldValue::Bool(b != 0)).ok_or_else(zero),
        ty => {
            let at = slot.u32().ok_or_else(zero)? as usize;
            decode_payload(RowReader::at(buf, at), ty).ok_or_else(zero)?
        }
    }
}

/// Reads a variable payload. The outer `None` is an overrun of the length
/// prefix or a fixed-width body; the inner result carries partial string
/// lists.
fn decode_payload(mut r: RowReader<'_>, ty: FieldType) -> Option<Decoded> {
    let value = match ty {
        FieldType::String => {
            let len = r.u16()? as usize;
            FieldValue::String(String::from_utf8_lossy(r.bytes(len)?).into_owned())
        }
        FieldType::Binary => {
            let len = r.u32()? as usize;
            FieldValue::Binary(r.bytes(len)?.to_vec())
        }
        FieldType::ListInt64 => {
            let count = r.u16()? as usize;
            let items = (0..count).map(|_| r.i64()).collect::<Option<Vec<_>>>()?;
            FieldValue::ListInt64(items)
        }
        FieldType::ListFloat32 => {
            let count = r.u16()? as usize;
            let items = (0..count).map(|_| r.f32()).collect::<Option<Vec<_>>>()?;
            FieldValue::ListFloat32(items)
        }
        FieldType::ListString => {
            let count = r.u16()? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let next = r
                    .u16()
                    .and_then(|len| r.bytes(len as usize))
                    .map(|b| String::from_utf8_lossy(b).into_owned());
                match next {
                    Some(s) => items.push(s),
                    None => return Some(Err(Overrun(FieldValue::ListString(items)))),
                }
            }
            FieldValue::ListString(items)
        }
        FieldType::Int64 | FieldType::UInt64 | FieldType::Float32 | FieldType::Bool => {
            return None;
        }
    };
    Some(Ok(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{FieldDef, JsonRowAccessor};
    use serde_json::json;

    fn all_types_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(vec![
                FieldDef::new("i", 0, FieldType::Int64).with_default(-1i64),
                FieldDef::new("u", 1, FieldType::UInt64),
                FieldDef::new("f", 2, FieldType::Float32),
                FieldDef::new("b", 3, FieldType::Bool).with_default(true),
                FieldDef::new("s", 4, FieldType::String).with_default("none"),
                FieldDef::new("bin", 5, FieldType::Binary),
                FieldDef::new("li", 6, FieldType::ListInt64),
                FieldDef::new("ls", 7, FieldType::ListString),
                FieldDef::new("lf", 8, FieldType::ListFloat32),
            ])
            .unwrap(),
        )
    }

    fn sample_values() -> Vec<FieldValue> {
        vec![
            FieldValue::Int64(-42),
            FieldValue::UInt64(u64::MAX),
            FieldValue::Float32(3.5),
            FieldValue::Bool(false),
            FieldValue::from("héllo"),
            FieldValue::Binary(vec![0, 1, 2, 255]),
            FieldValue::ListInt64(vec![1, -2, 3]),
            FieldValue::ListString(vec!["a".into(), String::new(), "ccc".into()]),
            FieldValue::ListFloat32(vec![0.25, -1.0]),
        ]
    }

    #[test]
    fn test_roundtrip_all_types() {
        let codec = BytesRow::new(all_types_schema());
        let values = sample_values();
        let buf = codec.serialize(&values).unwrap();

        assert_eq!(buf[0], 9);
        assert_eq!(codec.deserialize_values(&buf), values);
        assert_eq!(codec.deserialize_field(&buf, "s"), FieldValue::from("héllo"));
    }

    #[test]
    fn test_layout_is_exact() {
        let schema = Schema::new(vec![
            FieldDef::new("n", 0, FieldType::Int64),
            FieldDef::new("s", 1, FieldType::String),
        ])
        .unwrap();
        let codec = BytesRow::new(Arc::new(schema));
        let buf = codec.serialize(&[FieldValue::Int64(5), FieldValue::from("ab")]).unwrap();

        let mut expected = vec![2u8];
        expected.extend_from_slice(&5i64.to_ne_bytes());
        expected.extend_from_slice(&13u32.to_ne_bytes());
        expected.extend_from_slice(&2u16.to_ne_bytes());
        expected.extend_from_slice(b"ab");
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_absent_uses_defaults() {
        let codec = BytesRow::new(all_types_schema());
        let buf = codec.serialize(&[]).unwrap();

        assert_eq!(codec.deserialize_field(&buf, "i"), FieldValue::Int64(-1));
        assert_eq!(codec.deserialize_field(&buf, "b"), FieldValue::Bool(true));
        assert_eq!(codec.deserialize_field(&buf, "s"), FieldValue::from("none"));
        assert_eq!(
            codec.deserialize_field(&buf, "ls"),
            FieldValue::ListString(Vec::new())
        );
    }

    #[test]
    fn test_integer_variants_interchange() {
        let codec = BytesRow::new(all_types_schema());
        let buf = codec
            .serialize(&[FieldValue::UInt64(9), FieldValue::Int64(-1)])
            .unwrap();

        assert_eq!(codec.deserialize_field(&buf, "i"), FieldValue::Int64(9));
        assert_eq!(codec.deserialize_field(&buf, "u"), FieldValue::UInt64(u64::MAX));
    }

    #[test]
    fn test_float_bits_preserved() {
        let codec = BytesRow::new(all_types_schema());
        let weird = f32::from_bits(0x7fc0_0001);
        let mut values = sample_values();
        values[2] = FieldValue::Float32(weird);
        let buf = codec.serialize(&values).unwrap();

        match codec.deserialize_field(&buf, "f") {
            FieldValue::Float32(v) => assert_eq!(v.to_bits(), weird.to_bits()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_is_absent() {
        let codec = BytesRow::new(all_types_schema());
        let buf = codec.serialize(&sample_values()).unwrap();
        assert_eq!(codec.deserialize_field(&buf, "nope"), FieldValue::Absent);
    }

    #[test]
    fn test_older_row_yields_defaults() {
        let old = Schema::new(vec![FieldDef::new("i", 0, FieldType::Int64)]).unwrap();
        let buf = BytesRow::new(Arc::new(old))
            .serialize(&[FieldValue::Int64(3)])
            .unwrap();

        let codec = BytesRow::new(all_types_schema());
        assert_eq!(codec.deserialize_field(&buf, "i"), FieldValue::Int64(3));
        assert_eq!(codec.deserialize_field(&buf, "b"), FieldValue::Bool(true));
        assert_eq!(codec.deserialize_field(&buf, "s"), FieldValue::from("none"));
    }

    #[test]
    fn test_truncated_string_list_keeps_prefix() {
        let codec = BytesRow::new(all_types_schema());
        let buf = codec.serialize(&sample_values()).unwrap();

        // Cut inside the third element ("ccc") of the string list, which
        // precedes the float list in the variable region.
        let ls_start = {
            let slot = codec.schema().field("ls").unwrap().offset;
            u32::from_ne_bytes(buf[slot..slot + 4].try_into().unwrap()) as usize
        };
        let cut = ls_start + 2 + (2 + 1) + 2 + 2 + 1;
        let truncated = &buf[..cut];

        assert_eq!(
            codec.deserialize_field(truncated, "ls"),
            FieldValue::ListString(vec!["a".into(), String::new()])
        );
        assert_eq!(
            codec.deserialize_field(truncated, "lf"),
            FieldValue::ListFloat32(Vec::new())
        );
        assert!(codec.try_deserialize_field(truncated, "ls").is_err());
        assert_eq!(
            codec.try_deserialize_field(truncated, "i").unwrap(),
            FieldValue::Int64(-42)
        );
    }

    #[test]
    fn test_every_truncation_is_safe() {
        let codec = BytesRow::new(all_types_schema());
        let buf = codec.serialize(&sample_values()).unwrap();

        for cut in 0..buf.len() {
            let decoded = codec.deserialize(&buf[..cut]);
            assert_eq!(decoded.len(), 9);
        }
    }

    #[test]
    fn test_long_string_clamped() {
        let schema = Schema::new(vec![FieldDef::new("s", 0, FieldType::String)]).unwrap();
        let codec = BytesRow::new(Arc::new(schema));
        let long = "é".repeat(40_000);
        let buf = codec.serialize(&[FieldValue::from(long.as_str())]).unwrap();

        match codec.deserialize_field(&buf, "s") {
            FieldValue::String(s) => {
                assert!(s.len() <= u16::MAX as usize);
                assert!(long.starts_with(&s));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_json_accessor_matches_value_path() {
        let codec = BytesRow::new(all_types_schema());
        let row = json!({
            "i": -42,
            "u": u64::MAX,
            "f": 3.5,
            "b": false,
            "s": "héllo",
            "bin": [0, 1, 2, 255],
            "li": [1, -2, 3],
            "ls": ["a", "", "ccc"],
            "lf": [0.25, -1.0],
        });

        let from_json = codec
            .serialize_with(&JsonRowAccessor::new(row.as_object().unwrap()))
            .unwrap();
        let from_values = codec.serialize(&sample_values()).unwrap();
        assert_eq!(from_json, from_values);
    }

    #[test]
    fn test_json_accessor_missing_fields_use_defaults() {
        let codec = BytesRow::new(all_types_schema());
        let row = json!({"i": "wrong type"});

        let from_json = codec
            .serialize_with(&JsonRowAccessor::new(row.as_object().unwrap()))
            .unwrap();
        assert_eq!(from_json, codec.serialize(&[]).unwrap());
    }

    #[test]
    fn test_variable_offset_range() {
        assert_eq!(variable_offset(0).unwrap(), 0);
        assert_eq!(variable_offset(u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(
            variable_offset(u32::MAX as usize + 1),
            Err(Error::InvalidInput(_))
        ));
    }
}
