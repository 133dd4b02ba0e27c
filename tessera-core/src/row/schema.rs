//! Row schema: field definitions and the fixed-region layout they imply.

use std::collections::HashMap;

use serde::Deserialize;

use super::accessor::json_to_field_value;
use super::value::{FieldType, FieldValue};
use crate::error::{Error, Result};

/// Maximum number of fields a schema may hold (single-byte row header).
pub const MAX_FIELDS: usize = u8::MAX as usize;

/// Size of the row header holding the field count.
pub(crate) const HEADER_LEN: usize = 1;

/// A field definition as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub id: i64,
    pub field_type: FieldType,
    pub default: FieldValue,
}

impl FieldDef {
    /// Creates a field definition whose default is the type's zero value.
    pub fn new(name: impl Into<String>, id: i64, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            id,
            field_type,
            default: FieldValue::Absent,
        }
    }

    /// Sets the default value. Chainable.
    pub fn with_default(mut self, default: impl Into<FieldValue>) -> Self {
        self.default = default.into();
        self
    }
}

/// Resolved layout information for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub id: usize,
    pub field_type: FieldType,
    /// Byte offset of this field's slot in the fixed region.
    pub offset: usize,
    /// Default, already coerced to `field_type`.
    pub default: FieldValue,
}

#[derive(Deserialize)]
struct RawFieldDef {
    name: String,
    id: i64,
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default)]
    default: Option<serde_json::Value>,
}

/// An immutable, validated set of fields with ids `0..N-1`.
///
/// # Example
///
/// ```
/// use tessera_core::{FieldDef, FieldType, Schema};
///
/// let schema = Schema::new(vec![
///     FieldDef::new("id", 0, FieldType::UInt64),
///     FieldDef::new("title", 1, FieldType::String).with_default("untitled"),
/// ])
/// .unwrap();
///
/// assert_eq!(schema.len(), 2);
/// assert_eq!(schema.fixed_len(), 1 + 8 + 4);
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldMeta>,
    by_name: HashMap<String, usize>,
    fixed_len: usize,
}

impl Schema {
    /// Validates the definitions and computes slot offsets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchema`] for negative, duplicate, or
    /// non-contiguous ids, duplicate names, or more than 255 fields.
    pub fn new(defs: Vec<FieldDef>) -> Result<Self> {
        if defs.len() > MAX_FIELDS {
            return Err(Error::InvalidSchema(format!(
                "too many fields: {} (max {})",
                defs.len(),
                MAX_FIELDS
            )));
        }

        let mut max_id = -1i64;
        for def in &defs {
            if def.id < 0 {
                return Err(Error::InvalidSchema(format!(
                    "field id must be non-negative: {} has id {}",
                    def.name, def.id
                )));
            }
            max_id = max_id.max(def.id);
        }

        if max_id != defs.len() as i64 - 1 {
            return Err(Error::InvalidSchema(
                "field ids must be contiguous from 0 to N-1".to_string(),
            ));
        }

        let mut slots: Vec<Option<FieldDef>> = vec![None; defs.len()];
        let mut by_name = HashMap::with_capacity(defs.len());
        for def in defs {
            let id = def.id as usize;
            if slots[id].is_some() {
                return Err(Error::InvalidSchema(format!("duplicate field id: {}", id)));
            }
            if by_name.insert(def.name.clone(), id).is_some() {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field name: {}",
                    def.name
                )));
            }
            slots[id] = Some(def);
        }

        let mut offset = HEADER_LEN;
        let mut fields = Vec::with_capacity(slots.len());
        for (id, def) in slots.into_iter().enumerate() {
            // Contiguity plus uniqueness leaves no empty slot.
            let Some(def) = def else {
                return Err(Error::InvalidSchema(format!("missing field id: {}", id)));
            };
            fields.push(FieldMeta {
                name: def.name,
                id,
                field_type: def.field_type,
                offset,
                default: def.default.coerce(def.field_type),
            });
            offset += def.field_type.slot_size();
        }

        Ok(Self {
            fields,
            by_name,
            fixed_len: offset,
        })
    }

    /// Parses a JSON array of `{"name", "id", "type", "default"?}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawFieldDef> = serde_json::from_str(json)
            .map_err(|e| Error::InvalidSchema(format!("parse schema failed: {}", e)))?;

        let defs = raw
            .into_iter()
            .map(|r| FieldDef {
                default: r
                    .default
                    .as_ref()
                    .map(|v| json_to_field_value(v, r.field_type))
                    .unwrap_or_default(),
                name: r.name,
                id: r.id,
                field_type: r.field_type,
            })
            .collect();

        Self::new(defs)
    }

    /// Fields in id order.
    #[inline]
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.by_name.get(name).map(|&id| &self.fields[id])
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Length of header plus fixed region; where the variable region starts.
    #[inline]
    pub fn fixed_len(&self) -> usize {
        self.fixed_len
    }
}
