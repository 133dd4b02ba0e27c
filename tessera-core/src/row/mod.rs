//! Binary row codec.
//!
//! A [`Schema`] fixes the byte layout; [`BytesRow`] packs typed field values
//! into one contiguous buffer and reads them back, either from a slice of
//! [`FieldValue`]s or through any [`RowAccessor`].

pub mod accessor;
pub mod codec;
pub mod cursor;
pub mod schema;
pub mod value;

pub use accessor::{json_to_field_value, JsonRowAccessor, RowAccessor, ValueRow};
pub use codec::BytesRow;
pub use cursor::{RowReader, RowWriter};
pub use schema::{FieldDef, FieldMeta, Schema, MAX_FIELDS};
pub use value::{FieldType, FieldValue};
