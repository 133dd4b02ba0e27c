//! Scalar collaborator: bitmap field groups over row offsets.
//!
//! The scalar index only knows offsets. Filters that name labels go through
//! a [`LabelOffsetResolver`] borrowed from the vector index for the duration
//! of one evaluation.

pub mod field_sets;
pub mod fields;
pub mod index;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use field_sets::{normalize_path, FieldGroup, FieldSets, RangeBounds, RangedMap};
pub use fields::FieldsDict;
pub use index::ScalarIndex;

/// Kind of an indexed scalar field.
///
/// - `int64`: value bitmaps and a ranged map
/// - `float32`: ranged map only
/// - `string`, `bool`: value bitmaps
/// - `path`: value bitmaps matched by path descendant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarFieldKind {
    Int64,
    Float32,
    String,
    Bool,
    Path,
    #[serde(other)]
    Unknown,
}

/// Translates caller labels into physical offsets.
pub trait LabelOffsetResolver {
    /// Offset of `label`, `None` when the label is not indexed.
    fn offset_of(&self, label: u64) -> Result<Option<u32>>;

    /// Offsets of every known label in `labels`; unknown labels are skipped.
    fn offsets_for_labels(&self, labels: &[u64]) -> Result<Vec<u32>> {
        let mut offsets = Vec::with_capacity(labels.len());
        for &label in labels {
            if let Some(offset) = self.offset_of(label)? {
                offsets.push(offset);
            }
        }
        Ok(offsets)
    }
}

/// What a filter evaluation reads: the field groups and a label resolver.
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    pub sets: &'a FieldSets,
    pub resolver: &'a dyn LabelOffsetResolver,
}

impl<'a> FilterContext<'a> {
    pub fn new(sets: &'a FieldSets, resolver: &'a dyn LabelOffsetResolver) -> Self {
        Self { sets, resolver }
    }
}
