//! Scalar index persisted as `scalar_index.data`.

use std::path::Path;

use tracing::{debug, error};

use super::field_sets::{FieldSets, FieldSetsSnapshot};
use super::fields::FieldsDict;
use crate::error::{Error, Result};
use crate::meta::ScalarFieldMeta;
use crate::storage::{read_snapshot, write_snapshot};

const INDEX_DATA_FILE: &str = "scalar_index.data";
const MAGIC: &[u8; 4] = b"TSCL";

/// Field groups for the scalar fields named in the manager metadata.
#[derive(Debug, Clone, Default)]
pub struct ScalarIndex {
    sets: FieldSets,
}

impl ScalarIndex {
    /// Creates an empty index with one group per field.
    pub fn new(fields: &[ScalarFieldMeta]) -> Self {
        let mut sets = FieldSets::new();
        for field in fields {
            sets.add_group(&field.field_name, field.field_type);
        }
        Self { sets }
    }

    /// Opens the index dumped under `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut index = Self::default();
        index.load(dir)?;
        Ok(index)
    }

    /// Replaces the in-memory state with the snapshot under `dir`.
    pub fn load<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(INDEX_DATA_FILE);
        let bytes = read_snapshot(&path, MAGIC).map_err(|e| {
            error!(path = %path.display(), error = %e, "scalar index load failed");
            e
        })?;
        let snapshot: FieldSetsSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Corrupted(format!("scalar index decode failed: {}", e)))?;
        self.sets = FieldSets::from_snapshot(snapshot);
        debug!(
            path = %path.display(),
            groups = self.sets.group_count(),
            elements = self.sets.element_count(),
            "loaded scalar index"
        );
        Ok(())
    }

    /// Writes the snapshot into `dir`, which must exist.
    pub fn dump<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(INDEX_DATA_FILE);
        let bytes = serde_json::to_vec(&self.sets.to_snapshot())
            .map_err(|e| Error::IoError(format!("scalar index encode failed: {}", e)))?;
        write_snapshot(&path, MAGIC, &bytes).map_err(|e| {
            error!(path = %path.display(), error = %e, "scalar index dump failed");
            e
        })
    }

    /// Replaces the `old_fields` entries of `offset` with `fields`.
    pub fn add_row_data(&mut self, offset: u32, fields: &FieldsDict, old_fields: &FieldsDict) {
        if !old_fields.is_empty() {
            self.sets.delete_field_data(old_fields, offset);
        }
        self.sets.add_field_data(fields, offset);
    }

    /// Removes `offset` and its `old_fields` entries.
    pub fn delete_row_data(&mut self, offset: u32, old_fields: &FieldsDict) {
        if !old_fields.is_empty() {
            self.sets.delete_field_data(old_fields, offset);
        }
        self.sets.remove_offset(offset);
    }

    pub fn field_sets(&self) -> &FieldSets {
        &self.sets
    }
}
