//! Vector collaborator: owns vectors and the label/offset mapping.
//!
//! A label is assigned by the caller; the index assigns each new label an
//! offset that stays fixed while the label is live. Offsets are what the
//! scalar index stores.

pub mod flat;

use std::collections::BTreeMap;
use std::path::Path;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::meta::VectorIndexMeta;
use crate::scalar::LabelOffsetResolver;

pub use flat::FlatIndex;

/// Sparse term weights attached to a row or a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseDatapoint {
    weights: BTreeMap<String, f32>,
}

impl SparseDatapoint {
    /// Pairs `terms[i]` with `values[i]`. A repeated term keeps its last value.
    pub fn new(terms: &[String], values: &[f32]) -> Result<Self> {
        if terms.len() != values.len() {
            return Err(Error::InvalidFields(format!(
                "sparse data has {} terms but {} values",
                terms.len(),
                values.len()
            )));
        }
        let weights = terms.iter().cloned().zip(values.iter().copied()).collect();
        Ok(Self { weights })
    }

    pub fn get(&self, term: &str) -> Option<f32> {
        self.weights.get(term).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.weights.iter().map(|(t, &w)| (t.as_str(), w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// One recall call against a vector index.
#[derive(Debug, Clone, Copy)]
pub struct RecallRequest<'a> {
    pub dense: &'a [f32],
    pub topk: usize,
    /// Restricts recall to these offsets when present.
    pub bitmap: Option<&'a RoaringBitmap>,
    pub sparse: Option<&'a SparseDatapoint>,
}

impl<'a> RecallRequest<'a> {
    pub fn new(dense: &'a [f32], topk: usize) -> Self {
        Self {
            dense,
            topk,
            bitmap: None,
            sparse: None,
        }
    }

    pub fn with_bitmap(mut self, bitmap: Option<&'a RoaringBitmap>) -> Self {
        self.bitmap = bitmap;
        self
    }

    pub fn with_sparse(mut self, sparse: Option<&'a SparseDatapoint>) -> Self {
        self.sparse = sparse;
        self
    }
}

/// Labels with their scores, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecallResult {
    pub labels: Vec<u64>,
    pub scores: Vec<f32>,
}

impl RecallResult {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Contract between the index manager and a vector index implementation.
pub trait VectorIndex: Send + Sync {
    /// Name stored as `IndexType` in the metadata.
    fn index_type(&self) -> &'static str;

    fn dimension(&self) -> usize;

    /// Number of live rows.
    fn data_num(&self) -> u64;

    /// Inserts `label`, or overwrites it in place. Returns its offset.
    fn stream_add_data(
        &mut self,
        label: u64,
        dense: &[f32],
        sparse: Option<&SparseDatapoint>,
    ) -> Result<u32>;

    /// Removes `label`. Returns false when the label was not present.
    fn stream_delete_data(&mut self, label: u64) -> Result<bool>;

    fn offset_by_label(&self, label: u64) -> Option<u32>;

    fn label_by_offset(&self, offset: u32) -> Option<u64>;

    fn recall(&self, request: &RecallRequest<'_>) -> Result<RecallResult>;

    /// Replaces the in-memory state with the files under `dir`.
    fn load(&mut self, dir: &Path) -> Result<()>;

    /// Writes the index files into `dir`, which must exist.
    fn dump(&self, dir: &Path) -> Result<()>;

    /// Metadata reflecting the current contents.
    fn meta_snapshot(&self) -> VectorIndexMeta;
}

/// Resolves labels through a borrowed vector index.
#[derive(Clone, Copy)]
pub struct IndexResolver<'a> {
    index: &'a dyn VectorIndex,
}

impl<'a> IndexResolver<'a> {
    pub fn new(index: &'a dyn VectorIndex) -> Self {
        Self { index }
    }
}

impl LabelOffsetResolver for IndexResolver<'_> {
    fn offset_of(&self, label: u64) -> Result<Option<u32>> {
        Ok(self.index.offset_by_label(label))
    }
}

/// Builds the vector index named by `meta.index_type`.
pub fn create_index(meta: &VectorIndexMeta) -> Result<Box<dyn VectorIndex>> {
    match meta.index_type.as_str() {
        flat::INDEX_TYPE => Ok(Box::new(FlatIndex::new(meta.clone())?)),
        other => Err(Error::UnsupportedIndexType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;

    #[test]
    fn test_sparse_datapoint_pairs_terms() {
        let sparse =
            SparseDatapoint::new(&["a".into(), "b".into(), "a".into()], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(sparse.len(), 2);
        assert_eq!(sparse.get("a"), Some(3.0));
        assert!(SparseDatapoint::new(&["a".into()], &[]).is_err());
    }

    #[test]
    fn test_create_index() {
        let index = create_index(&VectorIndexMeta::flat(3, DistanceMetric::L2)).unwrap();
        assert_eq!(index.index_type(), "flat");
        assert_eq!(index.dimension(), 3);

        let mut meta = VectorIndexMeta::flat(3, DistanceMetric::L2);
        meta.index_type = "ivf".into();
        assert!(matches!(
            create_index(&meta),
            Err(Error::UnsupportedIndexType(_))
        ));
    }

    #[test]
    fn test_resolver_borrows_index() {
        let mut index = FlatIndex::new(VectorIndexMeta::flat(2, DistanceMetric::InnerProduct)).unwrap();
        index.stream_add_data(7, &[1.0, 0.0], None).unwrap();
        index.stream_add_data(9, &[0.0, 1.0], None).unwrap();

        let resolver = IndexResolver::new(&index);
        assert_eq!(resolver.offsets_for_labels(&[9, 8, 7]).unwrap(), vec![1, 0]);
    }
}
