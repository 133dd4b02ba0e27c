//! Flat index for exact nearest neighbor search.
//!
//! Scores every candidate row against the query. Rows live in one
//! contiguous buffer; deleting a row moves the last row into its slot, so
//! slots shift while offsets stay put.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::path::Path;

use tracing::{debug, error};

use super::{RecallRequest, RecallResult, SparseDatapoint, VectorIndex};
use crate::distance::{cosine_distance, dot_product, euclidean_distance_squared, DistanceMetric};
use crate::error::{Error, Result};
use crate::meta::VectorIndexMeta;
use crate::row::RowReader;
use crate::storage::{read_snapshot, write_snapshot};

pub(crate) const INDEX_TYPE: &str = "flat";

const DATA_FILE: &str = "index_flat.data";
const SPARSE_FILE: &str = "sparse.data";
const DATA_MAGIC: &[u8; 4] = b"TFLT";
const SPARSE_MAGIC: &[u8; 4] = b"TSPR";

/// A scored row. Greater means better: higher score, then lower label.
#[derive(Debug, Clone, Copy)]
struct Scored {
    score: f32,
    label: u64,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Scored {
    /// NaN ranks below every real score.
    fn rank(&self) -> f32 {
        if self.score.is_nan() {
            f32::NEG_INFINITY
        } else {
            self.score
        }
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .total_cmp(&other.rank())
            .then_with(|| other.label.cmp(&self.label))
    }
}

/// Exhaustive index over dense vectors with optional sparse term weights.
///
/// # Example
///
/// ```
/// use tessera_core::{DistanceMetric, FlatIndex, RecallRequest, VectorIndex, VectorIndexMeta};
///
/// let mut index = FlatIndex::new(VectorIndexMeta::flat(3, DistanceMetric::Cosine)).unwrap();
/// index.stream_add_data(1, &[1.0, 0.0, 0.0], None).unwrap();
/// index.stream_add_data(2, &[0.0, 1.0, 0.0], None).unwrap();
/// index.stream_add_data(3, &[0.9, 0.1, 0.0], None).unwrap();
///
/// let result = index.recall(&RecallRequest::new(&[1.0, 0.0, 0.0], 2)).unwrap();
/// assert_eq!(result.labels, vec![1, 3]);
/// ```
#[derive(Debug)]
pub struct FlatIndex {
    meta: VectorIndexMeta,
    dimension: usize,
    /// Row-major dense vectors, one slot per live row.
    vectors: Vec<f32>,
    slot_labels: Vec<u64>,
    slot_offsets: Vec<u32>,
    /// Per-slot sparse weights; only maintained when sparse is enabled.
    sparse: Vec<SparseDatapoint>,
    label_to_offset: HashMap<u64, u32>,
    offset_to_slot: HashMap<u32, usize>,
    next_offset: u32,
}

impl FlatIndex {
    /// Creates an empty index for `meta`.
    pub fn new(meta: VectorIndexMeta) -> Result<Self> {
        if meta.dimension == 0 {
            return Err(Error::InvalidConfig("vector dimension must be non-zero".into()));
        }
        let dimension = usize::try_from(meta.dimension)
            .map_err(|_| Error::InvalidConfig(format!("dimension {} too large", meta.dimension)))?;
        Ok(Self {
            meta,
            dimension,
            vectors: Vec::new(),
            slot_labels: Vec::new(),
            slot_offsets: Vec::new(),
            sparse: Vec::new(),
            label_to_offset: HashMap::new(),
            offset_to_slot: HashMap::new(),
            next_offset: 0,
        })
    }

    /// Opens the index dumped under `dir`.
    pub fn open(meta: VectorIndexMeta, dir: &Path) -> Result<Self> {
        let mut index = Self::new(meta)?;
        index.load(dir)?;
        Ok(index)
    }

    pub fn metric(&self) -> DistanceMetric {
        self.meta.distance
    }

    pub fn len(&self) -> usize {
        self.slot_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_labels.is_empty()
    }

    /// Dense vector stored for `label`.
    pub fn get(&self, label: u64) -> Option<&[f32]> {
        let offset = self.label_to_offset.get(&label)?;
        let slot = *self.offset_to_slot.get(offset)?;
        Some(self.slot_vector(slot))
    }

    fn sparse_enabled(&self) -> bool {
        self.meta.enable_sparse
    }

    fn slot_vector(&self, slot: usize) -> &[f32] {
        &self.vectors[slot * self.dimension..(slot + 1) * self.dimension]
    }

    fn check_dimension(&self, got: usize) -> Result<()> {
        if got != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got,
            });
        }
        Ok(())
    }

    fn check_finite(values: impl IntoIterator<Item = f32>, what: &str) -> Result<()> {
        if values.into_iter().all(f32::is_finite) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!("{} contains NaN or infinity", what)))
        }
    }

    fn sparse_score(&self, row: &SparseDatapoint, query: &SparseDatapoint) -> f32 {
        match self.meta.distance {
            DistanceMetric::L2 => {
                let mut dist: f32 = query
                    .iter()
                    .map(|(term, q)| {
                        let d = q - row.get(term).unwrap_or(0.0);
                        d * d
                    })
                    .sum();
                dist += row
                    .iter()
                    .filter(|(term, _)| query.get(term).is_none())
                    .map(|(_, v)| v * v)
                    .sum::<f32>();
                1.0 - dist
            }
            DistanceMetric::InnerProduct | DistanceMetric::Cosine => query
                .iter()
                .filter_map(|(term, q)| row.get(term).map(|v| q * v))
                .sum(),
        }
    }

    fn score_slot(&self, slot: usize, query: &[f32], sparse: Option<&SparseDatapoint>) -> f32 {
        let dense = self.meta.distance.score(query, self.slot_vector(slot));
        let alpha = self.meta.search_with_sparse_logit_alpha;
        match sparse {
            Some(q) if self.sparse_enabled() && alpha != 0.0 && !q.is_empty() => {
                let row = &self.sparse[slot];
                dense * (1.0 - alpha) + self.sparse_score(row, q) * alpha
            }
            _ => dense,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let row_len = 8 + 4 + self.dimension * 4;
        let mut buf = Vec::with_capacity(20 + self.len() * row_len);
        buf.extend_from_slice(&(self.dimension as u64).to_le_bytes());
        buf.extend_from_slice(&(self.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.next_offset.to_le_bytes());
        for slot in 0..self.len() {
            buf.extend_from_slice(&self.slot_labels[slot].to_le_bytes());
            buf.extend_from_slice(&self.slot_offsets[slot].to_le_bytes());
            for v in self.slot_vector(slot) {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf
    }

    fn decode(&mut self, buf: &[u8]) -> Result<()> {
        let truncated = || Error::Corrupted("flat index data truncated".to_string());
        let mut reader = RowReader::at(buf, 0);

        let dimension = reader.u64_le().ok_or_else(truncated)?;
        if dimension != self.dimension as u64 {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: dimension as usize,
            });
        }
        let count = reader.u64_le().ok_or_else(truncated)? as usize;
        let next_offset = reader.u32_le().ok_or_else(truncated)?;

        let mut vectors = Vec::with_capacity(count.saturating_mul(self.dimension).min(buf.len()));
        let mut slot_labels = Vec::new();
        let mut slot_offsets = Vec::new();
        let mut label_to_offset = HashMap::new();
        let mut offset_to_slot = HashMap::new();
        for slot in 0..count {
            let label = reader.u64_le().ok_or_else(truncated)?;
            let offset = reader.u32_le().ok_or_else(truncated)?;
            for _ in 0..self.dimension {
                vectors.push(reader.f32_le().ok_or_else(truncated)?);
            }
            if offset >= next_offset
                || label_to_offset.insert(label, offset).is_some()
                || offset_to_slot.insert(offset, slot).is_some()
            {
                return Err(Error::Corrupted(format!(
                    "flat index slot {} has a duplicate or out-of-range entry",
                    slot
                )));
            }
            slot_labels.push(label);
            slot_offsets.push(offset);
        }
        if reader.remaining() != 0 {
            return Err(Error::Corrupted("flat index data has trailing bytes".to_string()));
        }

        self.vectors = vectors;
        self.slot_labels = slot_labels;
        self.slot_offsets = slot_offsets;
        self.label_to_offset = label_to_offset;
        self.offset_to_slot = offset_to_slot;
        self.next_offset = next_offset;
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn index_type(&self) -> &'static str {
        INDEX_TYPE
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn data_num(&self) -> u64 {
        self.len() as u64
    }

    fn stream_add_data(
        &mut self,
        label: u64,
        dense: &[f32],
        sparse: Option<&SparseDatapoint>,
    ) -> Result<u32> {
        self.check_dimension(dense.len())?;
        Self::check_finite(dense.iter().copied(), "dense vector")?;
        if let Some(sparse) = sparse {
            Self::check_finite(sparse.iter().map(|(_, v)| v), "sparse vector")?;
        }

        if let Some(&offset) = self.label_to_offset.get(&label) {
            let slot = *self
                .offset_to_slot
                .get(&offset)
                .ok_or_else(|| Error::Corrupted(format!("offset {} has no slot", offset)))?;
            let dim = self.dimension;
            self.vectors[slot * dim..(slot + 1) * dim].copy_from_slice(dense);
            if self.sparse_enabled() {
                self.sparse[slot] = sparse.cloned().unwrap_or_default();
            }
            return Ok(offset);
        }

        let offset = self.next_offset;
        self.next_offset = offset
            .checked_add(1)
            .ok_or_else(|| Error::InvalidConfig("flat index offsets exhausted".into()))?;

        let slot = self.len();
        self.vectors.extend_from_slice(dense);
        self.slot_labels.push(label);
        self.slot_offsets.push(offset);
        if self.sparse_enabled() {
            self.sparse.push(sparse.cloned().unwrap_or_default());
        }
        self.label_to_offset.insert(label, offset);
        self.offset_to_slot.insert(offset, slot);
        Ok(offset)
    }

    fn stream_delete_data(&mut self, label: u64) -> Result<bool> {
        let Some(offset) = self.label_to_offset.remove(&label) else {
            return Ok(false);
        };
        let slot = self
            .offset_to_slot
            .remove(&offset)
            .ok_or_else(|| Error::Corrupted(format!("offset {} has no slot", offset)))?;

        let last = self.len() - 1;
        let dim = self.dimension;
        if slot != last {
            self.vectors
                .copy_within(last * dim..(last + 1) * dim, slot * dim);
            let moved = self.slot_offsets[last];
            self.offset_to_slot.insert(moved, slot);
        }
        self.vectors.truncate(last * dim);
        self.slot_labels.swap_remove(slot);
        self.slot_offsets.swap_remove(slot);
        if self.sparse_enabled() {
            self.sparse.swap_remove(slot);
        }
        Ok(true)
    }

    fn offset_by_label(&self, label: u64) -> Option<u32> {
        self.label_to_offset.get(&label).copied()
    }

    fn label_by_offset(&self, offset: u32) -> Option<u64> {
        self.offset_to_slot
            .get(&offset)
            .map(|&slot| self.slot_labels[slot])
    }

    fn recall(&self, request: &RecallRequest<'_>) -> Result<RecallResult> {
        if request.topk == 0 {
            return Ok(RecallResult::default());
        }
        self.check_dimension(request.dense.len())?;
        Self::check_finite(request.dense.iter().copied(), "query vector")?;

        let mut heap: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(request.topk + 1);
        let mut consider = |slot: usize| {
            let scored = Scored {
                score: self.score_slot(slot, request.dense, request.sparse),
                label: self.slot_labels[slot],
            };
            heap.push(Reverse(scored));
            if heap.len() > request.topk {
                heap.pop();
            }
        };

        match request.bitmap {
            Some(bitmap) => {
                for offset in bitmap.iter() {
                    if let Some(&slot) = self.offset_to_slot.get(&offset) {
                        consider(slot);
                    }
                }
            }
            None => (0..self.len()).for_each(&mut consider),
        }

        let mut result = RecallResult::default();
        for Reverse(scored) in heap.into_sorted_vec() {
            result.labels.push(scored.label);
            result.scores.push(scored.score);
        }
        Ok(result)
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        let path = dir.join(DATA_FILE);
        let bytes = read_snapshot(&path, DATA_MAGIC).map_err(|e| {
            error!(path = %path.display(), error = %e, "flat index load failed");
            e
        })?;
        self.decode(&bytes)?;

        self.sparse = if self.sparse_enabled() {
            let bytes = read_snapshot(dir.join(SPARSE_FILE), SPARSE_MAGIC)?;
            let sparse: Vec<SparseDatapoint> = serde_json::from_slice(&bytes)
                .map_err(|e| Error::Corrupted(format!("sparse data decode failed: {}", e)))?;
            if sparse.len() != self.len() {
                return Err(Error::Corrupted(format!(
                    "sparse data has {} rows, index has {}",
                    sparse.len(),
                    self.len()
                )));
            }
            sparse
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), rows = self.len(), "loaded flat index");
        Ok(())
    }

    fn dump(&self, dir: &Path) -> Result<()> {
        write_snapshot(dir.join(DATA_FILE), DATA_MAGIC, &self.encode())?;
        if self.sparse_enabled() {
            let bytes = serde_json::to_vec(&self.sparse)
                .map_err(|e| Error::IoError(format!("sparse data encode failed: {}", e)))?;
            write_snapshot(dir.join(SPARSE_FILE), SPARSE_MAGIC, &bytes)?;
        }
        Ok(())
    }

    fn meta_snapshot(&self) -> VectorIndexMeta {
        let mut meta = self.meta.clone();
        meta.element_count = self.data_num();
        meta.max_element_count = u64::from(self.next_offset);
        meta
    }
}
