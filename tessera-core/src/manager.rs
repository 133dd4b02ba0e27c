//! Index manager tying the vector index and the scalar index together.
//!
//! An `IndexManager` owns one vector index, one scalar index and the
//! manager metadata behind a single reader/writer lock:
//! - `search` and `dump` take the shared lock
//! - `add_data` and `delete_data` take the exclusive lock for a whole batch
//!
//! Persisted layout:
//!
//! ```text
//! <dir>/
//!   manager_meta.json
//!   vector_index/
//!   scalar_index/
//! ```

use std::fs;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::meta::ManagerMeta;
use crate::query::{parse_dsl, total_count_json};
use crate::scalar::{FieldsDict, FilterContext, ScalarIndex};
use crate::vector::{create_index, IndexResolver, RecallRequest, SparseDatapoint, VectorIndex};

/// Metadata file name inside a dump directory.
pub const MANAGER_META_FILE: &str = "manager_meta.json";
pub const VECTOR_INDEX_DIR: &str = "vector_index";
pub const SCALAR_INDEX_DIR: &str = "scalar_index";

/// One search call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Filter and sorter DSL; empty for none.
    pub dsl: String,
    /// Dense query vector; empty skips vector recall.
    pub query: Vec<f32>,
    pub topk: usize,
    pub sparse_raw_terms: Vec<String>,
    pub sparse_values: Vec<f32>,
}

impl SearchRequest {
    /// Vector recall of `topk` rows for `query`.
    pub fn new(query: Vec<f32>, topk: usize) -> Self {
        Self {
            query,
            topk,
            ..Default::default()
        }
    }

    /// Scalar-only request carrying just a DSL.
    pub fn dsl_only(dsl: impl Into<String>) -> Self {
        Self {
            dsl: dsl.into(),
            ..Default::default()
        }
    }

    /// Sets the DSL. Chainable.
    pub fn with_dsl(mut self, dsl: impl Into<String>) -> Self {
        self.dsl = dsl.into();
        self
    }

    /// Sets sparse query terms. Chainable.
    pub fn with_sparse(mut self, terms: Vec<String>, values: Vec<f32>) -> Self {
        self.sparse_raw_terms = terms;
        self.sparse_values = values;
        self
    }
}

/// Labels with parallel scores, plus sorter side-channel JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub labels: Vec<u64>,
    pub scores: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_json: Option<Map<String, Value>>,
    pub result_num: usize,
}

impl SearchResult {
    fn new(labels: Vec<u64>, scores: Vec<f32>, extra_json: Option<Map<String, Value>>) -> Self {
        Self {
            result_num: labels.len(),
            labels,
            scores,
            extra_json,
        }
    }
}

/// Insert or overwrite one row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddDataRequest {
    pub label: u64,
    pub vector: Vec<f32>,
    pub sparse_raw_terms: Vec<String>,
    pub sparse_values: Vec<f32>,
    /// Scalar fields of the row as a JSON object.
    pub fields_json: String,
    /// Fields previously written for this label, removed before adding.
    pub old_fields_json: String,
}

impl AddDataRequest {
    pub fn new(label: u64, vector: Vec<f32>) -> Self {
        Self {
            label,
            vector,
            ..Default::default()
        }
    }

    /// Sets the fields JSON. Chainable.
    pub fn with_fields(mut self, fields_json: impl Into<String>) -> Self {
        self.fields_json = fields_json.into();
        self
    }

    /// Sets the previous fields JSON. Chainable.
    pub fn with_old_fields(mut self, old_fields_json: impl Into<String>) -> Self {
        self.old_fields_json = old_fields_json.into();
        self
    }

    /// Sets sparse terms. Chainable.
    pub fn with_sparse(mut self, terms: Vec<String>, values: Vec<f32>) -> Self {
        self.sparse_raw_terms = terms;
        self.sparse_values = values;
        self
    }
}

/// Remove one row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteDataRequest {
    pub label: u64,
    pub old_fields_json: String,
}

impl DeleteDataRequest {
    pub fn new(label: u64) -> Self {
        Self {
            label,
            old_fields_json: String::new(),
        }
    }

    /// Sets the fields JSON the row was written with. Chainable.
    pub fn with_old_fields(mut self, old_fields_json: impl Into<String>) -> Self {
        self.old_fields_json = old_fields_json.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResult {
    pub update_timestamp: u64,
}

fn sparse_of(terms: &[String], values: &[f32]) -> Result<Option<SparseDatapoint>> {
    if terms.is_empty() && values.is_empty() {
        return Ok(None);
    }
    SparseDatapoint::new(terms, values).map(Some)
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

struct ManagerState {
    meta: ManagerMeta,
    vector: Box<dyn VectorIndex>,
    scalar: ScalarIndex,
}

impl ManagerState {
    fn apply_add(&mut self, item: &AddDataRequest) -> Result<()> {
        let fields = FieldsDict::parse(&item.fields_json)?;
        let old_fields = FieldsDict::parse(&item.old_fields_json)?;
        let sparse = sparse_of(&item.sparse_raw_terms, &item.sparse_values)?;

        self.vector
            .stream_add_data(item.label, &item.vector, sparse.as_ref())?;
        let offset = self
            .vector
            .offset_by_label(item.label)
            .ok_or(Error::NotFound(item.label))?;
        self.scalar.add_row_data(offset, &fields, &old_fields);
        Ok(())
    }

    fn apply_delete(&mut self, item: &DeleteDataRequest) -> Result<bool> {
        let old_fields = FieldsDict::parse(&item.old_fields_json)?;
        let Some(offset) = self.vector.offset_by_label(item.label) else {
            debug!(label = item.label, "delete of unknown label ignored");
            return Ok(false);
        };
        self.scalar.delete_row_data(offset, &old_fields);
        self.vector.stream_delete_data(item.label)
    }

    /// The only place the update timestamp moves.
    fn commit_batch(&mut self) {
        let previous = self.meta.update_timestamp;
        self.meta.update_timestamp = now_nanos().max(previous.saturating_add(1));
    }

    fn snapshot_meta(&self) -> ManagerMeta {
        let mut meta = self.meta.clone();
        meta.vector_index = self.vector.meta_snapshot();
        meta
    }
}

/// Hybrid scalar and vector index.
///
/// # Example
///
/// ```
/// use tessera_core::{AddDataRequest, IndexManager, SearchRequest};
///
/// let manager = IndexManager::open(
///     r#"{"VectorIndex": {"IndexType": "flat", "Dimension": 2},
///         "ScalarIndex": [{"FieldName": "color", "FieldType": "string"}]}"#,
/// )
/// .unwrap();
///
/// manager
///     .add_data(&[
///         AddDataRequest::new(1, vec![1.0, 0.0]).with_fields(r#"{"color": "red"}"#),
///         AddDataRequest::new(2, vec![0.0, 1.0]).with_fields(r#"{"color": "blue"}"#),
///     ])
///     .unwrap();
///
/// let request = SearchRequest::new(vec![1.0, 0.0], 10)
///     .with_dsl(r#"{"op": "must", "field": "color", "conds": ["blue"]}"#);
/// assert_eq!(manager.search(&request).unwrap().labels, vec![2]);
/// ```
pub struct IndexManager {
    state: RwLock<ManagerState>,
}

impl IndexManager {
    /// Loads `path_or_json` if it names an existing directory, otherwise
    /// builds an empty index from it as a JSON descriptor.
    pub fn open(path_or_json: &str) -> Result<Self> {
        let path = Path::new(path_or_json);
        if path.is_dir() {
            return Self::load(path);
        }
        let meta = ManagerMeta::from_json(path_or_json).map_err(|e| match e {
            Error::InvalidConfig(msg) => Error::InvalidConfig(format!(
                "not an index directory or a valid descriptor: {}",
                msg
            )),
            other => other,
        })?;
        Self::from_meta(meta)
    }

    /// Builds an empty index described by `meta`.
    pub fn from_meta(meta: ManagerMeta) -> Result<Self> {
        meta.validate()?;
        let vector = create_index(&meta.vector_index)?;
        let scalar = match &meta.scalar_index {
            Some(fields) => ScalarIndex::new(fields),
            None => {
                warn!(
                    index = %meta.index_name,
                    "descriptor has no ScalarIndex; using an empty scalar index"
                );
                ScalarIndex::default()
            }
        };
        Ok(Self::with_parts(meta, vector, scalar))
    }

    /// Loads an index dumped under `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let meta = ManagerMeta::load(dir.join(MANAGER_META_FILE))?;
        let mut vector = create_index(&meta.vector_index)?;
        vector.load(&dir.join(VECTOR_INDEX_DIR))?;
        let scalar = ScalarIndex::open(dir.join(SCALAR_INDEX_DIR))?;
        info!(
            path = %dir.display(),
            rows = vector.data_num(),
            update_timestamp = meta.update_timestamp,
            "loaded index"
        );
        Ok(Self::with_parts(meta, vector, scalar))
    }

    fn with_parts(meta: ManagerMeta, vector: Box<dyn VectorIndex>, scalar: ScalarIndex) -> Self {
        Self {
            state: RwLock::new(ManagerState {
                meta,
                vector,
                scalar,
            }),
        }
    }

    /// Runs a filter, sorter or vector search.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let start = Instant::now();
        let ctx = parse_dsl(&request.dsl)?;
        let sparse = sparse_of(&request.sparse_raw_terms, &request.sparse_values)
            .map_err(|e| Error::InvalidQuery(e.to_string()))?;

        let state = self.state.read();
        let bitmap = match &ctx.filter {
            Some(filter) => {
                let resolver = IndexResolver::new(state.vector.as_ref());
                let filter_ctx = FilterContext::new(state.scalar.field_sets(), &resolver);
                let bitmap = filter.evaluate(&filter_ctx).ok_or_else(|| {
                    error!(dsl = %request.dsl, "filter produced no bitmap");
                    Error::BitmapUnavailable(request.dsl.clone())
                })?;
                Some(bitmap)
            }
            None => None,
        };

        let result = if let Some(sorter) = &ctx.sorter {
            if sorter.is_total_count() && bitmap.is_none() {
                SearchResult::new(
                    Vec::new(),
                    Vec::new(),
                    Some(total_count_json(state.vector.data_num())),
                )
            } else {
                let output =
                    sorter.compute(state.scalar.field_sets(), bitmap.as_ref(), request.topk)?;
                let mut labels = Vec::with_capacity(output.offsets.len());
                let mut scores = Vec::with_capacity(output.offsets.len());
                for (&offset, &score) in output.offsets.iter().zip(&output.scores) {
                    match state.vector.label_by_offset(offset) {
                        Some(label) => {
                            labels.push(label);
                            scores.push(score);
                        }
                        None => debug!(offset, "sorter offset has no label"),
                    }
                }
                SearchResult::new(labels, scores, output.extra_json)
            }
        } else if !request.query.is_empty() {
            let recall = state.vector.recall(
                &RecallRequest::new(&request.query, request.topk)
                    .with_bitmap(bitmap.as_ref())
                    .with_sparse(sparse.as_ref()),
            )?;
            SearchResult::new(recall.labels, recall.scores, None)
        } else {
            SearchResult::default()
        };
        drop(state);

        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            results = result.result_num,
            "search"
        );
        Ok(result)
    }

    /// Inserts or overwrites every item. Bad items are logged and skipped.
    pub fn add_data(&self, batch: &[AddDataRequest]) -> Result<()> {
        let start = Instant::now();
        let mut state = self.state.write();
        let mut applied = 0usize;
        for item in batch {
            match state.apply_add(item) {
                Ok(()) => applied += 1,
                Err(e) => warn!(label = item.label, error = %e, "skipping add_data item"),
            }
        }
        if applied > 0 {
            state.commit_batch();
        }
        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            batch = batch.len(),
            applied,
            "add_data"
        );
        Ok(())
    }

    /// Removes every item's label. Unknown labels are ignored.
    pub fn delete_data(&self, batch: &[DeleteDataRequest]) -> Result<()> {
        let start = Instant::now();
        let mut state = self.state.write();
        let mut removed = 0usize;
        for item in batch {
            match state.apply_delete(item) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(label = item.label, error = %e, "skipping delete_data item"),
            }
        }
        if removed > 0 {
            state.commit_batch();
        }
        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            batch = batch.len(),
            removed,
            "delete_data"
        );
        Ok(())
    }

    /// Writes the index under `dir` and returns its update timestamp.
    ///
    /// The metadata file is written last. Concurrent dumps into the same
    /// directory must be serialized by the caller.
    pub fn dump<P: AsRef<Path>>(&self, dir: P) -> Result<u64> {
        let start = Instant::now();
        let dir = dir.as_ref();
        let state = self.state.read();

        let vector_dir = dir.join(VECTOR_INDEX_DIR);
        let scalar_dir = dir.join(SCALAR_INDEX_DIR);
        for sub in [&vector_dir, &scalar_dir] {
            fs::create_dir_all(sub).map_err(|e| {
                error!(path = %sub.display(), error = %e, "create dump dir failed");
                Error::IoError(format!("create dir failed: {}", e))
            })?;
        }
        state.vector.dump(&vector_dir)?;
        state.scalar.dump(&scalar_dir)?;

        let meta = state.snapshot_meta();
        meta.save(dir.join(MANAGER_META_FILE))?;

        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            path = %dir.display(),
            "dump"
        );
        Ok(meta.update_timestamp)
    }

    pub fn get_state(&self) -> StateResult {
        StateResult {
            update_timestamp: self.state.read().meta.update_timestamp,
        }
    }

    /// Current metadata, with vector counts filled in.
    pub fn meta(&self) -> ManagerMeta {
        self.state.read().snapshot_meta()
    }

    /// Number of live rows.
    pub fn data_num(&self) -> u64 {
        self.state.read().vector.data_num()
    }

    pub fn offset_by_label(&self, label: u64) -> Option<u32> {
        self.state.read().vector.offset_by_label(label)
    }

    pub fn label_by_offset(&self, offset: u32) -> Option<u64> {
        self.state.read().vector.label_by_offset(offset)
    }
}

#[cfg(feature = "async")]
mod async_api {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn join_error(e: tokio::task::JoinError) -> Error {
        Error::IoError(format!("spawn_blocking failed: {}", e))
    }

    /// Async wrapper for IndexManager.
    ///
    /// Every call runs on `spawn_blocking`; the manager itself stays
    /// synchronous.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tessera_core::{AsyncIndexManager, SearchRequest};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let manager = AsyncIndexManager::open(
    ///         r#"{"VectorIndex": {"IndexType": "flat", "Dimension": 4}}"#.to_string(),
    ///     )
    ///     .await
    ///     .unwrap();
    ///     let result = manager.search(SearchRequest::new(vec![0.1; 4], 10)).await.unwrap();
    /// }
    /// ```
    #[derive(Clone)]
    pub struct AsyncIndexManager {
        inner: Arc<IndexManager>,
    }

    impl AsyncIndexManager {
        /// Opens a directory or descriptor asynchronously.
        pub async fn open(path_or_json: String) -> Result<Self> {
            let manager = tokio::task::spawn_blocking(move || IndexManager::open(&path_or_json))
                .await
                .map_err(join_error)??;
            Ok(Self::from_sync(manager))
        }

        /// Wraps an existing IndexManager.
        pub fn from_sync(manager: IndexManager) -> Self {
            Self {
                inner: Arc::new(manager),
            }
        }

        pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
            let inner = Arc::clone(&self.inner);
            tokio::task::spawn_blocking(move || inner.search(&request))
                .await
                .map_err(join_error)?
        }

        pub async fn add_data(&self, batch: Vec<AddDataRequest>) -> Result<()> {
            let inner = Arc::clone(&self.inner);
            tokio::task::spawn_blocking(move || inner.add_data(&batch))
                .await
                .map_err(join_error)?
        }

        pub async fn delete_data(&self, batch: Vec<DeleteDataRequest>) -> Result<()> {
            let inner = Arc::clone(&self.inner);
            tokio::task::spawn_blocking(move || inner.delete_data(&batch))
                .await
                .map_err(join_error)?
        }

        pub async fn dump(&self, dir: PathBuf) -> Result<u64> {
            let inner = Arc::clone(&self.inner);
            tokio::task::spawn_blocking(move || inner.dump(&dir))
                .await
                .map_err(join_error)?
        }

        pub fn get_state(&self) -> StateResult {
            self.inner.get_state()
        }

        /// Returns reference to inner sync manager.
        pub fn inner(&self) -> &IndexManager {
            &self.inner
        }
    }
}

#[cfg(feature = "async")]
pub use async_api::AsyncIndexManager;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TOTAL_COUNT_KEY;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir()
            .join("tessera_test_manager")
            .join(format!("manager_{}_{}", std::process::id(), id));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    const DESCRIPTOR: &str = r#"{
        "CollectionName": "test",
        "IndexName": "idx",
        "VectorIndex": {"IndexType": "flat", "Dimension": 2, "Distance": "ip"},
        "ScalarIndex": [
            {"FieldName": "color", "FieldType": "string"},
            {"FieldName": "price", "FieldType": "int64"}
        ]
    }"#;

    fn manager() -> IndexManager {
        let manager = IndexManager::open(DESCRIPTOR).unwrap();
        manager
            .add_data(&[
                AddDataRequest::new(1, vec![1.0, 0.0]).with_fields(r#"{"color": "red", "price": 10}"#),
                AddDataRequest::new(2, vec![0.9, 0.1]).with_fields(r#"{"color": "blue", "price": 20}"#),
                AddDataRequest::new(3, vec![0.5, 0.5]).with_fields(r#"{"color": "red", "price": 30}"#),
            ])
            .unwrap();
        manager
    }

    fn total_count(manager: &IndexManager, dsl: &str) -> u64 {
        let result = manager.search(&SearchRequest::dsl_only(dsl)).unwrap();
        result.extra_json.unwrap()[TOTAL_COUNT_KEY].as_u64().unwrap()
    }

    #[test]
    fn test_open_rejects_bad_input() {
        assert!(matches!(
            IndexManager::open("/definitely/not/a/dir"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            IndexManager::open(r#"{"VectorIndex": {"IndexType": "hnsw", "Dimension": 2}}"#),
            Err(Error::UnsupportedIndexType(_))
        ));
    }

    #[test]
    fn test_filtered_recall() {
        let manager = manager();
        let request = SearchRequest::new(vec![1.0, 0.0], 2)
            .with_dsl(r#"{"op": "must", "field": "color", "conds": ["red"]}"#);
        let result = manager.search(&request).unwrap();
        assert_eq!(result.labels, vec![1, 3]);
        assert_eq!(result.result_num, 2);
        assert!(result.scores[0] > result.scores[1]);
    }

    #[test]
    fn test_sorter_results_map_to_labels() {
        let manager = manager();
        let request = SearchRequest::dsl_only(r#"{"op": "sort", "field": "price", "order": "asc"}"#);
        let result = manager.search(&SearchRequest { topk: 2, ..request }).unwrap();
        assert_eq!(result.labels, vec![1, 2]);
        assert_eq!(result.scores, vec![10.0, 20.0]);
    }

    #[test]
    fn test_count_shortcut_and_filtered_count() {
        let manager = manager();
        assert_eq!(total_count(&manager, r#"{"op": "count"}"#), 3);
        assert_eq!(
            total_count(
                &manager,
                r#"{"filter": {"op": "range", "field": "price", "gte": 20},
                    "counter": {"op": "count"}}"#
            ),
            2
        );
    }

    #[test]
    fn test_empty_request_is_noop() {
        let manager = manager();
        let result = manager.search(&SearchRequest::default()).unwrap();
        assert_eq!(result, SearchResult::default());
    }

    #[test]
    fn test_search_errors() {
        let manager = manager();
        assert!(matches!(
            manager.search(&SearchRequest::dsl_only("{bad")),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            manager.search(&SearchRequest::dsl_only(
                r#"{"op": "must", "field": "shape", "conds": ["x"]}"#
            )),
            Err(Error::BitmapUnavailable(_))
        ));
        assert!(matches!(
            manager.search(&SearchRequest::new(vec![1.0, 0.0], 1).with_sparse(vec!["a".into()], vec![])),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_bad_items_are_skipped() {
        let manager = IndexManager::open(DESCRIPTOR).unwrap();
        manager
            .add_data(&[
                AddDataRequest::new(1, vec![1.0, 0.0]).with_fields("not json"),
                AddDataRequest::new(2, vec![1.0, 0.0, 0.0]),
                AddDataRequest::new(3, vec![0.0, 1.0]).with_fields(r#"{"color": "red"}"#),
            ])
            .unwrap();
        assert_eq!(manager.data_num(), 1);
        assert!(manager.offset_by_label(3).is_some());
    }

    #[test]
    fn test_timestamp_once_per_changed_batch() {
        let manager = IndexManager::open(DESCRIPTOR).unwrap();
        assert_eq!(manager.get_state().update_timestamp, 0);

        manager
            .add_data(&[
                AddDataRequest::new(1, vec![1.0, 0.0]),
                AddDataRequest::new(2, vec![0.0, 1.0]),
            ])
            .unwrap();
        let first = manager.get_state().update_timestamp;
        assert!(first > 0);

        manager.add_data(&[]).unwrap();
        manager.delete_data(&[DeleteDataRequest::new(99)]).unwrap();
        manager
            .add_data(&[AddDataRequest::new(5, vec![1.0])])
            .unwrap();
        assert_eq!(manager.get_state().update_timestamp, first);

        manager.delete_data(&[DeleteDataRequest::new(1)]).unwrap();
        assert!(manager.get_state().update_timestamp > first);
    }

    #[test]
    fn test_delete_clears_scalar_row() {
        let manager = manager();
        manager
            .delete_data(&[DeleteDataRequest::new(1).with_old_fields(r#"{"color": "red", "price": 10}"#)])
            .unwrap();

        let result = manager
            .search(&SearchRequest::dsl_only(r#"{"op": "count", "field": "color"}"#))
            .unwrap();
        let counts = result.extra_json.unwrap();
        assert_eq!(counts["red"], 1);
        assert_eq!(counts["blue"], 1);
        assert_eq!(total_count(&manager, r#"{"op": "count"}"#), 2);
    }

    #[test]
    fn test_dump_and_load() {
        let dir = temp_dir();
        let manager = manager();
        let ts = manager.dump(&dir).unwrap();
        assert_eq!(ts, manager.get_state().update_timestamp);
        assert!(dir.join(MANAGER_META_FILE).exists());
        assert!(dir.join(VECTOR_INDEX_DIR).is_dir());
        assert!(dir.join(SCALAR_INDEX_DIR).is_dir());

        let dir_str = dir.to_string_lossy().to_string();
        let restored = IndexManager::open(&dir_str).unwrap();
        assert_eq!(restored.get_state().update_timestamp, ts);
        assert_eq!(restored.data_num(), 3);
        assert_eq!(restored.meta(), manager.meta());

        let request = SearchRequest::new(vec![1.0, 0.0], 2)
            .with_dsl(r#"{"op": "must", "field": "color", "conds": ["red"]}"#);
        assert_eq!(
            restored.search(&request).unwrap(),
            manager.search(&request).unwrap()
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_request_serde_defaults() {
        let request: AddDataRequest =
            serde_json::from_str(r#"{"label": 4, "vector": [1.0, 2.0]}"#).unwrap();
        assert_eq!(request, AddDataRequest::new(4, vec![1.0, 2.0]));

        let request: SearchRequest = serde_json::from_str(r#"{"topk": 3}"#).unwrap();
        assert!(request.dsl.is_empty());
        assert_eq!(request.topk, 3);
    }
}
