//! # Tessera Core
//!
//! Core library for Tessera, an embedded hybrid search engine: scalar
//! bitmap filtering and sorting combined with dense/sparse vector recall.
//!
//! The index core is synchronous and has no mandatory runtime dependency.
//!
//! ## Crate Features
//!
//! - `async` - Enables [`AsyncIndexManager`] for tokio-compatible async operations
//!
//! ## Core Types
//!
//! ### Index
//!
//! - [`IndexManager`] - Thread-safe hybrid index with dump/load
//! - [`AsyncIndexManager`] - Async wrapper for tokio compatibility (requires `async` feature)
//! - [`ManagerMeta`] - JSON descriptor and persisted metadata
//!
//! ### Collaborators
//!
//! - [`FlatIndex`] - Exact dense recall with optional sparse hybrid scoring
//! - [`ScalarIndex`] - Roaring bitmap field groups over row offsets
//! - [`FilterOp`] / [`SorterOp`] - Parsed query DSL
//!
//! ### Rows and Storage
//!
//! - [`Schema`] / [`BytesRow`] - Binary row codec
//! - [`KvStore`] - Ordered key-value contract with [`DurableStore`] and [`VolatileStore`]

pub mod distance;
pub mod error;
pub mod kv;
pub mod manager;
pub mod meta;
pub mod query;
pub mod row;
pub mod scalar;
pub mod storage;
pub mod vector;

// Re-exports for convenient access
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use kv::{DurableStore, DurableStoreConfig, KvStore, StorageOp, VolatileStore};
#[cfg(feature = "async")]
pub use manager::AsyncIndexManager;
pub use manager::{
    AddDataRequest, DeleteDataRequest, IndexManager, SearchRequest, SearchResult, StateResult,
};
pub use meta::{ManagerMeta, ScalarFieldMeta, VectorIndexMeta};
pub use query::{parse_dsl, FilterOp, SearchContext, SorterOp};
pub use row::{BytesRow, FieldDef, FieldType, FieldValue, RowAccessor, Schema};
pub use scalar::{FieldSets, FieldsDict, LabelOffsetResolver, ScalarFieldKind, ScalarIndex};
pub use storage::SyncMode;
pub use vector::{FlatIndex, RecallRequest, RecallResult, SparseDatapoint, VectorIndex};

/// Re-export commonly used types for convenience.
///
/// # Example
///
/// ```rust
/// use tessera_core::prelude::*;
///
/// let meta = ManagerMeta::new(VectorIndexMeta::flat(3, DistanceMetric::L2))
///     .with_scalar_fields(vec![ScalarFieldMeta::new("lang", ScalarFieldKind::String)]);
/// let manager = IndexManager::from_meta(meta).unwrap();
/// manager
///     .add_data(&[AddDataRequest::new(1, vec![1.0, 2.0, 3.0]).with_fields(r#"{"lang": "rust"}"#)])
///     .unwrap();
/// assert_eq!(manager.data_num(), 1);
/// ```
pub mod prelude {
    pub use crate::{
        AddDataRequest, BytesRow, DeleteDataRequest, DistanceMetric, DurableStore, Error,
        FieldDef, FieldType, FieldValue, IndexManager, KvStore, ManagerMeta, Result,
        ScalarFieldKind, ScalarFieldMeta, Schema, SearchRequest, SearchResult, VectorIndexMeta,
        VolatileStore,
    };
}
