//! # Tessera
//!
//! **An embedded hybrid search engine: bitmap scalar filtering plus vector recall.**
//!
//! Tessera keeps one in-process index per collection and answers three kinds
//! of questions against it:
//!
//! - **Filtered recall**: nearest neighbours among rows matching a filter
//! - **Scalar sort**: top-k rows by one or more numeric fields
//! - **Counting**: total or per-value counts under a filter
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **Flat vector index** | Exact recall with `ip`, `l2` and `cosine` scores |
//! | **Hybrid scoring** | Dense and sparse term weights blended by one alpha |
//! | **Bitmap filters** | `must`, `range`, path depth, prefix, label sets over roaring bitmaps |
//! | **Persistence** | Checksummed dump/load of the whole index directory |
//! | **Row codec** | Compact schema-driven binary rows |
//! | **KV stores** | WAL-backed durable store and an in-memory store behind one trait |
//! | **Async API** | Tokio-compatible wrapper (feature flag) |
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera::prelude::*;
//!
//! let manager = IndexManager::open(
//!     r#"{
//!         "VectorIndex": {"IndexType": "flat", "Dimension": 3, "Distance": "ip"},
//!         "ScalarIndex": [
//!             {"FieldName": "color", "FieldType": "string"},
//!             {"FieldName": "price", "FieldType": "int64"}
//!         ]
//!     }"#,
//! )
//! .unwrap();
//!
//! manager
//!     .add_data(&[
//!         AddDataRequest::new(1, vec![1.0, 0.0, 0.0]).with_fields(r#"{"color": "red", "price": 5}"#),
//!         AddDataRequest::new(2, vec![0.9, 0.1, 0.0]).with_fields(r#"{"color": "blue", "price": 7}"#),
//!         AddDataRequest::new(3, vec![0.7, 0.3, 0.0]).with_fields(r#"{"color": "red", "price": 9}"#),
//!     ])
//!     .unwrap();
//!
//! // Vector recall restricted to red rows
//! let request = SearchRequest::new(vec![1.0, 0.0, 0.0], 10)
//!     .with_dsl(r#"{"op": "must", "field": "color", "conds": ["red"]}"#);
//! let result = manager.search(&request).unwrap();
//! assert_eq!(result.labels, vec![1, 3]);
//!
//! // Most expensive row
//! let request = SearchRequest::dsl_only(r#"{"op": "sort", "field": "price", "topk": 1}"#);
//! assert_eq!(manager.search(&request).unwrap().labels, vec![3]);
//! ```
//!
//! ### Persistence
//!
//! ```no_run
//! use tessera::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let manager = IndexManager::open("./my_index")?;
//!     manager.delete_data(&[DeleteDataRequest::new(42)])?;
//!     let timestamp = manager.dump("./my_index")?;
//!     println!("dumped at {}", timestamp);
//!     Ok(())
//! }
//! ```
//!
//! ## Query DSL
//!
//! A DSL string carries a `filter`, a `sorter` (or `counter`), or both. A
//! bare operator object works too:
//!
//! ```json
//! {"filter": {"op": "and", "conds": [
//!     {"op": "must", "field": "dir", "conds": ["/docs"], "para": "-d=1"},
//!     {"op": "range", "field": "price", "gte": 10, "lt": 20}
//!  ]},
//!  "counter": {"op": "count", "field": "color"}}
//! ```
//!
//! ## Crate Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | Enables `AsyncIndexManager` for tokio compatibility |
//!
//! ```toml
//! [dependencies]
//! tessera = { version = "0.1", features = ["async"] }
//! ```
//!
//! ## Architecture
//!
//! - **`tessera-core`**: Core library with no async runtime dependency
//! - **`tessera`**: Main crate that re-exports everything
//!
//! ## Thread Safety
//!
//! - [`IndexManager`] holds one `RwLock`: searches and dumps share it,
//!   write batches hold it exclusively
//! - [`FlatIndex`] and [`ScalarIndex`] are plain data; the manager owns them
//! - [`AsyncIndexManager`] is `Clone` and safe to share across tasks

// Re-export everything from core
pub use tessera_core::*;
