//! Manager metadata persisted as `manager_meta.json`.
//!
//! The same document doubles as the JSON descriptor a new index is created
//! from:
//!
//! ```json
//! {
//!   "CollectionName": "docs",
//!   "IndexName": "default",
//!   "VectorIndex": {"IndexType": "flat", "Dimension": 4, "Distance": "ip"},
//!   "ScalarIndex": [{"FieldName": "color", "FieldType": "string"}]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::scalar::ScalarFieldKind;

/// The only vector index type currently shipped.
pub const FLAT_INDEX_TYPE: &str = "flat";

/// Metadata of the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VectorIndexMeta {
    pub index_type: String,
    #[serde(default)]
    pub element_count: u64,
    #[serde(default)]
    pub max_element_count: u64,
    pub dimension: u64,
    #[serde(default)]
    pub distance: DistanceMetric,
    #[serde(default = "default_quant")]
    pub quant: String,
    #[serde(default)]
    pub enable_sparse: bool,
    #[serde(default)]
    pub search_with_sparse_logit_alpha: f32,
}

fn default_quant() -> String {
    "float".to_string()
}

impl VectorIndexMeta {
    /// Metadata for a flat index with default options.
    pub fn flat(dimension: u64, distance: DistanceMetric) -> Self {
        Self {
            index_type: FLAT_INDEX_TYPE.to_string(),
            element_count: 0,
            max_element_count: 0,
            dimension,
            distance,
            quant: default_quant(),
            enable_sparse: false,
            search_with_sparse_logit_alpha: 0.0,
        }
    }

    /// Enables hybrid dense/sparse scoring with weight `alpha`. Chainable.
    pub fn with_sparse(mut self, alpha: f32) -> Self {
        self.enable_sparse = true;
        self.search_with_sparse_logit_alpha = alpha;
        self
    }
}

/// One indexed scalar field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalarFieldMeta {
    pub field_name: String,
    pub field_type: ScalarFieldKind,
}

impl ScalarFieldMeta {
    pub fn new(field_name: impl Into<String>, field_type: ScalarFieldKind) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
        }
    }
}

/// Manager-level state: names, update timestamp and collaborator metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagerMeta {
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub index_name: String,
    /// Wall-clock nanoseconds of the last batch that changed state.
    #[serde(default, rename = "UpdateTimeStamp")]
    pub update_timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar_index: Option<Vec<ScalarFieldMeta>>,
    pub vector_index: VectorIndexMeta,
}

impl ManagerMeta {
    pub fn new(vector_index: VectorIndexMeta) -> Self {
        Self {
            collection_name: String::new(),
            index_name: String::new(),
            update_timestamp: 0,
            scalar_index: None,
            vector_index,
        }
    }

    /// Sets the indexed scalar fields. Chainable.
    pub fn with_scalar_fields(mut self, fields: Vec<ScalarFieldMeta>) -> Self {
        self.scalar_index = Some(fields);
        self
    }

    /// Sets collection and index names. Chainable.
    pub fn with_names(mut self, collection: impl Into<String>, index: impl Into<String>) -> Self {
        self.collection_name = collection.into();
        self.index_name = index.into();
        self
    }

    /// Parses and validates a JSON descriptor.
    pub fn from_json(json: &str) -> Result<Self> {
        let meta: ManagerMeta = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("parse manager meta failed: {}", e)))?;
        meta.validate()?;
        Ok(meta)
    }

    /// Checks the vector index type and dimension.
    pub fn validate(&self) -> Result<()> {
        if self.vector_index.index_type != FLAT_INDEX_TYPE {
            error!(index_type = %self.vector_index.index_type, "unsupported vector index type");
            return Err(Error::UnsupportedIndexType(
                self.vector_index.index_type.clone(),
            ));
        }
        if self.vector_index.dimension == 0 {
            return Err(Error::InvalidConfig("vector dimension must be non-zero".into()));
        }
        Ok(())
    }

    /// Pretty JSON with a stable key order.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("serialize manager meta failed: {}", e)))
    }

    /// Reads and validates the metadata file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "read manager meta failed");
            Error::IoError(format!("read manager meta failed: {}", e))
        })?;
        Self::from_json(&content)
    }

    /// Writes the metadata to `path` through a temporary file and rename.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, self.to_json()?)
            .map_err(|e| Error::IoError(format!("write manager meta failed: {}", e)))?;
        fs::rename(&tmp, path)
            .map_err(|e| Error::IoError(format!("rename manager meta failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let meta = ManagerMeta::from_json(
            r#"{"IndexName": "idx", "VectorIndex": {"IndexType": "flat", "Dimension": 8}}"#,
        )
        .unwrap();

        assert_eq!(meta.index_name, "idx");
        assert_eq!(meta.update_timestamp, 0);
        assert!(meta.scalar_index.is_none());
        assert_eq!(meta.vector_index.distance, DistanceMetric::InnerProduct);
        assert_eq!(meta.vector_index.quant, "float");
    }

    #[test]
    fn test_missing_vector_index_rejected() {
        let result = ManagerMeta::from_json(r#"{"IndexName": "idx"}"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_unsupported_index_type() {
        let result = ManagerMeta::from_json(
            r#"{"VectorIndex": {"IndexType": "hnsw", "Dimension": 8}}"#,
        );
        assert!(matches!(result, Err(Error::UnsupportedIndexType(t)) if t == "hnsw"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result =
            ManagerMeta::from_json(r#"{"VectorIndex": {"IndexType": "flat", "Dimension": 0}}"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_json_key_order_is_stable() {
        let meta = ManagerMeta::new(VectorIndexMeta::flat(4, DistanceMetric::L2).with_sparse(0.25))
            .with_names("c", "i")
            .with_scalar_fields(vec![ScalarFieldMeta::new("color", ScalarFieldKind::String)]);

        let json = meta.to_json().unwrap();
        let keys = ["CollectionName", "IndexName", "UpdateTimeStamp", "ScalarIndex", "VectorIndex"];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let reparsed = ManagerMeta::from_json(&json).unwrap();
        assert_eq!(reparsed, meta);
        assert_eq!(reparsed.to_json().unwrap(), json);
    }
}
