//! Key-value persistence primitive.
//!
//! [`KvStore`] is implemented by [`VolatileStore`] (in-memory ordered map)
//! and [`DurableStore`] (WAL plus sorted table on disk). Both give the same
//! answers for every call; only the durable one survives a restart.

pub mod durable;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use durable::{DurableStore, DurableStoreConfig};
pub use memory::VolatileStore;

/// One operation inside an atomic write batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StorageOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl StorageOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        StorageOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        StorageOp::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            StorageOp::Put { key, .. } | StorageOp::Delete { key } => key,
        }
    }
}

/// Ordered byte-keyed store.
///
/// Keys compare lexicographically as bytes. A missing key reads back as an
/// empty value, not an error.
///
/// # Example
///
/// ```
/// use tessera_core::{KvStore, StorageOp, VolatileStore};
///
/// let store = VolatileStore::new();
/// store
///     .exec_op(&[StorageOp::put("a", "1"), StorageOp::put("b", "2")])
///     .unwrap();
///
/// let values = store.get(&[b"a".to_vec(), b"zz".to_vec()]);
/// assert_eq!(values, vec![b"1".to_vec(), Vec::new()]);
/// ```
pub trait KvStore: Send + Sync {
    /// Reads `keys`, returning one value per key in the same order.
    fn get(&self, keys: &[Vec<u8>]) -> Vec<Vec<u8>>;

    /// Returns every pair with `start <= key < end`, in key order.
    fn seek_range(&self, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Applies `ops` in order as one atomic write.
    fn exec_op(&self, ops: &[StorageOp]) -> Result<()>;

    /// Removes every key.
    fn clear(&self) -> Result<()>;

    /// Writes `values[i]` under `keys[i]` as one batch.
    fn put(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<()> {
        if keys.len() != values.len() {
            return Err(Error::InvalidConfig(format!(
                "put with {} keys but {} values",
                keys.len(),
                values.len()
            )));
        }
        let ops: Vec<StorageOp> = keys
            .iter()
            .zip(values)
            .map(|(k, v)| StorageOp::put(k.clone(), v.clone()))
            .collect();
        self.exec_op(&ops)
    }

    /// Deletes `keys` as one batch; missing keys are ignored.
    fn delete(&self, keys: &[Vec<u8>]) -> Result<()> {
        let ops: Vec<StorageOp> = keys.iter().map(|k| StorageOp::delete(k.clone())).collect();
        self.exec_op(&ops)
    }
}
