//! In-memory key-value store.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::{KvStore, StorageOp};
use crate::error::Result;

pub(crate) type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// Volatile [`KvStore`] over an ordered map behind a reader/writer lock.
#[derive(Debug, Default)]
pub struct VolatileStore {
    data: RwLock<Table>,
}

impl VolatileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvStore for VolatileStore {
    fn get(&self, keys: &[Vec<u8>]) -> Vec<Vec<u8>> {
        get_from(&self.data.read(), keys)
    }

    fn seek_range(&self, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        range_from(&self.data.read(), start, end)
    }

    fn exec_op(&self, ops: &[StorageOp]) -> Result<()> {
        apply_ops(&mut self.data.write(), ops);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.data.write().clear();
        Ok(())
    }
}

pub(crate) fn get_from(table: &Table, keys: &[Vec<u8>]) -> Vec<Vec<u8>> {
    keys.iter()
        .map(|k| table.get(k).cloned().unwrap_or_default())
        .collect()
}

pub(crate) fn range_from(table: &Table, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    if start >= end {
        return Vec::new();
    }
    table
        .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub(crate) fn apply_ops(table: &mut Table, ops: &[StorageOp]) {
    for op in ops {
        match op {
            StorageOp::Put { key, value } => {
                table.insert(key.clone(), value.clone());
            }
            StorageOp::Delete { key } => {
                table.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = VolatileStore::new();
        store
            .put(&[b"k1".to_vec(), b"k2".to_vec()], &[b"v1".to_vec(), b"v2".to_vec()])
            .unwrap();
        assert_eq!(store.len(), 2);

        store.delete(&[b"k1".to_vec(), b"missing".to_vec()]).unwrap();
        assert_eq!(
            store.get(&[b"k1".to_vec(), b"k2".to_vec()]),
            vec![Vec::new(), b"v2".to_vec()]
        );
    }

    #[test]
    fn test_put_length_mismatch() {
        let store = VolatileStore::new();
        assert!(store.put(&[b"a".to_vec()], &[]).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_seek_range_half_open() {
        let store = VolatileStore::new();
        store
            .exec_op(&[
                StorageOp::put("a", "1"),
                StorageOp::put("b", "2"),
                StorageOp::put("c", "3"),
            ])
            .unwrap();

        let keys: Vec<Vec<u8>> = store
            .seek_range(b"a", b"c")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(store.seek_range(b"c", b"a").is_empty());
        assert!(store.seek_range(b"b", b"b").is_empty());
    }

    #[test]
    fn test_batch_applies_in_order() {
        let store = VolatileStore::new();
        store
            .exec_op(&[
                StorageOp::put("a", "1"),
                StorageOp::delete("a"),
                StorageOp::put("a", "2"),
            ])
            .unwrap();
        assert_eq!(store.get(&[b"a".to_vec()]), vec![b"2".to_vec()]);

        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
