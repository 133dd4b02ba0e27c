//! Durable key-value store: write-ahead log plus a compacted sorted table.
//!
//! Layout of a store directory:
//!
//! ```text
//! <dir>/
//!   table.sst   # sorted snapshot as of the last compaction
//!   wal.log     # batches written since that snapshot
//! ```
//!
//! Writers are serialized on the WAL. A batch is appended (and, with the
//! default [`SyncMode::Immediate`], synced) before it becomes visible to
//! readers, so a crash never exposes a batch that is not on disk.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::memory::{apply_ops, get_from, range_from, Table};
use super::{KvStore, StorageOp};
use crate::error::{Error, Result};
use crate::storage::{read_table, write_table, SyncMode, Wal, WalBatch};

const TABLE_FILE: &str = "table.sst";
const WAL_FILE: &str = "wal.log";

/// Configuration for a durable store.
#[derive(Debug, Clone)]
pub struct DurableStoreConfig {
    /// WAL sync mode.
    pub sync_mode: SyncMode,
    /// Compact once this many batches sit in the WAL.
    pub compact_threshold: usize,
}

impl Default for DurableStoreConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::Immediate,
            compact_threshold: 1024,
        }
    }
}

impl DurableStoreConfig {
    /// Sets the sync mode. Chainable.
    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    /// Sets the WAL compaction threshold. Chainable.
    pub fn with_compact_threshold(mut self, batches: usize) -> Self {
        self.compact_threshold = batches.max(1);
        self
    }
}

struct WalState {
    wal: Wal,
    /// Batches appended since the last compaction.
    pending: u64,
}

/// Log-structured [`KvStore`] persisted under one directory.
///
/// # Example
///
/// ```no_run
/// use tessera_core::{DurableStore, DurableStoreConfig, KvStore};
///
/// let store = DurableStore::open("./kv", DurableStoreConfig::default()).unwrap();
/// store.put(&[b"k".to_vec()], &[b"v".to_vec()]).unwrap();
/// drop(store);
///
/// let store = DurableStore::open("./kv", DurableStoreConfig::default()).unwrap();
/// assert_eq!(store.get(&[b"k".to_vec()]), vec![b"v".to_vec()]);
/// ```
pub struct DurableStore {
    dir: PathBuf,
    config: DurableStoreConfig,
    data: RwLock<Table>,
    wal: Mutex<WalState>,
}

impl DurableStore {
    /// Opens the store at `dir`, creating the directory if needed.
    ///
    /// Recovery loads the table and replays the WAL. A torn final WAL record
    /// is dropped and the store is compacted immediately so the log never
    /// carries a partial record forward.
    pub fn open<P: AsRef<Path>>(dir: P, config: DurableStoreConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            warn!(dir = %dir.display(), error = %e, "create store dir failed");
            Error::IoError(format!("create store dir failed: {}", e))
        })?;

        let mut data = read_table(dir.join(TABLE_FILE))?;
        let replay = Wal::read_all(dir.join(WAL_FILE))?;
        let pending = replay.batches.len() as u64;
        for batch in &replay.batches {
            apply_ops(&mut data, &batch.ops);
        }

        let wal = Wal::open(dir.join(WAL_FILE), config.sync_mode)?;
        debug!(
            dir = %dir.display(),
            keys = data.len(),
            replayed = pending,
            "opened durable store"
        );

        let store = Self {
            dir,
            config,
            data: RwLock::new(data),
            wal: Mutex::new(WalState { wal, pending }),
        };

        if replay.torn_tail {
            store.compact()?;
        }

        Ok(store)
    }

    /// Rewrites the table from the current contents and empties the WAL.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.wal.lock();
        self.compact_locked(&mut state)
    }

    fn compact_locked(&self, state: &mut WalState) -> Result<()> {
        {
            let data = self.data.read();
            write_table(self.dir.join(TABLE_FILE), data.len(), data.iter()).map_err(|e| {
                warn!(dir = %self.dir.display(), error = %e, "table write failed");
                e
            })?;
        }
        state.wal.truncate()?;
        state.pending = 0;
        debug!(dir = %self.dir.display(), "compacted durable store");
        Ok(())
    }

    /// Directory backing this store.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvStore for DurableStore {
    fn get(&self, keys: &[Vec<u8>]) -> Vec<Vec<u8>> {
        get_from(&self.data.read(), keys)
    }

    fn seek_range(&self, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        range_from(&self.data.read(), start, end)
    }

    fn exec_op(&self, ops: &[StorageOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut state = self.wal.lock();
        let batch = WalBatch::new(state.pending + 1, ops.to_vec());
        state.wal.append(&batch).map_err(|e| {
            warn!(dir = %self.dir.display(), ops = ops.len(), error = %e, "WAL append failed");
            e
        })?;
        state.pending += 1;

        apply_ops(&mut self.data.write(), ops);

        // The batch is logged and applied; a failed compaction is retried
        // on the next batch and never fails this one.
        if state.pending >= self.config.compact_threshold as u64 {
            if let Err(e) = self.compact_locked(&mut state) {
                warn!(
                    dir = %self.dir.display(),
                    pending = state.pending,
                    error = %e,
                    "compaction failed; will retry"
                );
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let ops: Vec<StorageOp> = self
            .data
            .read()
            .keys()
            .map(|k| StorageOp::delete(k.clone()))
            .collect();
        self.exec_op(&ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_store_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir()
            .join("tessera_test_kv")
            .join(format!("kv_{}_{}", std::process::id(), id));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_open_creates_dir() {
        let path = temp_store_path();
        assert!(!path.exists());

        let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
        assert!(path.is_dir());
        assert!(store.is_empty());

        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn test_reopen_replays_wal() {
        let path = temp_store_path();

        {
            let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
            store
                .exec_op(&[StorageOp::put("a", "1"), StorageOp::put("b", "2")])
                .unwrap();
            store.delete(&[b"a".to_vec()]).unwrap();
        }

        let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
        assert_eq!(
            store.get(&[b"a".to_vec(), b"b".to_vec()]),
            vec![Vec::new(), b"2".to_vec()]
        );

        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn test_compaction_preserves_contents() {
        let path = temp_store_path();
        let config = DurableStoreConfig::default().with_compact_threshold(3);

        {
            let store = DurableStore::open(&path, config.clone()).unwrap();
            for i in 0..10u8 {
                store.put(&[vec![i]], &[vec![i, i]]).unwrap();
            }
        }

        let store = DurableStore::open(&path, config).unwrap();
        assert_eq!(store.len(), 10);
        assert_eq!(store.get(&[vec![7]]), vec![vec![7, 7]]);

        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn test_torn_batch_is_all_or_nothing() {
        let path = temp_store_path();

        {
            let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
            store.put(&[b"keep".to_vec()], &[b"1".to_vec()]).unwrap();
            store
                .exec_op(&[StorageOp::put("x", "1"), StorageOp::put("y", "2")])
                .unwrap();
        }

        let wal_path = path.join(WAL_FILE);
        let bytes = fs::read(&wal_path).unwrap();
        fs::write(&wal_path, &bytes[..bytes.len() - 4]).unwrap();

        {
            let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
            assert_eq!(
                store.get(&[b"keep".to_vec(), b"x".to_vec(), b"y".to_vec()]),
                vec![b"1".to_vec(), Vec::new(), Vec::new()]
            );
            store.put(&[b"z".to_vec()], &[b"3".to_vec()]).unwrap();
        }

        let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
        assert_eq!(store.len(), 2);

        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn test_failed_compaction_keeps_batch() {
        let path = temp_store_path();
        let config = DurableStoreConfig::default().with_compact_threshold(1);
        let blocker = path.join(TABLE_FILE).with_extension("tmp");

        {
            let store = DurableStore::open(&path, config.clone()).unwrap();
            // A directory where the table's temp file goes makes the table write fail.
            fs::create_dir_all(&blocker).unwrap();

            store.put(&[b"a".to_vec()], &[b"1".to_vec()]).unwrap();
            assert_eq!(store.get(&[b"a".to_vec()]), vec![b"1".to_vec()]);
            assert_eq!(store.wal.lock().pending, 1);

            fs::remove_dir_all(&blocker).unwrap();
            store.put(&[b"b".to_vec()], &[b"2".to_vec()]).unwrap();
            assert_eq!(store.wal.lock().pending, 0);
        }

        let store = DurableStore::open(&path, config).unwrap();
        assert_eq!(
            store.get(&[b"a".to_vec(), b"b".to_vec()]),
            vec![b"1".to_vec(), b"2".to_vec()]
        );

        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn test_failed_compaction_is_replayed_on_reopen() {
        let path = temp_store_path();
        let config = DurableStoreConfig::default().with_compact_threshold(1);
        let blocker = path.join(TABLE_FILE).with_extension("tmp");

        {
            let store = DurableStore::open(&path, config.clone()).unwrap();
            fs::create_dir_all(&blocker).unwrap();
            store
                .exec_op(&[StorageOp::put("x", "1"), StorageOp::put("y", "2")])
                .unwrap();
        }
        fs::remove_dir_all(&blocker).unwrap();

        let store = DurableStore::open(&path, config).unwrap();
        assert_eq!(store.len(), 2);

        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn test_clear_is_durable() {
        let path = temp_store_path();

        {
            let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
            store
                .put(&[b"a".to_vec(), b"b".to_vec()], &[b"1".to_vec(), b"2".to_vec()])
                .unwrap();
            store.compact().unwrap();
            store.clear().unwrap();
            assert!(store.is_empty());
        }

        let store = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
        assert!(store.is_empty());

        let _ = fs::remove_dir_all(&path);
    }
}
