//! Write-Ahead Log (WAL) of key-value write batches.
//!
//! Every batch handed to the durable store is appended here and synced
//! before it is applied to the in-memory table. On open the log is replayed
//! on top of the last compacted table to restore the store.
//!
//! # Format
//!
//! Each WAL record has the format:
//! ```text
//! [checksum:u32][length:u32][json batch]
//! ```
//!
//! A record is the unit of atomicity: a batch is either fully present with
//! a valid checksum or treated as never written.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::kv::StorageOp;

/// Sync mode for WAL writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Sync after every batch (safest, slowest).
    #[default]
    Immediate,
    /// Sync after a number of batches.
    Batched,
    /// Don't sync (fastest, risk of data loss on crash).
    NoSync,
}

/// One atomic group of put/delete operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalBatch {
    /// Position of this batch in the log since the last truncation.
    pub seq: u64,
    pub ops: Vec<StorageOp>,
}

impl WalBatch {
    pub fn new(seq: u64, ops: Vec<StorageOp>) -> Self {
        Self { seq, ops }
    }

    /// Serializes the batch to bytes.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Corrupted(format!("WAL serialization failed: {}", e)))
    }

    /// Deserializes a batch from bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Corrupted(format!("WAL deserialization failed: {}", e)))
    }
}

/// Result of reading a WAL back for recovery.
#[derive(Debug, Default)]
pub struct WalReplay {
    pub batches: Vec<WalBatch>,
    /// The final record was incomplete and has been ignored.
    pub torn_tail: bool,
}

/// Write-Ahead Log for durable batches.
pub struct Wal {
    /// Path to the WAL file.
    path: PathBuf,
    /// File handle for writing.
    writer: BufWriter<File>,
    /// Sync mode.
    sync_mode: SyncMode,
    /// Number of records since last sync.
    records_since_sync: usize,
    /// Batch size for syncing.
    batch_size: usize,
    /// File length covered by fully appended records.
    committed_len: u64,
}

impl Wal {
    /// Opens or creates a WAL file.
    pub fn open<P: AsRef<Path>>(path: P, sync_mode: SyncMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::IoError(format!("failed to open WAL: {}", e)))?;
        let committed_len = file
            .metadata()
            .map_err(|e| Error::IoError(format!("metadata failed: {}", e)))?
            .len();

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            sync_mode,
            records_since_sync: 0,
            batch_size: 100,
            committed_len,
        })
    }

    /// Appends a batch to the WAL.
    ///
    /// On failure the log is cut back to its last complete record, so a
    /// partial frame never sits in front of later appends.
    pub fn append(&mut self, batch: &WalBatch) -> Result<()> {
        let data = batch.to_bytes()?;
        let checksum = crc32fast::hash(&data);
        let length = u32::try_from(data.len())
            .map_err(|_| Error::IoError(format!("WAL batch of {} bytes too large", data.len())))?;

        // Frame: [checksum:4][length:4][data:length]
        let mut frame = Vec::with_capacity(8 + data.len());
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&data);

        match self.write_frame(&frame) {
            Ok(()) => {
                self.committed_len += frame.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    warn!(path = %self.path.display(), error = %rollback, "WAL rollback failed");
                }
                Err(e)
            }
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.writer
            .write_all(frame)
            .map_err(|e| Error::IoError(format!("write record failed: {}", e)))?;

        self.records_since_sync += 1;

        match self.sync_mode {
            SyncMode::Immediate => self.sync(),
            SyncMode::Batched if self.records_since_sync >= self.batch_size => self.sync(),
            SyncMode::Batched | SyncMode::NoSync => self
                .writer
                .flush()
                .map_err(|e| Error::IoError(format!("flush failed: {}", e))),
        }
    }

    /// Drops buffered bytes and cuts the file back to `committed_len`.
    fn rollback(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::IoError(format!("reopen WAL failed: {}", e)))?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts discards the buffer; dropping the writer would flush it.
        let _ = stale.into_parts();
        self.writer
            .get_ref()
            .set_len(self.committed_len)
            .map_err(|e| Error::IoError(format!("WAL rollback failed: {}", e)))?;
        Ok(())
    }

    /// Forces a sync to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::IoError(format!("flush failed: {}", e)))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| Error::IoError(format!("sync failed: {}", e)))?;
        self.records_since_sync = 0;
        Ok(())
    }

    /// Empties the WAL once its contents are captured elsewhere.
    pub fn truncate(&mut self) -> Result<()> {
        self.sync()?;

        // Close current writer, truncate file, and reopen
        let file = File::create(&self.path)
            .map_err(|e| Error::IoError(format!("truncate failed: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::IoError(format!("sync failed: {}", e)))?;
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::IoError(format!("reopen WAL failed: {}", e)))?;
        self.writer = BufWriter::new(file);
        self.committed_len = 0;

        Ok(())
    }

    /// Reads all batches from the WAL for recovery.
    ///
    /// An incomplete final record (short read, or a checksum mismatch on the
    /// last record in the file) is a torn write and is dropped. A bad
    /// checksum anywhere else is corruption.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<WalReplay> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(WalReplay::default());
        }

        let file = File::open(path)
            .map_err(|e| Error::IoError(format!("failed to open WAL for read: {}", e)))?;

        let file_len = file
            .metadata()
            .map_err(|e| Error::IoError(format!("metadata failed: {}", e)))?
            .len();

        let mut replay = WalReplay::default();
        if file_len == 0 {
            return Ok(replay);
        }

        let mut reader = BufReader::new(file);
        let mut consumed = 0u64;

        loop {
            let mut header = [0u8; 8];
            match read_full(&mut reader, &mut header)? {
                0 => break,
                8 => {}
                _ => {
                    replay.torn_tail = true;
                    break;
                }
            }
            let expected_checksum = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

            // A length running past the end of the file can only be a torn header.
            if consumed + 8 + length as u64 > file_len {
                replay.torn_tail = true;
                break;
            }

            let mut data = vec![0u8; length];
            reader
                .read_exact(&mut data)
                .map_err(|e| Error::IoError(format!("read data failed: {}", e)))?;
            consumed += 8 + length as u64;

            let actual_checksum = crc32fast::hash(&data);
            if actual_checksum != expected_checksum {
                if consumed == file_len {
                    replay.torn_tail = true;
                    break;
                }
                return Err(Error::Corrupted(format!(
                    "WAL checksum mismatch: expected {}, got {}",
                    expected_checksum, actual_checksum
                )));
            }

            replay.batches.push(WalBatch::from_bytes(&data)?);
        }

        if replay.torn_tail {
            warn!(path = %path.display(), "discarding torn WAL tail");
        }

        Ok(replay)
    }

    /// Returns the path to the WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::IoError(format!("read header failed: {}", e))),
        }
    }
    Ok(filled)
}
