//! Sorted table file holding a compacted snapshot of a key-value store.
//!
//! The table is always rewritten whole: records are written in key order to
//! a temporary file, synced, and renamed over the previous table.
//!
//! # Format
//!
//! ```text
//! [magic:4][count:u64]
//! ([checksum:u32][key_len:u32][value_len:u32][key][value]) * count
//! ```
//!
//! The checksum covers the two lengths, the key and the value.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"TSST";

/// Writes `entries` (already in key order) as the table at `path`.
pub fn write_table<'a, P, I>(path: P, count: usize, entries: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>,
{
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");

    let file = File::create(&tmp)
        .map_err(|e| Error::IoError(format!("create table failed: {}", e)))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(MAGIC)
        .map_err(|e| Error::IoError(format!("write magic failed: {}", e)))?;
    writer
        .write_all(&(count as u64).to_le_bytes())
        .map_err(|e| Error::IoError(format!("write count failed: {}", e)))?;

    for (key, value) in entries {
        let key_len = (key.len() as u32).to_le_bytes();
        let value_len = (value.len() as u32).to_le_bytes();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&key_len);
        hasher.update(&value_len);
        hasher.update(key);
        hasher.update(value);
        let checksum = hasher.finalize();

        let checksum = checksum.to_le_bytes();
        for part in [
            &checksum[..],
            &key_len[..],
            &value_len[..],
            key.as_slice(),
            value.as_slice(),
        ] {
            writer
                .write_all(part)
                .map_err(|e| Error::IoError(format!("write record failed: {}", e)))?;
        }
    }

    writer
        .flush()
        .map_err(|e| Error::IoError(format!("flush failed: {}", e)))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::IoError(format!("sync failed: {}", e)))?;
    drop(writer);

    fs::rename(&tmp, path).map_err(|e| Error::IoError(format!("rename table failed: {}", e)))?;
    Ok(())
}

/// Reads the table at `path`; a missing file is an empty table.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
    let path = path.as_ref();
    let mut entries = BTreeMap::new();
    if !path.exists() {
        return Ok(entries);
    }

    let file = File::open(path)
        .map_err(|e| Error::IoError(format!("open table failed: {}", e)))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    read_exact(&mut reader, &mut magic, "magic")?;
    if &magic != MAGIC {
        return Err(Error::Corrupted("table magic mismatch".to_string()));
    }

    let mut count_buf = [0u8; 8];
    read_exact(&mut reader, &mut count_buf, "count")?;
    let count = u64::from_le_bytes(count_buf);

    for _ in 0..count {
        let mut header = [0u8; 12];
        read_exact(&mut reader, &mut header, "record header")?;
        let expected = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let key_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let value_len =
            u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;

        let mut key = vec![0u8; key_len];
        read_exact(&mut reader, &mut key, "key")?;
        let mut value = vec![0u8; value_len];
        read_exact(&mut reader, &mut value, "value")?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header[4..]);
        hasher.update(&key);
        hasher.update(&value);
        let actual = hasher.finalize();
        if actual != expected {
            return Err(Error::Corrupted(format!(
                "table checksum mismatch: expected {}, got {}",
                expected, actual
            )));
        }

        entries.insert(key, value);
    }

    Ok(entries)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Corrupted(format!("table truncated reading {}", what))
        } else {
            Error::IoError(format!("read {} failed: {}", what, e))
        }
    })
}
