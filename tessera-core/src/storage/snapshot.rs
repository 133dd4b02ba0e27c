//! Checksummed single-blob files used by the index collaborators.
//!
//! # Format
//!
//! ```text
//! [magic:4][checksum:u32][len:u64][payload:len]
//! ```
//!
//! The checksum covers the payload only. Files are written to a temporary
//! path, synced and renamed, so a reader sees either the old or the new
//! snapshot.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

const HEADER_LEN: usize = 16;

/// Writes `payload` to `path` under the four-byte `magic`.
pub fn write_snapshot<P: AsRef<Path>>(path: P, magic: &[u8; 4], payload: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");

    let checksum = crc32fast::hash(payload);
    let mut file = File::create(&tmp)
        .map_err(|e| Error::IoError(format!("create snapshot failed: {}", e)))?;
    for part in [
        &magic[..],
        &checksum.to_le_bytes()[..],
        &(payload.len() as u64).to_le_bytes()[..],
        payload,
    ] {
        file.write_all(part)
            .map_err(|e| Error::IoError(format!("write snapshot failed: {}", e)))?;
    }
    file.sync_all()
        .map_err(|e| Error::IoError(format!("sync snapshot failed: {}", e)))?;
    drop(file);

    fs::rename(&tmp, path)
        .map_err(|e| Error::IoError(format!("rename snapshot failed: {}", e)))?;
    Ok(())
}

/// Reads the payload at `path`, verifying `magic`, length and checksum.
pub fn read_snapshot<P: AsRef<Path>>(path: P, magic: &[u8; 4]) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        Error::IoError(format!("read snapshot {} failed: {}", path.display(), e))
    })?;

    if bytes.len() < HEADER_LEN {
        return Err(Error::Corrupted(format!(
            "snapshot {} shorter than header",
            path.display()
        )));
    }
    if &bytes[..4] != magic {
        return Err(Error::Corrupted(format!(
            "snapshot {} magic mismatch",
            path.display()
        )));
    }

    let expected = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&bytes[8..HEADER_LEN]);
    let len = u64::from_le_bytes(len_buf) as usize;

    let payload = &bytes[HEADER_LEN..];
    if payload.len() != len {
        return Err(Error::Corrupted(format!(
            "snapshot {} length mismatch: header says {}, found {}",
            path.display(),
            len,
            payload.len()
        )));
    }

    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(Error::Corrupted(format!(
            "snapshot {} checksum mismatch: expected {}, got {}",
            path.display(),
            expected,
            actual
        )));
    }

    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_snapshot_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join("tessera_test_snapshot");
        fs::create_dir_all(&dir).unwrap();
        dir.join(format!("snap_{}_{}.data", std::process::id(), id))
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let path = temp_snapshot_path();
        write_snapshot(&path, b"TEST", b"hello snapshot").unwrap();
        assert_eq!(read_snapshot(&path, b"TEST").unwrap(), b"hello snapshot");

        write_snapshot(&path, b"TEST", b"").unwrap();
        assert!(read_snapshot(&path, b"TEST").unwrap().is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_snapshot_rejects_damage() {
        let path = temp_snapshot_path();
        write_snapshot(&path, b"TEST", b"payload bytes").unwrap();

        assert!(matches!(
            read_snapshot(&path, b"OTHR"),
            Err(Error::Corrupted(_))
        ));

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_snapshot(&path, b"TEST"), Err(Error::Corrupted(_))));

        fs::write(&path, &bytes[..10]).unwrap();
        assert!(matches!(read_snapshot(&path, b"TEST"), Err(Error::Corrupted(_))));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_snapshot_is_io_error() {
        let path = temp_snapshot_path();
        assert!(matches!(read_snapshot(&path, b"TEST"), Err(Error::IoError(_))));
    }
}
