//! Length-prefixed append log used by every on-disk store in this
//! workspace (events, sessions, reconsolidation runs).
//!
//! Each record is written as a `u32` little-endian length prefix
//! followed by its bincode encoding, then `flush()` + `sync_data()`.
//! A reader that hits a truncated trailing record (length header
//! exceeds remaining bytes, or fewer bytes than the header promises)
//! stops there and returns what it already decoded — the log up to
//! that point is still valid, matching the crash-tolerance requirement
//! on the Access Store.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Append one bincode-encoded record to `file`, then fsync.
pub fn append_record<T: Serialize>(file: &mut File, record: &T) -> Result<()> {
    let bytes = bincode::serialize(record)?;
    let len = bytes.len() as u32;
    file.write_all(&len.to_le_bytes())?;
    file.write_all(&bytes)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

/// Open `path` for appending, creating it (and its parent directory)
/// if it does not exist.
pub fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

/// Replay every well-formed record in `path`, in file order. A missing
/// file yields an empty vector. A truncated trailing record is dropped
/// silently — the caller cannot distinguish "never written" from
/// "torn by a crash" and per §4.1 that is fine: partial energy updates
/// on crash are acceptable.
pub fn replay_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        match reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        match bincode::deserialize::<T>(&buf) {
            Ok(record) => out.push(record),
            Err(_) => break,
        }
    }
    Ok(out)
}

/// Atomically write `bytes` to `path` by writing to a sibling temp file
/// and renaming over the destination. Used for the energy/session
/// snapshots so a reader never observes a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.sync_data()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
        s: String,
    }

    #[test]
    fn append_then_replay_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.bin");
        let mut file = open_append(&path).unwrap();
        append_record(&mut file, &Row { n: 1, s: "a".into() }).unwrap();
        append_record(&mut file, &Row { n: 2, s: "b".into() }).unwrap();
        drop(file);

        let rows: Vec<Row> = replay_records(&path).unwrap();
        assert_eq!(
            rows,
            vec![Row { n: 1, s: "a".into() }, Row { n: 2, s: "b".into() }]
        );
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.bin");
        let rows: Vec<Row> = replay_records(&path).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn replay_stops_at_truncated_trailing_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.bin");
        let mut file = open_append(&path).unwrap();
        append_record(&mut file, &Row { n: 1, s: "a".into() }).unwrap();
        drop(file);

        // Simulate a crash mid-write: append a length header promising
        // more bytes than follow.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(b"short").unwrap();
        drop(file);

        let rows: Vec<Row> = replay_records(&path).unwrap();
        assert_eq!(rows, vec![Row { n: 1, s: "a".into() }]);
    }

    #[test]
    fn write_atomic_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snap.bin");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
    }
}
