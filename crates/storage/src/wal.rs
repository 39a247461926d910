// SPDX-License-Identifier: MIT

//! Append-only write-ahead log backing the Audit Sink's durability path
//! (SPEC_FULL §4.7): every enqueued record is appended here before the
//! batch aggregator drains it into the repository, so a crash between
//! enqueue and repository write never silently drops a record. One line
//! of JSON per record; `processed_seq` tracks how far the repository
//! writer has caught up, and `compact` archives everything at or below
//! it into a zstd-compressed sidecar so the live file stays small.

use crate::error::AuditError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One durable record plus the sequence number it was assigned at append time.
#[derive(Debug, Clone)]
pub struct WalEntry<T> {
    pub seq: u64,
    pub record: T,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct WireEntry<T> {
    seq: u64,
    record: T,
}

/// A single-writer, single-reader append-only log of `T` records.
pub struct Wal<T> {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    processed_seq: u64,
    pending: std::collections::VecDeque<WalEntry<T>>,
}

impl<T: Serialize + DeserializeOwned + Clone> Wal<T> {
    /// Opens (creating if absent) the WAL at `path`. `processed_seq` is the
    /// last sequence number the caller already committed to the
    /// repository (e.g. from a prior run); every record with a higher
    /// sequence is queued as unprocessed for replay.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, AuditError> {
        let mut write_seq = 0u64;
        let mut pending = std::collections::VecDeque::new();

        if path.exists() {
            let file = File::open(path)
                .map_err(|source| AuditError::WalOpen { path: path.display().to_string(), source })?;
            let reader = BufReader::new(file);
            for (offset, line) in reader.lines().enumerate() {
                let line = line
                    .map_err(|source| AuditError::WalOpen { path: path.display().to_string(), source })?;
                if line.is_empty() {
                    continue;
                }
                let wire: WireEntry<T> = serde_json::from_str(&line)
                    .map_err(|source| AuditError::WalDecode { offset: offset as u64, source })?;
                write_seq = write_seq.max(wire.seq);
                if wire.seq > processed_seq {
                    pending.push_back(WalEntry { seq: wire.seq, record: wire.record });
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditError::WalOpen { path: path.display().to_string(), source })?;

        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file), write_seq, processed_seq, pending })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Appends `record`, returning its assigned sequence number. Buffered;
    /// call [`Self::flush`] to guarantee it survives a crash.
    pub fn append(&mut self, record: &T) -> Result<u64, AuditError> {
        let seq = self.write_seq + 1;
        let wire = WireEntry { seq, record: record.clone() };
        let line = serde_json::to_string(&wire).map_err(|e| AuditError::WalDecode { offset: 0, source: e })?;
        writeln!(self.writer, "{line}").map_err(AuditError::WalAppend)?;
        self.write_seq = seq;
        self.pending.push_back(WalEntry { seq, record: record.clone() });
        Ok(seq)
    }

    pub fn flush(&mut self) -> Result<(), AuditError> {
        self.writer.flush().map_err(AuditError::WalAppend)
    }

    /// Pops the oldest record not yet marked processed, in sequence order.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry<T>>, AuditError> {
        Ok(self.pending.pop_front())
    }

    /// Records that everything up to and including `seq` has been
    /// durably written to the repository.
    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// Archives every on-disk record at or below `processed_seq` into a
    /// zstd-compressed sidecar (`<path>.archive.zst`, frames appended on
    /// each call) and rewrites the live file with only the unprocessed
    /// tail, bounding its growth (SPEC_FULL §4.7 "flushed/rotated on the
    /// same retention-days timer as the cleanup pass").
    pub fn compact(&mut self) -> Result<(), AuditError> {
        self.flush()?;
        let file = File::open(&self.path)
            .map_err(|source| AuditError::WalOpen { path: self.path.display().to_string(), source })?;
        let reader = BufReader::new(file);

        let mut archived = Vec::new();
        let mut kept = Vec::new();
        for (offset, line) in reader.lines().enumerate() {
            let line = line
                .map_err(|source| AuditError::WalOpen { path: self.path.display().to_string(), source })?;
            if line.is_empty() {
                continue;
            }
            let wire: WireEntry<T> = serde_json::from_str(&line)
                .map_err(|source| AuditError::WalDecode { offset: offset as u64, source })?;
            if wire.seq <= self.processed_seq {
                archived.push(line);
            } else {
                kept.push(line);
            }
        }

        if archived.is_empty() {
            return Ok(());
        }

        let archive_path = archive_path_for(&self.path);
        let plain = archived.join("\n");
        let compressed = zstd::encode_all(plain.as_bytes(), 3).map_err(AuditError::WalCompress)?;
        let mut archive_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&archive_path)
            .map_err(|source| AuditError::WalOpen { path: archive_path.display().to_string(), source })?;
        archive_file.write_all(&compressed).map_err(AuditError::WalCompress)?;

        let rewritten = if kept.is_empty() { String::new() } else { format!("{}\n", kept.join("\n")) };
        std::fs::write(&self.path, rewritten)
            .map_err(|source| AuditError::WalOpen { path: self.path.display().to_string(), source })?;

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| AuditError::WalOpen { path: self.path.display().to_string(), source })?;
        self.writer = BufWriter::new(file);
        Ok(())
    }
}

fn archive_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().and_then(|n| n.to_str()).unwrap_or("wal").to_string();
    name.push_str(".archive.zst");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Record(String);

    #[test]
    fn open_creates_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.wal");
        let wal: Wal<Record> = Wal::open(&path, 0).unwrap();
        assert!(path.exists());
        assert_eq!(wal.write_seq(), 0);
        assert_eq!(wal.processed_seq(), 0);
    }

    #[test]
    fn append_assigns_increasing_sequence_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.wal");
        let mut wal: Wal<Record> = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.append(&Record("a".into())).unwrap(), 1);
        assert_eq!(wal.append(&Record("b".into())).unwrap(), 2);
        wal.flush().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn next_unprocessed_drains_in_order_then_is_exhausted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.wal");
        let mut wal: Wal<Record> = Wal::open(&path, 0).unwrap();
        wal.append(&Record("a".into())).unwrap();
        wal.append(&Record("b".into())).unwrap();

        let first = wal.next_unprocessed().unwrap().unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.record, Record("a".into()));
        let second = wal.next_unprocessed().unwrap().unwrap();
        assert_eq!(second.seq, 2);
        assert!(wal.next_unprocessed().unwrap().is_none());
    }

    #[test]
    fn reopen_with_processed_seq_only_replays_the_remainder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.wal");
        {
            let mut wal: Wal<Record> = Wal::open(&path, 0).unwrap();
            wal.append(&Record("a".into())).unwrap();
            wal.append(&Record("b".into())).unwrap();
            wal.append(&Record("c".into())).unwrap();
            wal.flush().unwrap();
        }

        let mut wal: Wal<Record> = Wal::open(&path, 2).unwrap();
        let entry = wal.next_unprocessed().unwrap().unwrap();
        assert_eq!(entry.seq, 3);
        assert_eq!(entry.record, Record("c".into()));
        assert!(wal.next_unprocessed().unwrap().is_none());
    }

    #[test]
    fn compact_archives_processed_entries_and_keeps_the_rest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.wal");
        let mut wal: Wal<Record> = Wal::open(&path, 0).unwrap();
        wal.append(&Record("a".into())).unwrap();
        wal.append(&Record("b".into())).unwrap();
        wal.append(&Record("c".into())).unwrap();
        wal.mark_processed(2);
        wal.compact().unwrap();

        assert!(archive_path_for(&path).exists());
        let reopened: Wal<Record> = Wal::open(&path, 2).unwrap();
        assert_eq!(reopened.write_seq(), 3);
    }
}
