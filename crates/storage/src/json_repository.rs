// SPDX-License-Identifier: MIT

//! JSON-file-backed implementations of the core's repository contracts
//! (§6 "Repository"). Durable storage schema/migrations are explicitly
//! out of scope for the enforcement core (§1); this is the simplest
//! concrete backing that still gives `pcguardd` something real to
//! reconcile against and persist audit records into, with admin-side
//! list/entry editing (an out-of-scope HTTP admin API in the full
//! product) modeled here as hand- or tool-edited JSON files picked up
//! fresh on the Synchronizer's next pass (§4.6).

use crate::error::JsonRepositoryError;
use async_trait::async_trait;
use parking_lot::Mutex;
use pcguard_core::{
    AuditRecord, AuditRepository, List, ListEntry, ListEntryRepository, ListId, ListRepository,
    RepositoryError,
};
use std::io::Write;
use std::path::{Path, PathBuf};

fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, JsonRepositoryError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = std::fs::read(path)
        .map_err(|source| JsonRepositoryError::Read { path: path.display().to_string(), source })?;
    serde_json::from_slice(&bytes)
        .map_err(|source| JsonRepositoryError::Decode { path: path.display().to_string(), source })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), JsonRepositoryError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|source| JsonRepositoryError::Decode { path: path.display().to_string(), source })?;
    std::fs::write(path, json)
        .map_err(|source| JsonRepositoryError::Write { path: path.display().to_string(), source })
}

/// Reads `lists.json` fresh on every call — the Synchronizer's
/// `sync-interval` (default 30s) bounds how stale an admin-side edit can
/// be, matching the one-way-projection design in §9.
pub struct JsonListRepository {
    path: PathBuf,
}

impl JsonListRepository {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("lists.json") }
    }

    /// Ambient write path for seeding/admin tooling; not part of the
    /// core's read-only repository contract.
    pub fn replace_all(&self, lists: &[List]) -> Result<(), JsonRepositoryError> {
        write_json(&self.path, &lists.to_vec())
    }
}

#[async_trait]
impl ListRepository for JsonListRepository {
    async fn get_all(&self) -> Result<Vec<List>, RepositoryError> {
        Ok(read_json::<Vec<List>>(&self.path)?)
    }
}

/// Reads `entries.json` fresh on every call, same staleness bound as
/// [`JsonListRepository`].
pub struct JsonListEntryRepository {
    path: PathBuf,
}

impl JsonListEntryRepository {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("entries.json") }
    }

    pub fn replace_all(&self, entries: &[ListEntry]) -> Result<(), JsonRepositoryError> {
        write_json(&self.path, &entries.to_vec())
    }
}

#[async_trait]
impl ListEntryRepository for JsonListEntryRepository {
    async fn get_by_list_id(&self, id: &ListId) -> Result<Vec<ListEntry>, RepositoryError> {
        let all = read_json::<Vec<ListEntry>>(&self.path)?;
        Ok(all.into_iter().filter(|e| &e.list_id == id).collect())
    }
}

/// Append-only JSON-lines audit log. This is the durable destination the
/// Audit Sink's batch aggregator drains into (§4.7) — distinct from
/// [`crate::wal::Wal`], which buffers records between enqueue and this
/// write. Queries scan the file; acceptable for an audit trail that is
/// swept by `cleanup_old_logs` on a `retention-days` timer rather than
/// grown without bound.
pub struct JsonAuditRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonAuditRepository {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("audit_log.jsonl"), write_lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<Vec<AuditRecord>, JsonRepositoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|source| JsonRepositoryError::Read { path: self.path.display().to_string(), source })?;
        text.lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|source| JsonRepositoryError::Decode { path: self.path.display().to_string(), source })
            })
            .collect()
    }
}

#[async_trait]
impl AuditRepository for JsonAuditRepository {
    async fn create(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock();
        let line = serde_json::to_string(record)
            .map_err(|source| JsonRepositoryError::Decode { path: self.path.display().to_string(), source })?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| JsonRepositoryError::Write { path: self.path.display().to_string(), source })?;
        writeln!(file, "{line}")
            .map_err(|source| JsonRepositoryError::Write { path: self.path.display().to_string(), source })?;
        Ok(())
    }

    async fn count_by_time_range(&self, from_ms: u64, to_ms: u64) -> Result<u64, RepositoryError> {
        let records = self.read_all()?;
        Ok(records.iter().filter(|r| r.timestamp_ms >= from_ms && r.timestamp_ms < to_ms).count() as u64)
    }

    async fn cleanup_old_logs(&self, before_ms: u64) -> Result<u64, RepositoryError> {
        let _guard = self.write_lock.lock();
        let records = self.read_all()?;
        let before = records.len();
        let kept: Vec<&AuditRecord> = records.iter().filter(|r| r.timestamp_ms >= before_ms).collect();
        let removed = before - kept.len();
        if removed > 0 {
            let mut out = String::new();
            for record in &kept {
                out.push_str(
                    &serde_json::to_string(record)
                        .map_err(|source| JsonRepositoryError::Decode { path: self.path.display().to_string(), source })?,
                );
                out.push('\n');
            }
            std::fs::write(&self.path, out)
                .map_err(|source| JsonRepositoryError::Write { path: self.path.display().to_string(), source })?;
        }
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcguard_core::{AuditRecordBuilder, ListBuilder, ListEntryBuilder, ListKind};
    use tempfile::tempdir;

    #[tokio::test]
    async fn empty_lists_file_reads_as_empty_vec() {
        let dir = tempdir().unwrap();
        let repo = JsonListRepository::new(dir.path());
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_all_then_get_all_round_trips() {
        let dir = tempdir().unwrap();
        let repo = JsonListRepository::new(dir.path());
        let list = ListBuilder::default().kind(ListKind::Blacklist).build();
        repo.replace_all(&[list.clone()]).unwrap();
        let fetched = repo.get_all().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, list.id);
    }

    #[tokio::test]
    async fn entries_filtered_by_list_id() {
        let dir = tempdir().unwrap();
        let repo = JsonListEntryRepository::new(dir.path());
        let list_a = ListBuilder::default().build();
        let list_b = ListBuilder::default().build();
        let entry_a = ListEntryBuilder::default().list_id(list_a.id).build();
        let entry_b = ListEntryBuilder::default().list_id(list_b.id).build();
        repo.replace_all(&[entry_a.clone(), entry_b]).unwrap();

        let fetched = repo.get_by_list_id(&list_a.id).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, entry_a.id);
    }

    #[tokio::test]
    async fn audit_create_then_count_round_trips() {
        let dir = tempdir().unwrap();
        let repo = JsonAuditRepository::new(dir.path());
        let mut record = AuditRecordBuilder::default().build();
        record.timestamp_ms = 1_000;
        repo.create(&record).await.unwrap();
        assert_eq!(repo.count_by_time_range(0, 2_000).await.unwrap(), 1);
        assert_eq!(repo.count_by_time_range(2_000, 3_000).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_removes_only_records_older_than_cutoff() {
        let dir = tempdir().unwrap();
        let repo = JsonAuditRepository::new(dir.path());
        let mut old = AuditRecordBuilder::default().build();
        old.timestamp_ms = 1_000;
        let mut recent = AuditRecordBuilder::default().build();
        recent.timestamp_ms = 9_000;
        repo.create(&old).await.unwrap();
        repo.create(&recent).await.unwrap();

        let removed = repo.cleanup_old_logs(5_000).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.count_by_time_range(0, 20_000).await.unwrap(), 1);
    }
}
