// SPDX-License-Identifier: MIT

//! Repository contracts consumed read-only by the core (§6 "Repository").
//!
//! The core never writes to entity tables; `pcguard-storage` provides a
//! concrete implementation, and the durable schema/migrations behind it
//! are explicitly out of scope (§1).

use crate::audit::AuditRecord;
use crate::error::RepositoryError;
use crate::list::{List, ListId};
use crate::list_entry::ListEntry;
use async_trait::async_trait;

/// Read access to admin-managed [`List`]s.
#[async_trait]
pub trait ListRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<List>, RepositoryError>;
}

/// Read access to [`ListEntry`] rows belonging to a list.
#[async_trait]
pub trait ListEntryRepository: Send + Sync {
    async fn get_by_list_id(&self, id: &ListId) -> Result<Vec<ListEntry>, RepositoryError>;
}

/// Write-only (from the core's perspective) audit persistence.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create(&self, record: &AuditRecord) -> Result<(), RepositoryError>;

    /// Count records with `timestamp_ms` in `[from_ms, to_ms)`.
    async fn count_by_time_range(&self, from_ms: u64, to_ms: u64) -> Result<u64, RepositoryError>;

    /// Remove every record older than `before_ms`; returns the count removed.
    async fn cleanup_old_logs(&self, before_ms: u64) -> Result<u64, RepositoryError>;
}
