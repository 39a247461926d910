// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to open wal at {path}: {source}")]
    WalOpen { path: String, #[source] source: std::io::Error },

    #[error("failed to append to wal: {0}")]
    WalAppend(std::io::Error),

    #[error("failed to compress archived wal segment: {0}")]
    WalCompress(std::io::Error),

    #[error("malformed wal record at byte offset {offset}: {source}")]
    WalDecode { offset: u64, source: serde_json::Error },

    #[error("repository error: {0}")]
    Repository(#[from] pcguard_core::RepositoryError),
}

/// Errors reading/writing the JSON-file-backed list, entry, and audit
/// stores (`pcguard-storage::json_repository`).
#[derive(Debug, Error)]
pub enum JsonRepositoryError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: String, #[source] source: std::io::Error },

    #[error("malformed json in {path}: {source}")]
    Decode { path: String, #[source] source: serde_json::Error },
}

impl From<JsonRepositoryError> for pcguard_core::RepositoryError {
    fn from(e: JsonRepositoryError) -> Self {
        pcguard_core::RepositoryError::Backend(e.to_string())
    }
}
