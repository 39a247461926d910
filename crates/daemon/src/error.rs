// SPDX-License-Identifier: MIT

//! Startup/shutdown orchestration errors, grounded on the teacher
//! daemon's `LifecycleError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire exclusive lock on {path} (pid {held_by:?} appears to hold it): {source}")]
    LockHeld { path: String, held_by: Option<i32>, #[source] source: std::io::Error },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] pcguard_core::ConfigError),

    #[error("audit sink error: {0}")]
    Audit(#[from] pcguard_storage::AuditError),

    #[error("engine error: {0}")]
    Engine(#[from] pcguard_engine::EngineError),
}
