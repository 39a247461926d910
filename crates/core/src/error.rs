// SPDX-License-Identifier: MIT

//! Shared error kinds used below the per-crate `thiserror` enums
//! (SPEC_FULL §7): configuration loading and the repository contract
//! both live in this crate, so their errors do too.

use thiserror::Error;

/// Errors loading or validating the engine [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by repository implementations consumed read-only by
/// the core (§6 "Repository").
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository backend failure: {0}")]
    Backend(String),

    #[error("not found: {0}")]
    NotFound(String),
}
