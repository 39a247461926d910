// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcguard-storage: the concrete, durable edges of the core's
//! repository contracts (§6) — a JSON-file-backed [`Lists`]/[`Entries`]
//! read side and the WAL-backed [`WalAuditSink`] (§4.7). Durable schema
//! migrations proper are out of scope (§1); this crate gives the core
//! *something* to read lists/entries from without owning a database.

pub mod audit_sink;
pub mod error;
pub mod json_repository;
pub mod wal;

pub use audit_sink::WalAuditSink;
pub use error::{AuditError, JsonRepositoryError};
pub use json_repository::{JsonAuditRepository, JsonListEntryRepository, JsonListRepository};
