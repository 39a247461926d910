// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcguard-core: shared domain types for the enforcement core.
//!
//! Holds the data model (§3), configuration (§6), and the small set of
//! primitives (clock, id, glob matcher) every other crate in the
//! workspace builds on. Contains no I/O and no long-running loops; those
//! live in `pcguard-dns`, `pcguard-adapters`, `pcguard-engine`, and
//! `pcguard-storage`.

pub mod macros;

pub mod admin;
pub mod audit;
pub mod clock;
pub mod config;
pub mod decision;
pub mod dns_query;
pub mod error;
pub mod glob;
pub mod id;
pub mod list;
pub mod list_entry;
pub mod process;
pub mod repository;
pub mod rule;
pub mod stats;
pub mod target;

pub use admin::{AdminRequest, AdminResponse, KillOutcome, SyncSummary};
pub use audit::{AuditEntry, AuditEventKind, AuditId, AuditRecord, AuditSink, NullAuditSink, RuleKind};
#[cfg(any(test, feature = "test-support"))]
pub use audit::AuditRecordBuilder;
#[cfg(any(test, feature = "test-support"))]
pub use audit::fake::RecordingAuditSink;
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{BlockResponseMode, Config, DefaultPolicy};
pub use decision::{Decider, Decision, DecisionAction, DecisionCacheKey};
pub use dns_query::{DnsQuery, QType};
pub use error::{ConfigError, RepositoryError};
pub use id::{short, IdBuf};
#[cfg(any(test, feature = "test-support"))]
pub use list::ListBuilder;
pub use list::{List, ListId, ListKind};
#[cfg(any(test, feature = "test-support"))]
pub use list_entry::ListEntryBuilder;
pub use list_entry::{ListEntry, ListEntryId, PATTERN_MAX_LEN};
#[cfg(any(test, feature = "test-support"))]
pub use process::{ProcessInfoBuilder, ProcessSignatureBuilder};
pub use process::{Pid, ProcessEvent, ProcessInfo, ProcessSignature};
pub use repository::{AuditRepository, ListEntryRepository, ListRepository};
#[cfg(any(test, feature = "test-support"))]
pub use rule::FilterRuleBuilder;
pub use rule::{FilterRule, RuleAction, RuleId};
pub use stats::{AuditSinkStats, Counters, EngineStats, RollingAverage, SystemInfo};
pub use target::{MatchKind, TargetKind};
