// SPDX-License-Identifier: MIT

//! Audit records persisted by the Audit Sink. Enqueued by any component;
//! the core never writes anywhere else in the repository (§3 Ownership).

use crate::rule::RuleAction;
use crate::stats::AuditSinkStats;
use crate::target::TargetKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an [`AuditRecord`].
    pub struct AuditId("aud-");
}

/// What kind of event produced this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Enforcement,
    RuleChange,
    UserAction,
    SystemEvent,
}

/// Which list kind (if any) produced the enforcement decision this
/// record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Whitelist,
    Blacklist,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub timestamp_ms: u64,
    pub event_kind: AuditEventKind,
    pub target_kind: TargetKind,
    pub target_value: String,
    pub action: RuleAction,
    pub rule_kind: RuleKind,
    pub rule_id: Option<String>,
    #[serde(default)]
    pub details: IndexMap<String, String>,
}

/// A request to append one [`AuditRecord`]. Built by the caller (DNS
/// Resolver, Synchronizer, Engine, ...) and handed to an [`AuditSink`];
/// `timestamp_ms` and `id` are assigned by the sink at enqueue time.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub event_kind: AuditEventKind,
    pub target_kind: TargetKind,
    pub target_value: String,
    pub action: RuleAction,
    pub rule_kind: RuleKind,
    pub rule_id: Option<String>,
    pub details: IndexMap<String, String>,
}

/// The Audit Sink's contract (§4.7), consumed by every other component
/// without any of them writing to the repository directly (§3
/// Ownership). Enqueueing is synchronous and never blocks enforcement —
/// the sink is responsible for its own backpressure (§4.7, §5).
pub trait AuditSink: Send + Sync {
    fn log(&self, entry: AuditEntry);

    /// Counters for the engine-level `Stats()` rollup. Sinks with no
    /// background pipeline (e.g. [`NullAuditSink`]) report zeroes.
    fn stats(&self) -> AuditSinkStats {
        AuditSinkStats::default()
    }
}

crate::builder! {
    pub struct AuditRecordBuilder => AuditRecord {
        set { timestamp_ms: u64 = 0 }
        set { event_kind: AuditEventKind = AuditEventKind::Enforcement }
        set { target_kind: TargetKind = TargetKind::Url }
        into { target_value: String = "ads.example.com" }
        set { action: RuleAction = RuleAction::Block }
        set { rule_kind: RuleKind = RuleKind::Blacklist }
        option { rule_id: String = None }
        computed { id: AuditId = AuditId::new() }
        computed { details: IndexMap<String, String> = IndexMap::new() }
    }
}

/// Discards everything. Used as the default sink in tests that don't
/// care about audit output, and as a safe placeholder before the real
/// `pcguard-storage` sink is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn log(&self, _entry: AuditEntry) {}
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every entry in memory for assertions.
    #[derive(Clone, Default)]
    pub struct RecordingAuditSink {
        entries: Arc<Mutex<Vec<AuditEntry>>>,
    }

    impl RecordingAuditSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entries(&self) -> Vec<AuditEntry> {
            self.entries.lock().clone()
        }
    }

    impl AuditSink for RecordingAuditSink {
        fn log(&self, entry: AuditEntry) {
            self.entries.lock().push(entry);
        }
    }
}
