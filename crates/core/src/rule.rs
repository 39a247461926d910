// SPDX-License-Identifier: MIT

//! Rules derived by the Rule Synchronizer from [`crate::list_entry::ListEntry`]
//! values. Never persisted by the core itself — the repository's list/entry
//! tables are the single source of truth (§9 "Mixed in-memory and database
//! session stores").

use crate::list::ListId;
use crate::list_entry::ListEntryId;
use crate::target::{MatchKind, TargetKind};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Action a matching rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Block,
}

/// Stable identifier for a [`FilterRule`], deterministic from the
/// `(list-id, entry-id)` pair it was derived from rather than random —
/// two synchronizer passes over the same entry always produce the same
/// rule id, which is what makes the add/remove diff in §4.6 a plain set
/// difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl RuleId {
    pub fn derive(list_id: &ListId, entry_id: &ListEntryId) -> Self {
        let mut hasher = DefaultHasher::new();
        list_id.as_str().hash(&mut hasher);
        entry_id.as_str().hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A concrete, evaluatable rule. Projected by the Rule Synchronizer from
/// list entries (§4.6) and consumed by the Decision Engine and Packet
/// Filter Adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub id: RuleId,
    pub name: String,
    pub target_kind: TargetKind,
    pub pattern: String,
    pub match_kind: MatchKind,
    pub action: RuleAction,
    pub priority: i32,
    pub enabled: bool,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl FilterRule {
    /// Sort key implementing (I2): priority descending, then match-kind
    /// specificity (exact > domain > wildcard), then rule-id ascending.
    pub fn ordering_key(&self) -> (std::cmp::Reverse<i32>, u8, RuleId) {
        (std::cmp::Reverse(self.priority), self.match_kind.specificity_rank(), self.id)
    }
}

crate::builder! {
    pub struct FilterRuleBuilder => FilterRule {
        into { name: String = "test-rule" }
        set { target_kind: TargetKind = TargetKind::Url }
        into { pattern: String = "example.com" }
        set { match_kind: MatchKind = MatchKind::Domain }
        set { action: RuleAction = RuleAction::Block }
        set { priority: i32 = 1 }
        set { enabled: bool = true }
        set { created_at_ms: u64 = 0 }
        set { updated_at_ms: u64 = 0 }
        computed { id: RuleId = RuleId::derive(&ListId::new(), &ListEntryId::new()) }
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
