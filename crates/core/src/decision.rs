// SPDX-License-Identifier: MIT

//! The Decision Engine's output type, cache key, and the trait other
//! crates consume it through.

use crate::rule::{FilterRule, RuleId};
use crate::target::TargetKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Allow,
    Block,
}

/// The pure-function output of the Decision Engine for one target.
///
/// Carries no identity of its own; it is cached under `(target_kind,
/// target_value)` alongside the rule-set version it was computed against
/// (I4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub reason: String,
    pub rule_ref: Option<RuleId>,
    pub target_kind: TargetKind,
    pub target_value: String,
    pub made_at_ms: u64,
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        matches!(self.action, DecisionAction::Block)
    }
}

/// Cache key for the Decision Engine's bounded LRU (§4.5 "Cache").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionCacheKey {
    pub target_kind: TargetKind,
    pub target_value: String,
}

/// The Decision Engine's external contract (§4.5), consumed by the DNS
/// Resolver (which evaluates every query against it) and the Rule
/// Synchronizer (which mutates its rule set on each sync cycle). Lives in
/// `pcguard-core` so `pcguard-dns` and `pcguard-engine` can both depend on
/// it without a cycle between them — the DNS Resolver's `AddRule`/
/// `RemoveRule`/`GetRules` (§4.3) simply delegate to whatever concrete
/// Decision Engine instance is bound to it.
#[async_trait]
pub trait Decider: Send + Sync {
    /// Evaluate one target. Pure except for the cache/stats side effects
    /// described in §4.5 — never blocks on I/O.
    async fn decide(&self, target_kind: TargetKind, target_value: &str) -> Decision;

    fn add_rule(&self, rule: FilterRule);
    fn remove_rule(&self, id: RuleId);
    fn get_rules(&self) -> Vec<FilterRule>;
}
