// SPDX-License-Identifier: MIT

//! Decision Engine (§4.5): pure, in-memory rule evaluator, sharded-LRU
//! cached, with a last-DNS-label index bounding candidate rules to O(k).

use crate::cache::DecisionCache;
use async_trait::async_trait;
use parking_lot::RwLock;
use pcguard_core::glob::{domain_match, glob_match_ci};
use pcguard_core::{
    Clock, Decider, Decision, DecisionAction, DecisionCacheKey, DefaultPolicy, FilterRule,
    MatchKind, RuleAction, RuleId, TargetKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

struct RuleIndex {
    /// Rules keyed by the last label of a `domain`/`exact` pattern (e.g.
    /// `"com"` for `ads.example.com`), for O(k) candidate lookup.
    by_last_label: HashMap<String, Vec<FilterRule>>,
    /// Rules whose pattern has no concrete last label to index on (glob
    /// patterns like `*.ads.*`), always scanned.
    overflow: Vec<FilterRule>,
}

impl RuleIndex {
    fn empty() -> Self {
        Self { by_last_label: HashMap::new(), overflow: Vec::new() }
    }

    fn build(rules: Vec<FilterRule>) -> Self {
        let mut index = Self::empty();
        for rule in rules {
            match last_label(&rule.pattern) {
                Some(label) if rule.match_kind != MatchKind::Wildcard => {
                    index.by_last_label.entry(label).or_default().push(rule);
                }
                _ => index.overflow.push(rule),
            }
        }
        index
    }

    fn candidates(&self, target: &str) -> Vec<&FilterRule> {
        let mut out: Vec<&FilterRule> = Vec::new();
        if let Some(label) = last_label(target) {
            if let Some(rules) = self.by_last_label.get(&label) {
                out.extend(rules.iter());
            }
        }
        out.extend(self.overflow.iter());
        out
    }

    fn all(&self) -> Vec<FilterRule> {
        let mut out: Vec<FilterRule> =
            self.by_last_label.values().flatten().cloned().collect();
        out.extend(self.overflow.iter().cloned());
        out
    }
}

fn last_label(pattern: &str) -> Option<String> {
    pattern.rsplit('.').next().map(|s| s.to_ascii_lowercase()).filter(|s| !s.is_empty())
}

/// Evaluates `(target_kind, target_value)` against the active rule set
/// (§4.5 evaluation order) with a sharded decision cache in front.
pub struct DecisionEngine<C: Clock> {
    clock: C,
    cache: DecisionCache,
    index: RwLock<RuleIndex>,
    rule_set_version: AtomicU64,
    default_policy: DefaultPolicy,
    total: AtomicU64,
    blocked: AtomicU64,
    allowed: AtomicU64,
}

impl<C: Clock> DecisionEngine<C> {
    pub fn new(
        clock: C,
        cache_capacity: usize,
        cache_shards: usize,
        cache_ttl: Duration,
        default_policy: DefaultPolicy,
    ) -> Self {
        Self {
            clock,
            cache: DecisionCache::new(cache_capacity, cache_shards, cache_ttl),
            index: RwLock::new(RuleIndex::empty()),
            rule_set_version: AtomicU64::new(0),
            default_policy,
            total: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
        }
    }

    /// Replaces the active rule set wholesale and bumps the rule-set
    /// version, flushing the decision cache (§4.6 step 7).
    pub fn replace_rules(&self, rules: Vec<FilterRule>) -> u64 {
        *self.index.write() = RuleIndex::build(rules.into_iter().filter(|r| r.enabled).collect());
        let version = self.rule_set_version.fetch_add(1, Ordering::SeqCst) + 1;
        self.cache.clear();
        version
    }

    pub fn rule_set_version(&self) -> u64 {
        self.rule_set_version.load(Ordering::SeqCst)
    }

    fn matches(rule: &FilterRule, target_kind: TargetKind, target: &str) -> bool {
        if rule.target_kind != target_kind {
            return false;
        }
        match rule.match_kind {
            MatchKind::Exact => rule.pattern.eq_ignore_ascii_case(target),
            MatchKind::Domain => domain_match(&rule.pattern.to_ascii_lowercase(), &target.to_ascii_lowercase()),
            MatchKind::Wildcard => glob_match_ci(&rule.pattern, target),
        }
    }

    pub fn counters(&self) -> pcguard_core::Counters {
        pcguard_core::Counters {
            total: self.total.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            forwarded: 0,
            cache_hits: 0,
        }
    }
}

#[async_trait]
impl<C: Clock> Decider for DecisionEngine<C> {
    async fn decide(&self, target_kind: TargetKind, target_value: &str) -> Decision {
        self.total.fetch_add(1, Ordering::Relaxed);
        let version = self.rule_set_version();
        let key = DecisionCacheKey { target_kind, target_value: target_value.to_string() };

        if let Some(cached) = self.cache.get(&key, version, self.clock.now()) {
            trace!(target = target_value, "decision cache hit");
            if cached.is_blocked() {
                self.blocked.fetch_add(1, Ordering::Relaxed);
            } else {
                self.allowed.fetch_add(1, Ordering::Relaxed);
            }
            return cached;
        }

        let index = self.index.read();
        let mut candidates: Vec<&FilterRule> = index
            .candidates(target_value)
            .into_iter()
            .filter(|r| Self::matches(r, target_kind, target_value))
            .collect();
        candidates.sort_by_key(|r| r.ordering_key());

        let decision = if let Some(block) = candidates.iter().find(|r| r.action == RuleAction::Block) {
            Decision {
                action: DecisionAction::Block,
                reason: "blacklist".into(),
                rule_ref: Some(block.id),
                target_kind,
                target_value: target_value.to_string(),
                made_at_ms: self.clock.epoch_ms(),
            }
        } else if let Some(allow) = candidates.iter().find(|r| r.action == RuleAction::Allow) {
            Decision {
                action: DecisionAction::Allow,
                reason: "whitelist".into(),
                rule_ref: Some(allow.id),
                target_kind,
                target_value: target_value.to_string(),
                made_at_ms: self.clock.epoch_ms(),
            }
        } else {
            Decision {
                action: match self.default_policy {
                    DefaultPolicy::Allow => DecisionAction::Allow,
                    DefaultPolicy::Block => DecisionAction::Block,
                },
                reason: "default".into(),
                rule_ref: None,
                target_kind,
                target_value: target_value.to_string(),
                made_at_ms: self.clock.epoch_ms(),
            }
        };
        drop(index);

        if decision.is_blocked() {
            self.blocked.fetch_add(1, Ordering::Relaxed);
        } else {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        }
        self.cache.put(key, decision.clone(), version, self.clock.now());
        decision
    }

    fn add_rule(&self, rule: FilterRule) {
        let mut index = self.index.write();
        let mut rules = index.all();
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
        *index = RuleIndex::build(rules);
        drop(index);
        self.rule_set_version.fetch_add(1, Ordering::SeqCst);
        self.cache.clear();
    }

    fn remove_rule(&self, id: RuleId) {
        let mut index = self.index.write();
        let mut rules = index.all();
        rules.retain(|r| r.id != id);
        *index = RuleIndex::build(rules);
        drop(index);
        self.rule_set_version.fetch_add(1, Ordering::SeqCst);
        self.cache.clear();
    }

    fn get_rules(&self) -> Vec<FilterRule> {
        self.index.read().all()
    }
}
