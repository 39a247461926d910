// SPDX-License-Identifier: MIT

//! Rule Synchronizer (§4.6): reconciles desired rules (from the
//! repository) with installed rules in the Decision Engine and Packet
//! Filter, and forcibly terminates processes matched by a blocked
//! executable entry.

use pcguard_adapters::{FilterError, PacketFilterAdapter, ProcessLister};
use pcguard_core::glob::glob_match_ci;
use pcguard_core::{
    Clock, Decider, FilterRule, ListEntryRepository, ListRepository, RepositoryError, RuleAction,
    RuleId, TargetKind,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result of one synchronization pass, surfaced for stats/admin reporting.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub skipped_filter_failures: usize,
    pub terminated_processes: usize,
    pub rule_set_version: u64,
}

pub struct RuleSynchronizer<C: Clock> {
    clock: C,
    lists: Arc<dyn ListRepository>,
    entries: Arc<dyn ListEntryRepository>,
    decider: Arc<dyn Decider>,
    filter: Arc<dyn PacketFilterAdapter>,
    processes: Arc<dyn ProcessLister>,
}

impl<C: Clock> RuleSynchronizer<C> {
    pub fn new(
        clock: C,
        lists: Arc<dyn ListRepository>,
        entries: Arc<dyn ListEntryRepository>,
        decider: Arc<dyn Decider>,
        filter: Arc<dyn PacketFilterAdapter>,
        processes: Arc<dyn ProcessLister>,
    ) -> Self {
        Self { clock, lists, entries, decider, filter, processes }
    }

    /// One synchronization pass (§4.6 steps 1-7). Never fails its
    /// caller: repository errors are logged and an empty/partial report
    /// returned so a failing first pass can be retried next cycle.
    pub async fn sync(&self) -> SyncReport {
        match self.sync_inner().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "rule synchronization pass failed, will retry next cycle");
                SyncReport::default()
            }
        }
    }

    async fn sync_inner(&self) -> Result<SyncReport, SyncError> {
        let desired = self.desired_rules().await?;
        let current: Vec<FilterRule> = self.decider.get_rules();

        let desired_ids: HashSet<RuleId> = desired.iter().map(|r| r.id).collect();
        let current_ids: HashSet<RuleId> = current.iter().map(|r| r.id).collect();

        let to_add: Vec<&FilterRule> = desired.iter().filter(|r| !current_ids.contains(&r.id)).collect();
        let to_remove: Vec<&FilterRule> = current.iter().filter(|r| !desired_ids.contains(&r.id)).collect();

        let mut report = SyncReport::default();

        for rule in &to_add {
            self.decider.add_rule((*rule).clone());
            match self.filter.add_rule(rule).await {
                Ok(()) => report.added += 1,
                Err(FilterError::CommandFailed(reason)) => {
                    warn!(rule_id = %rule.id, reason, "packet filter rejected rule, rolling back");
                    self.decider.remove_rule(rule.id);
                    report.skipped_filter_failures += 1;
                }
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "packet filter rejected rule, rolling back");
                    self.decider.remove_rule(rule.id);
                    report.skipped_filter_failures += 1;
                }
            }
        }

        for rule in &to_remove {
            if let Err(e) = self.filter.remove_rule(rule.id).await {
                warn!(rule_id = %rule.id, error = %e, "packet filter remove_rule failed, continuing");
            }
            self.decider.remove_rule(rule.id);
            report.removed += 1;
        }

        report.terminated_processes = self.enforce_executable_blocks(&desired).await;
        report.rule_set_version = self.clock.epoch_ms();
        info!(
            added = report.added,
            removed = report.removed,
            skipped = report.skipped_filter_failures,
            terminated = report.terminated_processes,
            "synchronization pass complete"
        );
        Ok(report)
    }

    async fn desired_rules(&self) -> Result<Vec<FilterRule>, SyncError> {
        let lists = self.lists.get_all().await?;
        let mut rules = Vec::new();
        for list in lists.into_iter().filter(|l| l.enabled) {
            let entries = self.entries.get_by_list_id(&list.id).await?;
            for entry in entries.into_iter().filter(|e| e.enabled && e.is_pattern_valid()) {
                let now = self.clock.epoch_ms();
                rules.push(FilterRule {
                    id: RuleId::derive(&list.id, &entry.id),
                    name: format!("{}:{}", list.name, entry.pattern),
                    target_kind: entry.target_kind,
                    pattern: entry.pattern,
                    match_kind: entry.pattern_kind,
                    action: list.kind.action(),
                    priority: 1,
                    enabled: true,
                    created_at_ms: now,
                    updated_at_ms: now,
                });
            }
        }
        Ok(rules)
    }

    /// §4.6 step 6: enumerate current processes and terminate those
    /// matched by a Block entry targeting an executable. Best-effort;
    /// termination failures are logged and retried next cycle.
    async fn enforce_executable_blocks(&self, rules: &[FilterRule]) -> usize {
        let blocked_patterns: Vec<&str> = rules
            .iter()
            .filter(|r| r.target_kind == TargetKind::Executable && r.action == RuleAction::Block)
            .map(|r| r.pattern.as_str())
            .collect();
        if blocked_patterns.is_empty() {
            return 0;
        }

        let processes = self.processes.list().await;
        let mut terminated = 0;
        for process in processes {
            let matched = blocked_patterns.iter().any(|pattern| match_executable(pattern, &process.name));
            if matched {
                match self.processes.terminate(process.pid, true).await {
                    Ok(()) => terminated += 1,
                    Err(e) => warn!(pid = process.pid, error = %e, "failed to terminate blocked process"),
                }
            }
        }
        terminated
    }
}

fn match_executable(pattern: &str, name: &str) -> bool {
    glob_match_ci(pattern, name)
}
