// SPDX-License-Identifier: MIT

//! Text/JSON rendering for admin responses.

use clap::ValueEnum;
use pcguard_core::{EngineStats, FilterRule, KillOutcome, ProcessInfo, SyncSummary, SystemInfo};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_value<T: Serialize + ?Sized>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("failed to encode response as json: {e}"),
        },
        OutputFormat::Text => text(value),
    }
}

pub fn print_rules(format: OutputFormat, rules: &[FilterRule]) {
    print_value(format, rules, |rules| {
        if rules.is_empty() {
            println!("No active rules");
            return;
        }
        for rule in rules {
            println!(
                "{id}  {action:<5}  pri={priority:<4} {enabled}  {kind}:{match_kind}:{pattern}  ({name})",
                id = rule.id,
                action = format!("{:?}", rule.action).to_lowercase(),
                priority = rule.priority,
                enabled = if rule.enabled { "on " } else { "off" },
                kind = rule.target_kind,
                match_kind = format!("{:?}", rule.match_kind).to_lowercase(),
                pattern = rule.pattern,
                name = rule.name,
            );
        }
    });
}

pub fn print_processes(format: OutputFormat, processes: &[ProcessInfo]) {
    print_value(format, processes, |processes| {
        if processes.is_empty() {
            println!("No processes observed yet");
            return;
        }
        for p in processes {
            println!("{:<8} {:<24} {}", p.pid, p.name, p.executable_path);
        }
    });
}

pub fn print_kill_results(format: OutputFormat, results: &[KillOutcome]) {
    print_value(format, results, |results| {
        for r in results {
            match &r.error {
                Some(err) => println!("pid {}: failed ({err})", r.pid),
                None => println!("pid {}: {}", r.pid, if r.ok { "killed" } else { "no-op" }),
            }
        }
    });
}

pub fn print_sync_report(format: OutputFormat, report: &SyncSummary) {
    print_value(format, report, |report| {
        println!(
            "rule set version {}: +{} -{} ({} filter failures, {} processes terminated)",
            report.rule_set_version,
            report.added,
            report.removed,
            report.skipped_filter_failures,
            report.terminated_processes,
        );
    });
}

pub fn print_stats(format: OutputFormat, stats: &EngineStats) {
    print_value(format, stats, |stats| {
        println!(
            "dns: {} total, {} blocked, {} allowed, {} forwarded, {} cache hits",
            stats.dns.total, stats.dns.blocked, stats.dns.allowed, stats.dns.forwarded, stats.dns.cache_hits
        );
        println!(
            "decisions: {} total, {} blocked, {} allowed (avg {:.3}ms over {} samples)",
            stats.decisions.total,
            stats.decisions.blocked,
            stats.decisions.allowed,
            stats.decision_avg_latency.mean_ms,
            stats.decision_avg_latency.count,
        );
        println!(
            "audit: {} logged, {} buffered, {} batches, {} failed (avg {:.3}ms)",
            stats.audit_total_logged,
            stats.audit_buffered,
            stats.audit_batch_count,
            stats.audit_failed,
            stats.audit_avg_latency_ms,
        );
    });
}

pub fn print_system_info(format: OutputFormat, info: &SystemInfo) {
    print_value(format, info, |info| {
        println!("platform:        {}", info.platform);
        println!("filter:          {} ({})", info.filter_mechanism, info.filter_mechanism_version);
        println!("active rules:    {}", info.active_rule_count);
        println!("engine version:  {}", info.engine_version);
        println!("uptime:          {}ms", info.uptime_ms);
    });
}
