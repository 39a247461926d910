// SPDX-License-Identifier: MIT

//! Aggregate counters surfaced by the various `Stats()`/`SystemInfo()`
//! operations named in §6.

use serde::{Deserialize, Serialize};

/// Per-subcomponent counters, shared by the DNS Resolver, Decision
/// Engine, and Audit Sink stats surfaces (§4.3, §4.5, §4.7) rather than
/// three near-identical structs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total: u64,
    pub blocked: u64,
    pub allowed: u64,
    pub forwarded: u64,
    pub cache_hits: u64,
}

/// A running mean, updated per observation without retaining history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RollingAverage {
    pub count: u64,
    pub mean_ms: f64,
}

impl RollingAverage {
    pub fn observe(&mut self, sample_ms: f64) {
        self.count += 1;
        self.mean_ms += (sample_ms - self.mean_ms) / self.count as f64;
    }
}

/// Aggregate counters for the whole engine (SPEC_FULL §3 `EngineStats`),
/// rolling up the DNS, decision, process, and audit subsystems into one
/// payload for the admin protocol's `Stats` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub dns: Counters,
    pub decisions: Counters,
    pub audit_total_logged: u64,
    pub audit_buffered: u64,
    pub audit_batch_count: u64,
    pub audit_failed: u64,
    pub audit_avg_latency_ms: f64,
    pub decision_avg_latency: RollingAverage,
}

/// Snapshot of the Audit Sink's counters (§4.7), rolled into
/// [`EngineStats`] by the engine's `Stats()` operation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AuditSinkStats {
    pub total_logged: u64,
    pub buffered: u64,
    pub batch_count: u64,
    pub failed: u64,
    pub avg_latency_ms: f64,
}

/// Payload for `PacketFilter.SystemInfo()` and the engine-level
/// `SystemInfo()` operation (SPEC_FULL §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub platform: String,
    pub filter_mechanism: String,
    pub filter_mechanism_version: String,
    pub active_rule_count: usize,
    pub engine_version: String,
    pub uptime_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_average_converges_to_constant_sample() {
        let mut avg = RollingAverage::default();
        for _ in 0..10 {
            avg.observe(5.0);
        }
        assert!((avg.mean_ms - 5.0).abs() < f64::EPSILON);
        assert_eq!(avg.count, 10);
    }

    #[test]
    fn rolling_average_of_two_distinct_samples() {
        let mut avg = RollingAverage::default();
        avg.observe(0.0);
        avg.observe(10.0);
        assert!((avg.mean_ms - 5.0).abs() < 1e-9);
    }
}
