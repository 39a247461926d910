// SPDX-License-Identifier: MIT

//! Admin protocol request/response types (SPEC_FULL §6): the wire shape
//! `pcguardctl` and `pcguardd` exchange over the admin Unix socket.
//!
//! Lives in `pcguard-core` (not `pcguard-daemon`) so the CLI can depend
//! on the type definitions without depending on the daemon binary's
//! runtime crates. Framing (4-byte big-endian length prefix + JSON
//! payload) is implemented by each side separately since it needs an
//! async runtime this crate doesn't otherwise depend on.

use crate::process::{Pid, ProcessInfo, ProcessSignature};
use crate::rule::{FilterRule, RuleId};
use crate::stats::{EngineStats, SystemInfo};
use serde::{Deserialize, Serialize};

/// One call against the engine's own operation surface (§6): every
/// variant here maps 1:1 to an `EnforcementEngine` method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op")]
pub enum AdminRequest {
    Ping,
    AddProcessSignature { signature: ProcessSignature },
    AddNetworkRule { rule: FilterRule },
    RemoveNetworkRule { id: RuleId },
    GetCurrentRules,
    ClearAllRules,
    SyncRules,
    GetProcesses,
    KillProcess { pid: Pid, graceful: bool },
    KillProcessByName { pattern: String, graceful: bool },
    IsProcessRunning { pid: Pid },
    Stats,
    SystemInfo,
}

/// One kill outcome within a `KillProcessByName` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KillOutcome {
    pub pid: Pid,
    pub ok: bool,
    pub error: Option<String>,
}

/// Result of one `SyncRules` call, mirrored from
/// [`crate`]-adjacent `pcguard-engine::SyncReport`] without a dependency
/// edge from core to engine (engine depends on core, not vice versa).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
    pub skipped_filter_failures: usize,
    pub terminated_processes: usize,
    pub rule_set_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result")]
pub enum AdminResponse {
    Pong,
    Ok,
    Error { message: String },
    Rules { rules: Vec<FilterRule> },
    Processes { processes: Vec<ProcessInfo> },
    Running { running: bool },
    Stats { stats: EngineStats },
    SystemInfo { info: SystemInfo },
    SyncReport { report: SyncSummary },
    KillResults { results: Vec<KillOutcome> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serde_round_trips_through_json() {
        let req = AdminRequest::KillProcess { pid: 42, graceful: true };
        let json = serde_json::to_string(&req).unwrap();
        let back: AdminRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn response_tag_distinguishes_variants() {
        let resp = AdminResponse::Error { message: "boom".into() };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\":\"Error\""));
    }
}
