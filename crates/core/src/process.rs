// SPDX-License-Identifier: MIT

//! Process observation types shared by the Process Monitor and Process
//! Identifier.

use serde::{Deserialize, Serialize};

/// OS process id. A `u32` rather than a newtype: it is compared against
/// and passed to `sysinfo`/`nix` APIs at every call site, so wrapping it
/// would only add `.0` noise.
pub type Pid = u32;

/// A signature the Process Identifier matches observed processes against.
///
/// Identified by `name` (the logical name, e.g. `"chrome"`), not a
/// generated id — the static table is keyed by this name and it doubles
/// as the audit `target-value` for executable rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSignature {
    pub name: String,
    /// Glob pattern matched against the observed executable path, if set.
    pub path_glob: Option<String>,
    /// Expected SHA-256 digest of the executable, if set.
    pub hash: Option<String>,
}

crate::builder! {
    pub struct ProcessSignatureBuilder => ProcessSignature {
        into { name: String = "badapp" }
        option { path_glob: String = None }
        option { hash: String = None }
    }
}

impl ProcessSignature {
    /// Case-insensitive equality on `name`, as required by §4.2.
    pub fn matches_name(&self, observed_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(observed_name)
    }
}

/// A process observed by the Process Monitor.
///
/// Identity is `(pid, started_at_ms)`: a pid reused by the OS for a new
/// process is a distinct `ProcessInfo`, per the pid-reuse handling
/// described in §4.1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub executable_path: String,
    pub parent_pid: Option<Pid>,
    pub started_at_ms: u64,
}

crate::builder! {
    pub struct ProcessInfoBuilder => ProcessInfo {
        set { pid: Pid = 1 }
        into { name: String = "badapp" }
        into { executable_path: String = "/usr/bin/badapp" }
        option { parent_pid: Pid = None }
        set { started_at_ms: u64 = 0 }
    }
}

/// A state transition the Process Monitor emits on `Subscribe()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessEvent {
    Started(ProcessInfo),
    Stopped(ProcessInfo),
    /// Synthesized when a slow subscriber's buffer overflowed and `n`
    /// events were dropped before delivery could resume (§4.1, REDESIGN
    /// FLAG in the Open Questions).
    Dropped(u64),
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
