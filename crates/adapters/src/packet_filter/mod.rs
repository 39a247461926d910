// SPDX-License-Identifier: MIT

//! Packet Filter Adapter (§4.4): a narrow capability installing/removing
//! host-level deny rules, with a platform probe selecting between
//! concrete mechanisms (REDESIGN FLAG, spec.md §9).

mod iptables;
mod noop;
mod wfp;

pub use iptables::IptablesAdapter;
pub use noop::NoOpAdapter;
pub use wfp::WfpAdapter;

use async_trait::async_trait;
use pcguard_core::{FilterRule, SystemInfo};
use thiserror::Error;

/// Errors from packet-filter operations (§7 `CommandFailed`).
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("match kind unsupported by this adapter: {0:?}")]
    UnsupportedMatch(pcguard_core::MatchKind),

    #[error("rule not found: {0}")]
    NotFound(pcguard_core::RuleId),
}

/// Uniform contract implemented by each platform mechanism (§4.4).
#[async_trait]
pub trait PacketFilterAdapter: Send + Sync {
    /// Create our dedicated chain and jump into the outbound path.
    /// Idempotent: calling twice on an already-present chain is a no-op.
    async fn start(&self) -> Result<(), FilterError>;

    /// Remove the jump, flush, and delete our chain. Must leave the
    /// host's baseline rules untouched on every exit path (I6).
    async fn stop(&self) -> Result<(), FilterError>;

    /// Install a host-level Block for `rule`. Transactional per protocol:
    /// if installing HTTPS fails after HTTP succeeded, HTTP is rolled
    /// back before returning failure.
    async fn add_rule(&self, rule: &FilterRule) -> Result<(), FilterError>;

    /// Remove the rule previously installed for `id`. Ignores
    /// "not present" errors so Stop-time cleanup is idempotent.
    async fn remove_rule(&self, id: pcguard_core::RuleId) -> Result<(), FilterError>;

    /// Platform name, mechanism version, and count of active rules.
    async fn system_info(&self) -> SystemInfo;
}

/// Probe the host for the best available mechanism.
///
/// Prefers [`IptablesAdapter`] when `iptables` is on `PATH` and usable
/// (not merely present — a Linux host without `CAP_NET_ADMIN` still
/// falls back to [`NoOpAdapter`]), per the capability-probe REDESIGN
/// FLAG: selection happens at construction, not behind a compile-time
/// `cfg!` dialect.
pub async fn probe() -> Box<dyn PacketFilterAdapter> {
    #[cfg(target_os = "linux")]
    {
        if let Some(adapter) = IptablesAdapter::probe().await {
            return Box::new(adapter);
        }
    }
    Box::new(NoOpAdapter::new())
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeState {
        rules: HashMap<pcguard_core::RuleId, FilterRule>,
        started: bool,
        fail_add: Option<pcguard_core::RuleId>,
    }

    /// In-memory fake used by engine/daemon tests; never shells out.
    #[derive(Clone, Default)]
    pub struct FakeFilterAdapter {
        inner: Arc<Mutex<FakeState>>,
    }

    impl FakeFilterAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next `add_rule` for `id` fail, simulating a
        /// `CommandFailed` (§7: the Synchronizer must skip and retry).
        pub fn fail_next_add(&self, id: pcguard_core::RuleId) {
            self.inner.lock().fail_add = Some(id);
        }

        pub fn installed_rules(&self) -> Vec<pcguard_core::RuleId> {
            self.inner.lock().rules.keys().copied().collect()
        }
    }

    #[async_trait]
    impl PacketFilterAdapter for FakeFilterAdapter {
        async fn start(&self) -> Result<(), FilterError> {
            self.inner.lock().started = true;
            Ok(())
        }

        async fn stop(&self) -> Result<(), FilterError> {
            let mut state = self.inner.lock();
            state.started = false;
            state.rules.clear();
            Ok(())
        }

        async fn add_rule(&self, rule: &FilterRule) -> Result<(), FilterError> {
            let mut state = self.inner.lock();
            if state.fail_add == Some(rule.id) {
                state.fail_add = None;
                return Err(FilterError::CommandFailed("injected failure".into()));
            }
            state.rules.insert(rule.id, rule.clone());
            Ok(())
        }

        async fn remove_rule(&self, id: pcguard_core::RuleId) -> Result<(), FilterError> {
            self.inner.lock().rules.remove(&id);
            Ok(())
        }

        async fn system_info(&self) -> SystemInfo {
            let state = self.inner.lock();
            SystemInfo {
                platform: "fake".into(),
                filter_mechanism: "fake".into(),
                filter_mechanism_version: "0".into(),
                active_rule_count: state.rules.len(),
                engine_version: env!("CARGO_PKG_VERSION").into(),
                uptime_ms: 0,
            }
        }
    }
}
