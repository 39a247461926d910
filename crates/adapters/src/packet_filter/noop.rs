// SPDX-License-Identifier: MIT

//! No-op mechanism for platforms without privileged access, or a Linux
//! host missing `CAP_NET_ADMIN`. Records rules in memory only so the
//! Synchronizer's add/remove bookkeeping still behaves correctly; never
//! touches the host's actual packet path.

use super::{FilterError, PacketFilterAdapter};
use async_trait::async_trait;
use parking_lot::Mutex;
use pcguard_core::{FilterRule, RuleId, SystemInfo};
use std::collections::HashSet;
use std::time::Instant;

#[derive(Default)]
pub struct NoOpAdapter {
    rules: Mutex<HashSet<RuleId>>,
    started_at: Mutex<Option<Instant>>,
}

impl NoOpAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PacketFilterAdapter for NoOpAdapter {
    async fn start(&self) -> Result<(), FilterError> {
        self.started_at.lock().get_or_insert_with(Instant::now);
        Ok(())
    }

    async fn stop(&self) -> Result<(), FilterError> {
        self.rules.lock().clear();
        *self.started_at.lock() = None;
        Ok(())
    }

    async fn add_rule(&self, rule: &FilterRule) -> Result<(), FilterError> {
        self.rules.lock().insert(rule.id);
        Ok(())
    }

    async fn remove_rule(&self, id: RuleId) -> Result<(), FilterError> {
        self.rules.lock().remove(&id);
        Ok(())
    }

    async fn system_info(&self) -> SystemInfo {
        SystemInfo {
            platform: std::env::consts::OS.into(),
            filter_mechanism: "noop".into(),
            filter_mechanism_version: "1".into(),
            active_rule_count: self.rules.lock().len(),
            engine_version: env!("CARGO_PKG_VERSION").into(),
            uptime_ms: self.started_at.lock().map(|t| t.elapsed().as_millis() as u64).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_is_idempotent() {
        let adapter = NoOpAdapter::new();
        adapter.start().await.unwrap();
        adapter.start().await.unwrap();
        assert!(adapter.system_info().await.uptime_ms < 1_000);
    }

    #[tokio::test]
    async fn stop_clears_active_rules() {
        let adapter = NoOpAdapter::new();
        let rule = pcguard_core::FilterRule::builder().build();
        adapter.add_rule(&rule).await.unwrap();
        adapter.stop().await.unwrap();
        assert_eq!(adapter.system_info().await.active_rule_count, 0);
    }
}
