// SPDX-License-Identifier: MIT

//! Windows Filtering Platform stub.
//!
//! Named and documented to satisfy the capability-variant design
//! (spec.md §9), but WFP integration is not wired up in this build: the
//! probe in `super::probe` never selects it outside `cfg(windows)`, so
//! it is inert on the reference platform.

use super::{FilterError, PacketFilterAdapter};
use async_trait::async_trait;
use pcguard_core::{FilterRule, RuleId, SystemInfo};

pub struct WfpAdapter;

impl WfpAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WfpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PacketFilterAdapter for WfpAdapter {
    async fn start(&self) -> Result<(), FilterError> {
        Err(FilterError::CommandFailed("WFP adapter is not wired up in this build".into()))
    }

    async fn stop(&self) -> Result<(), FilterError> {
        Ok(())
    }

    async fn add_rule(&self, _rule: &FilterRule) -> Result<(), FilterError> {
        Err(FilterError::CommandFailed("WFP adapter is not wired up in this build".into()))
    }

    async fn remove_rule(&self, _id: RuleId) -> Result<(), FilterError> {
        Ok(())
    }

    async fn system_info(&self) -> SystemInfo {
        SystemInfo {
            platform: "windows".into(),
            filter_mechanism: "wfp".into(),
            filter_mechanism_version: "unwired".into(),
            active_rule_count: 0,
            engine_version: env!("CARGO_PKG_VERSION").into(),
            uptime_ms: 0,
        }
    }
}
