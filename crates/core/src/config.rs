// SPDX-License-Identifier: MIT

//! Engine configuration: defaults, overridden by an optional TOML file,
//! overridden again by `PCGUARD_*` environment variables (SPEC_FULL §6).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::time::Duration;

/// Default action when no rule matches a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    Allow,
    Block,
}

/// How a blocked DNS query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockResponseMode {
    Sinkhole,
    Nxdomain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub process_poll_interval_ms: u64,
    pub enable_network_filtering: bool,
    pub max_concurrent_checks: usize,
    pub cache_timeout_secs: u64,
    pub decision_cache_capacity: usize,
    pub decision_cache_shards: usize,
    pub block_unknown_processes: bool,
    pub log_all_activity: bool,

    pub dns_listen_address: String,
    pub sinkhole_ipv4: IpAddr,
    pub sinkhole_ipv6: IpAddr,
    pub sinkhole_ttl_secs: u32,
    pub block_response_mode: BlockResponseMode,
    pub upstream_dns: Vec<String>,
    pub dns_cache_ttl_secs: u64,
    pub upstream_query_deadline_ms: u64,
    pub upstream_unhealthy_threshold: u32,
    pub upstream_cooldown_secs: u64,

    pub audit_buffer_size: usize,
    pub audit_batch_size: usize,
    pub audit_batch_timeout_ms: u64,
    pub audit_flush_interval_ms: u64,
    pub audit_retention_days: u32,
    pub audit_cleanup_interval_secs: u64,

    pub default_policy: DefaultPolicy,
    pub shutdown_timeout_secs: u64,
    pub sync_interval_secs: u64,

    /// Ambient additions beyond spec.md, per SPEC_FULL §6.
    pub admin_socket_path: String,
    pub log_level: String,
    /// Directory holding persisted state: list/entry JSON files, the
    /// audit WAL, and the audit log.
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_poll_interval_ms: 1_000,
            enable_network_filtering: true,
            max_concurrent_checks: 64,
            cache_timeout_secs: 300,
            decision_cache_capacity: 4096,
            decision_cache_shards: 16,
            block_unknown_processes: false,
            log_all_activity: false,

            dns_listen_address: "127.0.0.1:53".to_string(),
            sinkhole_ipv4: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sinkhole_ipv6: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            sinkhole_ttl_secs: 60,
            block_response_mode: BlockResponseMode::Sinkhole,
            upstream_dns: vec!["1.1.1.1:53".to_string(), "8.8.8.8:53".to_string()],
            dns_cache_ttl_secs: 300,
            upstream_query_deadline_ms: 2_000,
            upstream_unhealthy_threshold: 3,
            upstream_cooldown_secs: 30,

            audit_buffer_size: 1_000,
            audit_batch_size: 50,
            audit_batch_timeout_ms: 5_000,
            audit_flush_interval_ms: 10_000,
            audit_retention_days: 30,
            audit_cleanup_interval_secs: 86_400,

            default_policy: DefaultPolicy::Allow,
            shutdown_timeout_secs: 30,
            sync_interval_secs: 30,

            admin_socket_path: "/tmp/pcguard/admin.sock".to_string(),
            log_level: "info".to_string(),
            data_dir: "/var/lib/pcguard".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration by layering: built-in defaults, then an
    /// optional TOML file, then `PCGUARD_`-prefixed environment
    /// variables (the last source wins).
    pub fn load(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let defaults_value = config::Config::try_from(&defaults)?;

        let mut builder = config::Config::builder().add_source(defaults_value);
        if let Some(path) = toml_path {
            builder = builder.add_source(
                config::File::from(path).required(false).format(config::FileFormat::Toml),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("PCGUARD").separator("__").try_parsing(true),
        );

        let merged = builder.build()?;
        let config: Config = merged.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_dns.is_empty() {
            return Err(ConfigError::Invalid("upstream-dns must not be empty".into()));
        }
        if self.decision_cache_shards == 0 {
            return Err(ConfigError::Invalid("decision-cache-shards must be nonzero".into()));
        }
        Ok(())
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn audit_batch_timeout(&self) -> Duration {
        Duration::from_millis(self.audit_batch_timeout_ms)
    }

    pub fn audit_flush_interval(&self) -> Duration {
        Duration::from_millis(self.audit_flush_interval_ms)
    }

    pub fn audit_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.audit_cleanup_interval_secs)
    }

    pub fn audit_retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.audit_retention_days) * 86_400)
    }

    pub fn data_dir(&self) -> &Path {
        Path::new(&self.data_dir)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
