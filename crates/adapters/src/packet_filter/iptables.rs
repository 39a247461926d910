// SPDX-License-Identifier: MIT

//! Linux mechanism: shells out to `iptables`, mirroring the corpus's
//! `tokio::process::Command::new("iptables")` pattern. Idempotent `-C`
//! check before `-I`/`-D`; a dedicated chain `PCGUARD_OUT` jumped from
//! `OUTPUT`.

use super::{FilterError, PacketFilterAdapter};
use async_trait::async_trait;
use parking_lot::Mutex;
use pcguard_core::{FilterRule, MatchKind, RuleId, SystemInfo};
use std::collections::HashMap;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

const CHAIN: &str = "PCGUARD_OUT";

/// The concrete argument vector used to install one rule, stored so
/// `remove_rule` can reverse it exactly (§6 "Packet-filter commands").
#[derive(Debug, Clone)]
struct InstalledRule {
    /// One `iptables` invocation's arguments per protocol leg (HTTP,
    /// HTTPS) that were actually applied, in application order.
    legs: Vec<Vec<String>>,
}

pub struct IptablesAdapter {
    binary: String,
    installed: Mutex<HashMap<RuleId, InstalledRule>>,
    started_at: Instant,
}

impl IptablesAdapter {
    /// Probe for a usable `iptables` binary. Returns `None` (meaning the
    /// caller should fall back to [`super::NoOpAdapter`]) if the binary
    /// is missing or a harmless invocation (`-L` on our chain) fails,
    /// e.g. for lack of `CAP_NET_ADMIN`.
    pub async fn probe() -> Option<Self> {
        let adapter = Self {
            binary: "iptables".to_string(),
            installed: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
        };
        let output = Command::new(&adapter.binary).args(["-L", "-n"]).output().await.ok()?;
        if output.status.success() {
            Some(adapter)
        } else {
            None
        }
    }

    async fn run(&self, args: &[&str]) -> Result<bool, FilterError> {
        debug!(?args, "iptables");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| FilterError::CommandFailed(e.to_string()))?;
        Ok(output.status.success())
    }

    async fn chain_exists(&self) -> bool {
        self.run(&["-n", "-L", CHAIN]).await.unwrap_or(false)
    }

    fn match_args(rule: &FilterRule) -> Result<Vec<Vec<String>>, FilterError> {
        // Domain/exact/wildcard rules on `url` targets are expressed as
        // string-match on the HTTP request line (port 80) and the TLS
        // SNI extension (port 443); see §4.4 and the Open Question in
        // spec.md §9 (DNS blocking remains primary, this is augmentation).
        match rule.match_kind {
            MatchKind::Exact | MatchKind::Domain => Ok(vec![
                vec![
                    "-p".into(),
                    "tcp".into(),
                    "--dport".into(),
                    "80".into(),
                    "-m".into(),
                    "string".into(),
                    "--algo".into(),
                    "bm".into(),
                    "--string".into(),
                    format!("Host: {}", rule.pattern),
                    "-j".into(),
                    "DROP".into(),
                ],
                vec![
                    "-p".into(),
                    "tcp".into(),
                    "--dport".into(),
                    "443".into(),
                    "-m".into(),
                    "string".into(),
                    "--algo".into(),
                    "bm".into(),
                    "--string".into(),
                    rule.pattern.clone(),
                    "-j".into(),
                    "DROP".into(),
                ],
            ]),
            MatchKind::Wildcard => Err(FilterError::UnsupportedMatch(MatchKind::Wildcard)),
        }
    }
}

#[async_trait]
impl PacketFilterAdapter for IptablesAdapter {
    async fn start(&self) -> Result<(), FilterError> {
        if !self.chain_exists().await {
            self.run(&["-N", CHAIN]).await?;
        }
        // `-C` (check) before `-I` (insert) keeps the jump idempotent.
        let jump_present = self.run(&["-C", "OUTPUT", "-j", CHAIN]).await.unwrap_or(false);
        if !jump_present {
            self.run(&["-I", "OUTPUT", "-j", CHAIN]).await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), FilterError> {
        let _ = self.run(&["-D", "OUTPUT", "-j", CHAIN]).await;
        let _ = self.run(&["-F", CHAIN]).await;
        let _ = self.run(&["-X", CHAIN]).await;
        self.installed.lock().clear();
        Ok(())
    }

    async fn add_rule(&self, rule: &FilterRule) -> Result<(), FilterError> {
        let legs = Self::match_args(rule)?;
        let mut applied: Vec<Vec<String>> = Vec::with_capacity(legs.len());
        for leg in &legs {
            let mut args: Vec<&str> = vec!["-A", CHAIN];
            args.extend(leg.iter().map(String::as_str));
            match self.run(&args).await {
                Ok(true) => applied.push(leg.clone()),
                Ok(false) | Err(_) => {
                    // Roll back any leg already applied (HTTPS-after-HTTP
                    // transactionality requirement, §4.4).
                    for rolled_back in applied.iter().rev() {
                        let mut del_args: Vec<&str> = vec!["-D", CHAIN];
                        del_args.extend(rolled_back.iter().map(String::as_str));
                        let _ = self.run(&del_args).await;
                    }
                    return Err(FilterError::CommandFailed(format!(
                        "failed to install leg for rule {}",
                        rule.id
                    )));
                }
            }
        }
        self.installed.lock().insert(rule.id, InstalledRule { legs });
        Ok(())
    }

    async fn remove_rule(&self, id: RuleId) -> Result<(), FilterError> {
        let installed = self.installed.lock().remove(&id);
        let Some(installed) = installed else {
            return Ok(()); // not present: ignored per §4.4
        };
        for leg in installed.legs.iter().rev() {
            let mut args: Vec<&str> = vec!["-D", CHAIN];
            args.extend(leg.iter().map(String::as_str));
            if let Err(e) = self.run(&args).await {
                warn!(rule_id = %id, error = %e, "failed to remove iptables rule, ignoring");
            }
        }
        Ok(())
    }

    async fn system_info(&self) -> SystemInfo {
        SystemInfo {
            platform: "linux".into(),
            filter_mechanism: "iptables".into(),
            filter_mechanism_version: "legacy".into(),
            active_rule_count: self.installed.lock().len(),
            engine_version: env!("CARGO_PKG_VERSION").into(),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}
