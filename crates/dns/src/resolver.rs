// SPDX-License-Identifier: MIT

//! The resolver's per-query decision path (§4.3): normalize, consult the
//! Decision Engine, answer sinkhole/NXDOMAIN or forward upstream.

use crate::cache::ResponseCache;
use crate::error::DnsError;
use crate::message;
use crate::stats::ResolverStats;
use crate::upstream::UpstreamPool;
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::RecordType;
use pcguard_core::{
    AuditEntry, AuditEventKind, AuditSink, BlockResponseMode, Clock, Decider, DnsQuery, QType,
    RuleAction, RuleKind, TargetKind,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Maps a [`pcguard_core::Decision::reason`] string (set by the Decision
/// Engine's evaluation order, §4.5) back to the list kind that produced
/// it, for the audit record's `rule_kind` field.
fn rule_kind_for_reason(reason: &str) -> RuleKind {
    match reason {
        "whitelist" => RuleKind::Whitelist,
        "blacklist" => RuleKind::Blacklist,
        _ => RuleKind::Default,
    }
}

pub struct ResolverConfig {
    pub sinkhole_ipv4: Ipv4Addr,
    pub sinkhole_ipv6: Ipv6Addr,
    pub sinkhole_ttl_secs: u32,
    pub block_response_mode: BlockResponseMode,
}

/// The DNS Resolver/Blocker (§4.3). Holds no socket of its own — `server`
/// drives the UDP/TCP accept loop and calls [`DnsResolver::handle_query`]
/// for each datagram/stream message.
pub struct DnsResolver<C: Clock> {
    clock: C,
    cache: ResponseCache<C>,
    upstreams: UpstreamPool<C>,
    decider: Arc<dyn Decider>,
    audit: Arc<dyn AuditSink>,
    stats: ResolverStats,
    config: ResolverConfig,
    running: AtomicBool,
}

impl<C: Clock> DnsResolver<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        decider: Arc<dyn Decider>,
        audit: Arc<dyn AuditSink>,
        upstream_addrs: Vec<String>,
        upstream_deadline: Duration,
        upstream_unhealthy_threshold: u32,
        upstream_cooldown: Duration,
        config: ResolverConfig,
    ) -> Self {
        Self {
            cache: ResponseCache::new(clock.clone()),
            upstreams: UpstreamPool::new(
                clock.clone(),
                upstream_addrs,
                upstream_deadline,
                upstream_unhealthy_threshold,
                upstream_cooldown,
            ),
            clock,
            decider,
            audit,
            stats: ResolverStats::new(),
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn mark_started(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn add_rule(&self, rule: pcguard_core::FilterRule) {
        self.decider.add_rule(rule);
    }

    pub fn remove_rule(&self, id: pcguard_core::RuleId) {
        self.decider.remove_rule(id);
    }

    pub fn get_rules(&self) -> Vec<pcguard_core::FilterRule> {
        self.decider.get_rules()
    }

    pub fn stats(&self) -> (pcguard_core::Counters, pcguard_core::RollingAverage) {
        self.stats.snapshot()
    }

    /// Flushes the response cache when the rule-set version advances (I4).
    pub fn notify_rule_set_version(&self, version: u64) {
        self.cache.notify_rule_set_version(version);
    }

    /// Handles one decoded query end-to-end, returning the wire bytes of
    /// the response (§4.3 Protocol behavior).
    #[instrument(skip(self, request), fields(id = request.id()))]
    pub async fn handle_query(&self, request: &Message) -> Result<Vec<u8>, DnsError> {
        self.stats.record_total();
        let started = std::time::Instant::now();

        let response = self.resolve(request).await?;
        self.stats.observe_latency_ms(started.elapsed().as_secs_f64() * 1000.0);
        message::encode(&response)
    }

    async fn resolve(&self, request: &Message) -> Result<Message, DnsError> {
        let Some(query) = request.queries().first() else {
            return Ok(message::servfail_response(request));
        };
        let qname = message::normalize_qname(query.name());
        let qtype = query.query_type();

        if let Some(cached) = self.cache.get(&qname, qtype) {
            self.stats.record_cache_hit();
            debug!(%qname, "cache hit");
            let mut cached = cached;
            cached.set_id(request.id());
            return Ok(cached);
        }

        let decision = self.decider.decide(TargetKind::Url, &qname).await;

        self.audit.log(AuditEntry {
            event_kind: AuditEventKind::Enforcement,
            target_kind: TargetKind::Url,
            target_value: qname.clone(),
            action: if decision.is_blocked() { RuleAction::Block } else { RuleAction::Allow },
            rule_kind: rule_kind_for_reason(&decision.reason),
            rule_id: decision.rule_ref.as_ref().map(|id| id.to_string()),
            details: Default::default(),
        });

        if decision.is_blocked() {
            self.stats.record_blocked();
            let response = match self.config.block_response_mode {
                BlockResponseMode::Sinkhole => message::sinkhole_response(
                    request,
                    self.config.sinkhole_ipv4,
                    self.config.sinkhole_ipv6,
                    self.config.sinkhole_ttl_secs,
                )?,
                BlockResponseMode::Nxdomain => message::nxdomain_response(request),
            };
            self.cache.put(&qname, qtype, response.clone());
            return Ok(response);
        }

        self.stats.record_allowed();
        self.stats.record_forwarded();
        match self.upstreams.forward(request).await {
            Ok(mut response) => {
                response.set_id(request.id());
                self.cache.put(&qname, qtype, response.clone());
                Ok(response)
            }
            Err(_) => Ok(message::servfail_response(request)),
        }
    }

    /// Builds the ephemeral query-log record consumed elsewhere (not
    /// persisted; matches the transient nature of [`DnsQuery`]).
    pub fn describe_query(&self, request: &Message, client_ip: IpAddr) -> Option<DnsQuery> {
        let query = request.queries().first()?;
        let qtype = match query.query_type() {
            RecordType::A => QType::A,
            RecordType::AAAA => QType::Aaaa,
            RecordType::CNAME => QType::Cname,
            other => QType::Other(u16::from(other)),
        };
        Some(DnsQuery {
            qname: message::normalize_qname(query.name()),
            qtype,
            client_ip,
            received_at_ms: self.clock.epoch_ms(),
        })
    }

    pub fn is_query(request: &Message) -> bool {
        request.message_type() == MessageType::Query
    }
}
