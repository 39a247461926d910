// SPDX-License-Identifier: MIT

//! Enforcement Engine (§4.8): the composition root owning every
//! subsystem and driving the `Stopped -> Starting -> Running -> Stopping
//! -> Stopped` lifecycle (with `Error` as a terminal state `Stop` can
//! leave), expressed with `tokio::task` per background loop and a
//! `tokio_util::sync::CancellationToken` as the cooperative stop signal
//! (SPEC_FULL §5), mirroring the teacher daemon's start/stop/drain shape.

use crate::decision::DecisionEngine;
use crate::error::EngineError;
use crate::sync::RuleSynchronizer;
use parking_lot::RwLock;
use pcguard_adapters::{recv_with_drop_sentinel, NotifyAdapter, PacketFilterAdapter, ProcessIdentifier, ProcessMonitor};
use pcguard_core::{
    AuditEntry, AuditEventKind, AuditSink, Clock, Decider, Config, EngineStats, FilterRule,
    Pid, ProcessEvent, ProcessInfo, RuleAction, RuleId, RuleKind, SystemInfo, TargetKind,
};
use pcguard_dns::{DnsResolver, DnsServer, ResolverConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

struct Background {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Owns every subsystem named in §4 and exposes the operation surface
/// named in §6 (`AddProcessSignature`, `AddNetworkRule`, ..., `Stats`,
/// `SystemInfo`), reachable directly and over the admin protocol.
pub struct EnforcementEngine<C: Clock> {
    clock: C,
    config: Config,
    state: RwLock<EngineState>,
    started_at: RwLock<Option<Instant>>,

    process_monitor: Arc<ProcessMonitor>,
    identifier: Arc<ProcessIdentifier>,
    filter: Arc<dyn PacketFilterAdapter>,
    decider: Arc<DecisionEngine<C>>,
    synchronizer: Arc<RuleSynchronizer<C>>,
    audit: Arc<dyn AuditSink>,

    dns_resolver: Arc<DnsResolver<C>>,
    dns_cancel: RwLock<Option<CancellationToken>>,
    dns_task: RwLock<Option<JoinHandle<()>>>,

    notify: Arc<dyn NotifyAdapter>,

    background: RwLock<Option<Background>>,
    sync_runs: Arc<AtomicU64>,
}

impl<C: Clock> EnforcementEngine<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        config: Config,
        process_monitor: Arc<ProcessMonitor>,
        identifier: Arc<ProcessIdentifier>,
        filter: Arc<dyn PacketFilterAdapter>,
        decider: Arc<DecisionEngine<C>>,
        synchronizer: Arc<RuleSynchronizer<C>>,
        audit: Arc<dyn AuditSink>,
        dns_resolver: Arc<DnsResolver<C>>,
        notify: Arc<dyn NotifyAdapter>,
    ) -> Self {
        Self {
            clock,
            config,
            state: RwLock::new(EngineState::Stopped),
            started_at: RwLock::new(None),
            process_monitor,
            identifier,
            filter,
            decider,
            synchronizer,
            audit,
            dns_resolver,
            dns_cancel: RwLock::new(None),
            dns_task: RwLock::new(None),
            notify,
            background: RwLock::new(None),
            sync_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// Start order (§4.8): Process Monitor -> DNS Resolver -> Packet
    /// Filter (if enabled) -> background workers. Any failure triggers a
    /// reverse teardown of whatever already started.
    pub async fn start(&self) -> Result<(), EngineError> {
        if *self.state.read() != EngineState::Stopped {
            return Err(EngineError::AlreadyRunning);
        }
        *self.state.write() = EngineState::Starting;
        info!("enforcement engine starting");

        if let Err(e) = self.process_monitor.start() {
            *self.state.write() = EngineState::Error;
            return Err(EngineError::ProcessMonitor(e));
        }

        let dns_server = match DnsServer::bind(
            Arc::clone(&self.dns_resolver),
            &self.config.dns_listen_address,
            self.config.max_concurrent_checks,
        )
        .await
        {
            Ok(server) => server,
            Err(e) => {
                self.process_monitor.stop().await;
                *self.state.write() = EngineState::Error;
                return Err(EngineError::DnsResolver(e));
            }
        };
        let dns_cancel = dns_server.cancellation();
        let shutdown_timeout = self.config.shutdown_timeout();
        let dns_task = tokio::spawn(async move { dns_server.run(shutdown_timeout).await });
        *self.dns_cancel.write() = Some(dns_cancel);
        *self.dns_task.write() = Some(dns_task);

        if self.config.enable_network_filtering {
            if let Err(e) = self.filter.start().await {
                self.stop_dns().await;
                self.process_monitor.stop().await;
                *self.state.write() = EngineState::Error;
                return Err(EngineError::PacketFilter(e));
            }
        }

        self.spawn_background_workers();
        *self.started_at.write() = Some(self.clock.now());
        *self.state.write() = EngineState::Running;
        info!("enforcement engine running");
        Ok(())
    }

    /// Stop order is the reverse of start; each subsystem gets
    /// `shutdown-timeout` to drain (§4.8 Stop). Best-effort: failures are
    /// logged but do not prevent the remaining subsystems from stopping.
    pub async fn stop(&self) -> Result<(), EngineError> {
        if *self.state.read() != EngineState::Running {
            return Err(EngineError::NotRunning);
        }
        *self.state.write() = EngineState::Stopping;
        info!("enforcement engine stopping");

        if let Some(background) = self.background.write().take() {
            background.cancel.cancel();
            for handle in background.handles {
                let _ = handle.await;
            }
        }

        if self.config.enable_network_filtering {
            if let Err(e) = self.filter.stop().await {
                warn!(error = %e, "packet filter stop failed");
            }
        }

        self.stop_dns().await;
        self.process_monitor.stop().await;

        *self.state.write() = EngineState::Stopped;
        info!("enforcement engine stopped");
        Ok(())
    }

    async fn stop_dns(&self) {
        if let Some(cancel) = self.dns_cancel.write().take() {
            cancel.cancel();
        }
        if let Some(task) = self.dns_task.write().take() {
            let _ = task.await;
        }
    }

    fn spawn_background_workers(&self) {
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        handles.push(self.spawn_sync_ticker(cancel.clone()));
        handles.push(self.spawn_process_event_handler(cancel.clone()));

        *self.background.write() = Some(Background { cancel, handles });
    }

    fn spawn_sync_ticker(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let synchronizer = Arc::clone(&self.synchronizer);
        let decider = Arc::clone(&self.decider);
        let dns_resolver = Arc::clone(&self.dns_resolver);
        let sync_runs = Arc::clone(&self.sync_runs);
        let interval = self.config.sync_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = synchronizer.sync().await;
                        dns_resolver.notify_rule_set_version(decider.rule_set_version());
                        sync_runs.fetch_add(1, Ordering::Relaxed);
                        info!(added = report.added, removed = report.removed, "rule sync tick complete");
                    }
                }
            }
        })
    }

    fn spawn_process_event_handler(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.process_monitor.subscribe();
        let identifier = Arc::clone(&self.identifier);
        let decider: Arc<dyn Decider> = Arc::clone(&self.decider) as Arc<dyn Decider>;
        let audit = Arc::clone(&self.audit);
        let monitor = Arc::clone(&self.process_monitor);
        let notify = Arc::clone(&self.notify);
        let block_unknown = self.config.block_unknown_processes;
        let log_all = self.config.log_all_activity;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = recv_with_drop_sentinel(&mut rx) => {
                        match event {
                            Some(ProcessEvent::Started(info)) => {
                                handle_process_started(&identifier, &decider, &audit, &monitor, &notify, &info, block_unknown, log_all).await;
                            }
                            Some(ProcessEvent::Stopped(_)) | Some(ProcessEvent::Dropped(_)) => {}
                            None => break,
                        }
                    }
                }
            }
        })
    }

    // -- admin-protocol operation surface (§6) --

    pub fn add_process_signature(&self, signature: pcguard_core::ProcessSignature) {
        self.identifier.add_signature(signature);
    }

    pub async fn add_network_rule(&self, rule: FilterRule) -> Result<(), EngineError> {
        self.decider.add_rule(rule.clone());
        self.dns_resolver.notify_rule_set_version(self.decider.rule_set_version());
        self.filter.add_rule(&rule).await.map_err(EngineError::PacketFilter)
    }

    pub async fn remove_network_rule(&self, id: RuleId) -> Result<(), EngineError> {
        self.filter.remove_rule(id).await.map_err(EngineError::PacketFilter)?;
        self.decider.remove_rule(id);
        self.dns_resolver.notify_rule_set_version(self.decider.rule_set_version());
        Ok(())
    }

    pub fn get_current_rules(&self) -> Vec<FilterRule> {
        self.decider.get_rules()
    }

    pub async fn clear_all_rules(&self) -> Result<(), EngineError> {
        for rule in self.decider.get_rules() {
            self.filter.remove_rule(rule.id).await.map_err(EngineError::PacketFilter)?;
            self.decider.remove_rule(rule.id);
        }
        self.dns_resolver.notify_rule_set_version(self.decider.rule_set_version());
        Ok(())
    }

    pub async fn sync_rules(&self) -> crate::sync::SyncReport {
        let report = self.synchronizer.sync().await;
        self.dns_resolver.notify_rule_set_version(self.decider.rule_set_version());
        report
    }

    pub fn get_processes(&self) -> Vec<ProcessInfo> {
        self.process_monitor.get_processes()
    }

    pub async fn kill_process(&self, pid: Pid, graceful: bool) -> Result<(), EngineError> {
        self.process_monitor.kill(pid, graceful).await.map_err(EngineError::ProcessMonitor)
    }

    pub async fn kill_process_by_name(&self, pattern: &str, graceful: bool) -> Vec<(Pid, Result<(), EngineError>)> {
        self.process_monitor
            .kill_by_name(pattern, graceful)
            .await
            .into_iter()
            .map(|(pid, res)| (pid, res.map_err(EngineError::ProcessMonitor)))
            .collect()
    }

    pub fn is_process_running(&self, pid: Pid) -> bool {
        self.process_monitor.is_running(pid)
    }

    pub async fn stats(&self) -> EngineStats {
        let (dns_counters, dns_avg) = self.dns_resolver.stats();
        let audit = self.audit.stats();
        EngineStats {
            dns: dns_counters,
            decisions: self.decider.counters(),
            audit_total_logged: audit.total_logged,
            audit_buffered: audit.buffered,
            audit_batch_count: audit.batch_count,
            audit_failed: audit.failed,
            audit_avg_latency_ms: audit.avg_latency_ms,
            decision_avg_latency: dns_avg,
        }
    }

    /// `SystemInfo()` at the engine level (SPEC_FULL §4.8): the Packet
    /// Filter's own `SystemInfo()` plus engine version and uptime.
    pub async fn system_info(&self) -> SystemInfo {
        let mut info = self.filter.system_info().await;
        info.engine_version = env!("CARGO_PKG_VERSION").into();
        info.uptime_ms = self
            .started_at
            .read()
            .map(|start| self.clock.now().saturating_duration_since(start).as_millis() as u64)
            .unwrap_or(0);
        info
    }
}

/// Enforces policy for one observed process start (§4.8 "process-event
/// handler"). Identification (`ProcessIdentifier`) only answers *what*
/// the process is; *whether* it gets terminated is always the Decision
/// Engine's call (§2 data flow: Monitor -> Identifier -> Decision Engine
/// -> optional forced termination), except for the `block_unknown`
/// safety net below, which has no identity to decide against.
async fn handle_process_started(
    identifier: &ProcessIdentifier,
    decider: &Arc<dyn Decider>,
    audit: &Arc<dyn AuditSink>,
    monitor: &ProcessMonitor,
    notify: &Arc<dyn NotifyAdapter>,
    info: &ProcessInfo,
    block_unknown: bool,
    log_all: bool,
) {
    let Some(signature) = identifier.identify(info) else {
        if block_unknown {
            audit.log(AuditEntry {
                event_kind: AuditEventKind::Enforcement,
                target_kind: TargetKind::Executable,
                target_value: info.name.clone(),
                action: RuleAction::Block,
                rule_kind: RuleKind::Default,
                rule_id: None,
                details: Default::default(),
            });

            if let Err(e) = monitor.kill(info.pid, true).await {
                error!(pid = info.pid, error = %e, "failed to terminate unidentified process");
                return;
            }

            if let Err(e) = notify
                .notify("Application blocked", &format!("{} was terminated by pcguard", info.name))
                .await
            {
                warn!(error = %e, "desktop notification failed");
            }
        } else if log_all {
            audit.log(AuditEntry {
                event_kind: AuditEventKind::SystemEvent,
                target_kind: TargetKind::Executable,
                target_value: info.name.clone(),
                action: RuleAction::Allow,
                rule_kind: RuleKind::Default,
                rule_id: None,
                details: Default::default(),
            });
        }
        return;
    };

    let decision = decider.decide(TargetKind::Executable, &signature.name).await;
    if !decision.is_blocked() {
        if log_all {
            audit.log(AuditEntry {
                event_kind: AuditEventKind::SystemEvent,
                target_kind: TargetKind::Executable,
                target_value: signature.name.clone(),
                action: RuleAction::Allow,
                rule_kind: RuleKind::Default,
                rule_id: decision.rule_ref.as_ref().map(|id| id.to_string()),
                details: Default::default(),
            });
        }
        return;
    }

    audit.log(AuditEntry {
        event_kind: AuditEventKind::Enforcement,
        target_kind: TargetKind::Executable,
        target_value: signature.name.clone(),
        action: RuleAction::Block,
        rule_kind: RuleKind::Blacklist,
        rule_id: decision.rule_ref.as_ref().map(|id| id.to_string()),
        details: Default::default(),
    });

    if let Err(e) = monitor.kill(info.pid, true).await {
        error!(pid = info.pid, error = %e, "failed to terminate signature-matched process");
        return;
    }

    if let Err(e) = notify
        .notify("Application blocked", &format!("{} was terminated by pcguard", signature.name))
        .await
    {
        warn!(error = %e, "desktop notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionEngine;
    use crate::sync::RuleSynchronizer;
    use async_trait::async_trait;
    use pcguard_adapters::{FakeFilterAdapter, FakeNotifyAdapter};
    use pcguard_core::{DefaultPolicy, FakeClock, List, ListEntry, ListEntryRepository, ListId, ListRepository, RepositoryError};
    use std::time::Duration;

    struct EmptyLists;
    #[async_trait]
    impl ListRepository for EmptyLists {
        async fn get_all(&self) -> Result<Vec<List>, RepositoryError> {
            Ok(vec![])
        }
    }
    struct EmptyEntries;
    #[async_trait]
    impl ListEntryRepository for EmptyEntries {
        async fn get_by_list_id(&self, _id: &ListId) -> Result<Vec<ListEntry>, RepositoryError> {
            Ok(vec![])
        }
    }

    fn test_engine() -> EnforcementEngine<FakeClock> {
        let clock = FakeClock::new();
        let mut config = Config::default();
        config.dns_listen_address = "127.0.0.1:0".into();
        config.enable_network_filtering = false;
        config.process_poll_interval_ms = 50;
        config.sync_interval_secs = 3600;

        let process_monitor = Arc::new(ProcessMonitor::new(Duration::from_millis(50)));
        let identifier = Arc::new(ProcessIdentifier::new(vec![]));
        let filter: Arc<dyn PacketFilterAdapter> = Arc::new(FakeFilterAdapter::new());
        let decider = Arc::new(DecisionEngine::new(
            clock.clone(),
            config.decision_cache_capacity,
            config.decision_cache_shards,
            config.cache_timeout(),
            DefaultPolicy::Allow,
        ));
        let synchronizer = Arc::new(RuleSynchronizer::new(
            clock.clone(),
            Arc::new(EmptyLists),
            Arc::new(EmptyEntries),
            Arc::clone(&decider) as Arc<dyn Decider>,
            Arc::clone(&filter),
            Arc::clone(&process_monitor) as Arc<dyn pcguard_adapters::ProcessLister>,
        ));
        let audit: Arc<dyn AuditSink> = Arc::new(pcguard_core::NullAuditSink);
        let resolver = Arc::new(DnsResolver::new(
            clock.clone(),
            Arc::clone(&decider) as Arc<dyn Decider>,
            Arc::clone(&audit),
            config.upstream_dns.clone(),
            Duration::from_millis(config.upstream_query_deadline_ms),
            config.upstream_unhealthy_threshold,
            Duration::from_secs(config.upstream_cooldown_secs),
            ResolverConfig {
                sinkhole_ipv4: match config.sinkhole_ipv4 {
                    std::net::IpAddr::V4(v4) => v4,
                    _ => std::net::Ipv4Addr::UNSPECIFIED,
                },
                sinkhole_ipv6: match config.sinkhole_ipv6 {
                    std::net::IpAddr::V6(v6) => v6,
                    _ => std::net::Ipv6Addr::UNSPECIFIED,
                },
                sinkhole_ttl_secs: config.sinkhole_ttl_secs,
                block_response_mode: config.block_response_mode,
            },
        ));

        let notify: Arc<dyn NotifyAdapter> = Arc::new(FakeNotifyAdapter::new());
        EnforcementEngine::new(
            clock, config, process_monitor, identifier, filter, decider, synchronizer, audit, resolver, notify,
        )
    }

    #[tokio::test]
    async fn start_then_stop_round_trips_through_running_state() {
        let engine = test_engine();
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.start().await.unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        engine.stop().await.unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn starting_twice_fails_with_already_running() {
        let engine = test_engine();
        engine.start().await.unwrap();
        assert!(matches!(engine.start().await, Err(EngineError::AlreadyRunning)));
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stopping_when_not_running_fails_with_not_running() {
        let engine = test_engine();
        assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));
    }

    #[tokio::test]
    async fn add_then_remove_network_rule_round_trips() {
        let engine = test_engine();
        let rule = FilterRule::builder().build();
        engine.add_network_rule(rule.clone()).await.unwrap();
        assert_eq!(engine.get_current_rules().len(), 1);
        engine.remove_network_rule(rule.id).await.unwrap();
        assert_eq!(engine.get_current_rules().len(), 0);
    }

    #[tokio::test]
    async fn add_network_rule_propagates_the_new_rule_set_version_to_the_resolver() {
        let engine = test_engine();
        let version_before = engine.decider.rule_set_version();
        engine.add_network_rule(FilterRule::builder().build()).await.unwrap();
        let version_after = engine.decider.rule_set_version();
        assert!(version_after > version_before);
        assert_eq!(engine.dns_resolver.get_rules().len(), 1);
    }

    fn test_decider() -> Arc<DecisionEngine<FakeClock>> {
        Arc::new(DecisionEngine::new(
            FakeClock::new(),
            64,
            4,
            Duration::from_secs(300),
            DefaultPolicy::Allow,
        ))
    }

    fn unreachable_process(name: &str) -> ProcessInfo {
        // A pid no test host will have running, so `monitor.kill` always
        // fails with `NotFound` after the audit record has already been
        // written — enough to assert on the audit path without actually
        // terminating anything.
        pcguard_core::ProcessInfo::builder().name(name).pid(u32::MAX).build()
    }

    #[tokio::test]
    async fn identified_process_with_no_matching_block_rule_is_not_audited() {
        let identifier = ProcessIdentifier::new(vec![pcguard_core::ProcessSignature::builder().name("badapp").build()]);
        let decider: Arc<dyn Decider> = test_decider();
        let audit = Arc::new(pcguard_core::audit::fake::RecordingAuditSink::new());
        let monitor = ProcessMonitor::new(Duration::from_millis(50));
        let notify: Arc<dyn NotifyAdapter> = Arc::new(FakeNotifyAdapter::new());

        handle_process_started(
            &identifier,
            &decider,
            &(Arc::clone(&audit) as Arc<dyn AuditSink>),
            &monitor,
            &notify,
            &unreachable_process("badapp"),
            false,
            false,
        )
        .await;

        assert!(audit.entries().is_empty(), "a signature match alone must not enforce a block");
    }

    #[tokio::test]
    async fn identified_process_blocked_by_the_decision_engine_is_audited_as_blacklist() {
        let identifier = ProcessIdentifier::new(vec![pcguard_core::ProcessSignature::builder().name("badapp").build()]);
        let decider = test_decider();
        decider.add_rule(
            FilterRule::builder()
                .target_kind(TargetKind::Executable)
                .match_kind(pcguard_core::MatchKind::Exact)
                .pattern("badapp")
                .action(RuleAction::Block)
                .build(),
        );
        let decider: Arc<dyn Decider> = decider;
        let audit = Arc::new(pcguard_core::audit::fake::RecordingAuditSink::new());
        let monitor = ProcessMonitor::new(Duration::from_millis(50));
        let notify: Arc<dyn NotifyAdapter> = Arc::new(FakeNotifyAdapter::new());

        handle_process_started(
            &identifier,
            &decider,
            &(Arc::clone(&audit) as Arc<dyn AuditSink>),
            &monitor,
            &notify,
            &unreachable_process("badapp"),
            false,
            false,
        )
        .await;

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, RuleAction::Block);
        assert_eq!(entries[0].rule_kind, RuleKind::Blacklist);
    }

    #[tokio::test]
    async fn unidentified_process_is_audited_as_blocked_when_block_unknown_processes_is_set() {
        let identifier = ProcessIdentifier::new(vec![]);
        let decider: Arc<dyn Decider> = test_decider();
        let audit = Arc::new(pcguard_core::audit::fake::RecordingAuditSink::new());
        let monitor = ProcessMonitor::new(Duration::from_millis(50));
        let notify: Arc<dyn NotifyAdapter> = Arc::new(FakeNotifyAdapter::new());

        handle_process_started(
            &identifier,
            &decider,
            &(Arc::clone(&audit) as Arc<dyn AuditSink>),
            &monitor,
            &notify,
            &unreachable_process("mystery"),
            true,
            false,
        )
        .await;

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, RuleAction::Block);
    }

    #[tokio::test]
    async fn unidentified_process_is_left_alone_when_block_unknown_processes_is_unset() {
        let identifier = ProcessIdentifier::new(vec![]);
        let decider: Arc<dyn Decider> = test_decider();
        let audit = Arc::new(pcguard_core::audit::fake::RecordingAuditSink::new());
        let monitor = ProcessMonitor::new(Duration::from_millis(50));
        let notify: Arc<dyn NotifyAdapter> = Arc::new(FakeNotifyAdapter::new());

        handle_process_started(
            &identifier,
            &decider,
            &(Arc::clone(&audit) as Arc<dyn AuditSink>),
            &monitor,
            &notify,
            &unreachable_process("mystery"),
            false,
            false,
        )
        .await;

        assert!(audit.entries().is_empty());
    }
}
