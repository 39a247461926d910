// SPDX-License-Identifier: MIT

//! Startup/shutdown orchestration: single-instance lock, directory
//! setup, subsystem construction, and the `EnforcementEngine` composition
//! (SPEC_FULL §4.8), mirroring the teacher daemon's `lifecycle/startup.rs`
//! shape (lock first, then create dirs, then wire subsystems, then bind
//! last).

use crate::admin::AdminServer;
use crate::error::LifecycleError;
use fs2::FileExt;
use nix::sys::signal::kill;
use nix::unistd::Pid as NixPid;
use pcguard_adapters::{packet_filter, DesktopNotifyAdapter, NotifyAdapter, ProcessIdentifier, ProcessMonitor};
use pcguard_core::{Config, SystemClock};
use pcguard_dns::{DnsResolver, ResolverConfig};
use pcguard_engine::{DecisionEngine, EnforcementEngine, RuleSynchronizer};
use pcguard_storage::{JsonAuditRepository, JsonListEntryRepository, JsonListRepository, WalAuditSink};
use std::fs::File;
use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Holds the lock file open for the daemon's lifetime; dropping it
/// releases the OS-level exclusive lock.
pub struct LockGuard {
    _file: File,
    path: std::path::PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Acquires the daemon's single-instance lock. If already held, reports
/// whether the holding pid is still alive (best-effort diagnostic; the
/// OS-level `flock` is what actually prevents a second instance, not this
/// liveness check).
pub fn acquire_lock(path: &Path) -> Result<LockGuard, LifecycleError> {
    let mut file = std::fs::OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
    if let Err(source) = file.try_lock_exclusive() {
        let held_by = std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse::<i32>().ok());
        let still_alive = held_by.map(|pid| kill(NixPid::from_raw(pid), None).is_ok()).unwrap_or(false);
        if !still_alive {
            warn!(?held_by, "lock file present but holder appears dead; refusing to steal the lock anyway");
        }
        return Err(LifecycleError::LockHeld { path: path.display().to_string(), held_by, source });
    }
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(LockGuard { _file: file, path: path.to_path_buf() })
}

/// Everything the running daemon needs to keep alive until shutdown.
pub struct Daemon {
    pub engine: Arc<EnforcementEngine<SystemClock>>,
    pub admin: AdminServer,
    _lock: LockGuard,
}

pub async fn start(config: Config, data_dir: &Path, lock_path: &Path, signatures_path: &Path) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(data_dir)?;
    let lock = acquire_lock(lock_path)?;

    let clock = SystemClock;
    let signatures = crate::signatures::load(signatures_path);
    let identifier = Arc::new(ProcessIdentifier::new(signatures));
    let process_monitor = Arc::new(ProcessMonitor::new(std::time::Duration::from_millis(config.process_poll_interval_ms)));
    let filter: Arc<dyn pcguard_adapters::PacketFilterAdapter> = Arc::from(packet_filter::probe().await);

    let decider = Arc::new(DecisionEngine::new(
        clock,
        config.decision_cache_capacity,
        config.decision_cache_shards,
        config.cache_timeout(),
        config.default_policy,
    ));

    let lists = Arc::new(JsonListRepository::new(data_dir));
    let entries = Arc::new(JsonListEntryRepository::new(data_dir));
    let synchronizer = Arc::new(RuleSynchronizer::new(
        clock,
        lists,
        entries,
        Arc::clone(&decider) as Arc<dyn pcguard_core::Decider>,
        Arc::clone(&filter),
        Arc::clone(&process_monitor) as Arc<dyn pcguard_adapters::ProcessLister>,
    ));

    let audit_repository = Arc::new(JsonAuditRepository::new(data_dir));
    let audit_sink = Arc::new(WalAuditSink::new(clock, &config, audit_repository)?);
    audit_sink.start();
    let audit: Arc<dyn pcguard_core::AuditSink> = audit_sink;

    let resolver = Arc::new(DnsResolver::new(
        clock,
        Arc::clone(&decider) as Arc<dyn pcguard_core::Decider>,
        Arc::clone(&audit),
        config.upstream_dns.clone(),
        std::time::Duration::from_millis(config.upstream_query_deadline_ms),
        config.upstream_unhealthy_threshold,
        std::time::Duration::from_secs(config.upstream_cooldown_secs),
        ResolverConfig {
            sinkhole_ipv4: match config.sinkhole_ipv4 {
                std::net::IpAddr::V4(v4) => v4,
                _ => Ipv4Addr::UNSPECIFIED,
            },
            sinkhole_ipv6: match config.sinkhole_ipv6 {
                std::net::IpAddr::V6(v6) => v6,
                _ => Ipv6Addr::UNSPECIFIED,
            },
            sinkhole_ttl_secs: config.sinkhole_ttl_secs,
            block_response_mode: config.block_response_mode,
        },
    ));

    let notify: Arc<dyn NotifyAdapter> = Arc::new(DesktopNotifyAdapter::new());

    let admin_socket_path = std::path::PathBuf::from(&config.admin_socket_path);
    let admin = AdminServer::bind(&admin_socket_path)?;

    let engine = Arc::new(EnforcementEngine::new(
        clock,
        config,
        process_monitor,
        identifier,
        filter,
        decider,
        synchronizer,
        audit,
        resolver,
        notify,
    ));
    engine.start().await?;

    info!("pcguardd started");
    Ok(Daemon { engine, admin, _lock: lock })
}

impl Daemon {
    pub async fn run_until_shutdown(self, shutdown: tokio_util::sync::CancellationToken) {
        let Daemon { engine, admin, _lock } = self;
        let admin_cancel = admin.cancellation();
        let admin_engine = Arc::clone(&engine);
        let admin_task = tokio::spawn(admin.run(admin_engine));

        shutdown.cancelled().await;
        admin_cancel.cancel();
        let _ = admin_task.await;

        if let Err(e) = engine.stop().await {
            warn!(error = %e, "engine stop reported an error during shutdown");
        }
        info!("pcguardd stopped");
    }
}
