// SPDX-License-Identifier: MIT

//! Process Monitor (§4.1): a restartable stream of [`ProcessEvent`]s plus
//! point lookups and termination, backed by `sysinfo` (resolves an Open
//! Question from the original source in favor of a cross-platform crate
//! over shelling out to platform tools, per SPEC_FULL §4.1).

use async_trait::async_trait;
use pcguard_core::{Pid, ProcessEvent, ProcessInfo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid as SysPid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("process monitor is already running")]
    AlreadyRunning,

    #[error("process monitor is not running")]
    NotRunning,

    #[error("process {0} not found")]
    NotFound(Pid),

    #[error("failed to terminate process {0}: {1}")]
    TerminationFailed(Pid, String),
}

const EVENT_CHANNEL_CAPACITY: usize = 1024;

struct Snapshot {
    by_pid: HashMap<Pid, ProcessInfo>,
}

/// Periodically enumerates running processes and emits start/stop
/// transitions. One instance owns exactly one poll task (`Start`/`Stop`).
pub struct ProcessMonitor {
    poll_interval: Duration,
    snapshot: Arc<RwLock<Snapshot>>,
    events_tx: broadcast::Sender<ProcessEvent>,
    running: Arc<AtomicBool>,
    cancel: Arc<RwLock<Option<CancellationToken>>>,
    task: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl ProcessMonitor {
    pub fn new(poll_interval: Duration) -> Self {
        let (events_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            poll_interval,
            snapshot: Arc::new(RwLock::new(Snapshot { by_pid: HashMap::new() })),
            events_tx,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(RwLock::new(None)),
            task: Arc::new(RwLock::new(None)),
        }
    }

    /// Begin enumeration on a background task. Fails if already running.
    pub fn start(&self) -> Result<(), MonitorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        *self.cancel.write() = Some(token.clone());

        let snapshot = self.snapshot.clone();
        let events_tx = self.events_tx.clone();
        let running = self.running.clone();
        let interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut sys = System::new();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        poll_once(&mut sys, &snapshot, &events_tx);
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
        });
        *self.task.write() = Some(handle);
        Ok(())
    }

    /// Idempotent; guaranteed to release OS handles (the `sysinfo::System`
    /// and polling task) on every exit path.
    pub async fn stop(&self) {
        if let Some(token) = self.cancel.write().take() {
            token.cancel();
        }
        if let Some(handle) = self.task.write().take() {
            let _ = handle.await;
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Fan-out subscription. A slow subscriber whose buffer overflows
    /// observes `RecvError::Lagged(n)`; callers should translate that
    /// into [`ProcessEvent::Dropped`] themselves, or use
    /// [`Self::subscribe_events`] which does this for them.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.events_tx.subscribe()
    }

    /// Bounded scan time: reads the last poll's snapshot rather than
    /// forcing a fresh enumeration.
    pub fn get_processes(&self) -> Vec<ProcessInfo> {
        self.snapshot.read().by_pid.values().cloned().collect()
    }

    pub fn get_process(&self, pid: Pid) -> Option<ProcessInfo> {
        self.snapshot.read().by_pid.get(&pid).cloned()
    }

    pub fn is_running(&self, pid: Pid) -> bool {
        self.snapshot.read().by_pid.contains_key(&pid)
    }

    /// Request termination. `graceful=true` sends SIGTERM and waits up to
    /// 5s before SIGKILL; `graceful=false` sends SIGKILL immediately.
    pub async fn kill(&self, pid: Pid, graceful: bool) -> Result<(), MonitorError> {
        if !self.is_running(pid) {
            return Err(MonitorError::NotFound(pid));
        }
        let sys_pid = SysPid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        let Some(process) = sys.process(sys_pid) else {
            return Err(MonitorError::NotFound(pid));
        };

        if graceful {
            if !process.kill_with(Signal::Term).unwrap_or(false) {
                return Err(MonitorError::TerminationFailed(pid, "SIGTERM failed".into()));
            }
            for _ in 0..50 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let mut check = System::new();
                check.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
                if check.process(sys_pid).is_none() {
                    return Ok(());
                }
            }
            let mut check = System::new();
            check.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
            if let Some(process) = check.process(sys_pid) {
                if !process.kill() {
                    return Err(MonitorError::TerminationFailed(pid, "SIGKILL failed".into()));
                }
            }
            Ok(())
        } else if process.kill() {
            Ok(())
        } else {
            Err(MonitorError::TerminationFailed(pid, "SIGKILL failed".into()))
        }
    }

    /// Applies [`Self::kill`] to every process whose name matches `pattern`
    /// (a `*`/`?` glob, case-insensitive per §4.1/§4.2).
    pub async fn kill_by_name(&self, pattern: &str, graceful: bool) -> Vec<(Pid, Result<(), MonitorError>)> {
        let matches: Vec<Pid> = self
            .snapshot
            .read()
            .by_pid
            .values()
            .filter(|p| pcguard_core::glob::glob_match_ci(pattern, &p.name))
            .map(|p| p.pid)
            .collect();

        let mut results = Vec::with_capacity(matches.len());
        for pid in matches {
            results.push((pid, self.kill(pid, graceful).await));
        }
        results
    }
}

/// A lagged-aware wrapper around [`broadcast::Receiver`] that synthesizes
/// [`ProcessEvent::Dropped`] before normal delivery resumes, per the
/// REDESIGN FLAG in spec.md §9 / SPEC_FULL §4.1.
pub async fn recv_with_drop_sentinel(
    rx: &mut broadcast::Receiver<ProcessEvent>,
) -> Option<ProcessEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(n)) => return Some(ProcessEvent::Dropped(n)),
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

fn poll_once(
    sys: &mut System,
    snapshot: &Arc<RwLock<Snapshot>>,
    events_tx: &broadcast::Sender<ProcessEvent>,
) {
    sys.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::everything(),
    );

    let mut current: HashMap<Pid, ProcessInfo> = HashMap::with_capacity(sys.processes().len());
    for (sys_pid, process) in sys.processes() {
        let pid = sys_pid.as_u32();
        let info = ProcessInfo {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            executable_path: process
                .exe()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            parent_pid: process.parent().map(|p| p.as_u32()),
            started_at_ms: process.start_time().saturating_mul(1_000),
        };
        current.insert(pid, info);
    }

    let mut previous = snapshot.write();
    let mut started = Vec::new();
    let mut stopped = Vec::new();

    for (pid, info) in &current {
        match previous.by_pid.get(pid) {
            None => started.push(info.clone()),
            // Pid reuse: a newer start time means Stopped-then-Started.
            Some(prev) if prev.started_at_ms != info.started_at_ms => {
                stopped.push(prev.clone());
                started.push(info.clone());
            }
            Some(_) => {}
        }
    }
    for (pid, info) in &previous.by_pid {
        if !current.contains_key(pid) {
            stopped.push(info.clone());
        }
    }

    previous.by_pid = current;
    drop(previous);

    for info in stopped {
        debug!(pid = info.pid, name = %info.name, "process stopped");
        let _ = events_tx.send(ProcessEvent::Stopped(info));
    }
    for info in started {
        debug!(pid = info.pid, name = %info.name, "process started");
        let _ = events_tx.send(ProcessEvent::Started(info));
    }
}

/// A point-in-time process lookup used by components that don't need the
/// full [`ProcessMonitor`] lifecycle (e.g. the Rule Synchronizer's
/// executable-enforcement pass, §4.6 step 6).
#[async_trait]
pub trait ProcessLister: Send + Sync {
    async fn list(&self) -> Vec<ProcessInfo>;
    async fn terminate(&self, pid: Pid, graceful: bool) -> Result<(), MonitorError>;
}

#[async_trait]
impl ProcessLister for ProcessMonitor {
    async fn list(&self) -> Vec<ProcessInfo> {
        self.get_processes()
    }

    async fn terminate(&self, pid: Pid, graceful: bool) -> Result<(), MonitorError> {
        self.kill(pid, graceful).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_twice_fails_with_already_running() {
        let monitor = ProcessMonitor::new(Duration::from_millis(50));
        monitor.start().unwrap();
        assert!(matches!(monitor.start(), Err(MonitorError::AlreadyRunning)));
        monitor.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let monitor = ProcessMonitor::new(Duration::from_millis(50));
        monitor.start().unwrap();
        monitor.stop().await;
        monitor.stop().await;
    }

    #[tokio::test]
    async fn poll_detects_self_process() {
        let monitor = ProcessMonitor::new(Duration::from_millis(20));
        monitor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let self_pid = std::process::id();
        assert!(monitor.is_running(self_pid), "current process should be visible in a snapshot");
        monitor.stop().await;
    }

    #[tokio::test]
    async fn lagged_receiver_surfaces_dropped_sentinel() {
        let monitor = ProcessMonitor::new(Duration::from_secs(3600));
        let mut rx = monitor.subscribe();
        // Fill past capacity without a consumer draining, forcing a lag.
        for i in 0..(EVENT_CHANNEL_CAPACITY * 2) {
            let info = ProcessInfo {
                pid: i as Pid,
                name: "x".into(),
                executable_path: String::new(),
                parent_pid: None,
                started_at_ms: 0,
            };
            let _ = monitor.events_tx.send(ProcessEvent::Started(info));
        }
        let event = recv_with_drop_sentinel(&mut rx).await;
        assert!(matches!(event, Some(ProcessEvent::Dropped(_))));
    }
}
