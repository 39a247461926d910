// SPDX-License-Identifier: MIT

//! WAL-backed [`AuditSink`] (SPEC_FULL §4.7): `log` is synchronous and
//! never blocks the caller on the repository — every entry is appended
//! to the write-ahead log immediately, and a background task batches
//! the durable-but-unprocessed tail into the [`AuditRepository`] on a
//! size/time trigger. A repository write failure is logged and counted
//! but not retried; the record stays durable in the WAL's archive even
//! though it never reaches the queryable repository.

use crate::error::AuditError;
use crate::wal::Wal;
use parking_lot::Mutex;
use pcguard_core::{
    AuditEntry, AuditId, AuditRecord, AuditRepository, AuditSinkStats, Clock, Config, RollingAverage,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct Background {
    cancel: CancellationToken,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

#[derive(Default)]
struct Counters {
    total_logged: AtomicU64,
    batch_count: AtomicU64,
    failed: AtomicU64,
    latency: Mutex<RollingAverage>,
}

pub struct WalAuditSink<C: Clock> {
    clock: C,
    wal_path: PathBuf,
    processed_seq_path: PathBuf,
    wal: Arc<Mutex<Wal<AuditRecord>>>,
    repository: Arc<dyn AuditRepository>,
    wake: mpsc::Sender<()>,
    wake_rx: Mutex<Option<mpsc::Receiver<()>>>,
    counters: Arc<Counters>,
    batch_size: usize,
    batch_timeout: std::time::Duration,
    flush_interval: std::time::Duration,
    cleanup_interval: std::time::Duration,
    retention: std::time::Duration,
    background: Mutex<Option<Background>>,
}

impl<C: Clock> WalAuditSink<C> {
    pub fn new(clock: C, config: &Config, repository: Arc<dyn AuditRepository>) -> Result<Self, AuditError> {
        std::fs::create_dir_all(config.data_dir())
            .map_err(|source| AuditError::WalOpen { path: config.data_dir().display().to_string(), source })?;
        let wal_path = config.data_dir().join("audit.wal");
        let processed_seq_path = config.data_dir().join("audit.wal.processed");

        let processed_seq = read_processed_seq(&processed_seq_path);
        let wal = Wal::open(&wal_path, processed_seq)?;
        let (wake, wake_rx) = mpsc::channel(1);

        Ok(Self {
            clock,
            wal_path,
            processed_seq_path,
            wal: Arc::new(Mutex::new(wal)),
            repository,
            wake,
            wake_rx: Mutex::new(Some(wake_rx)),
            counters: Arc::new(Counters::default()),
            batch_size: config.audit_batch_size,
            batch_timeout: config.audit_batch_timeout(),
            flush_interval: config.audit_flush_interval(),
            cleanup_interval: config.audit_cleanup_interval(),
            retention: config.audit_retention(),
            background: Mutex::new(None),
        })
    }

    /// Starts the batch-aggregator and retention-cleaner background tasks.
    pub fn start(&self) {
        if self.background.lock().is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        if let Some(wake_rx) = self.wake_rx.lock().take() {
            handles.push(self.spawn_batch_aggregator(cancel.clone(), wake_rx));
        }
        handles.push(self.spawn_retention_cleaner(cancel.clone()));

        *self.background.lock() = Some(Background { cancel, handles });
    }

    /// Cancels the background tasks and drains whatever is left in the
    /// WAL one last time before returning.
    pub async fn stop(&self) {
        let background = self.background.lock().take();
        if let Some(background) = background {
            background.cancel.cancel();
            for handle in background.handles {
                let _ = handle.await;
            }
        }
        self.drain_batch().await;
    }

    fn spawn_batch_aggregator(
        &self,
        cancel: CancellationToken,
        mut wake_rx: mpsc::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let wal = Arc::clone(&self.wal);
        let repository = Arc::clone(&self.repository);
        let counters = Arc::clone(&self.counters);
        let clock = self.clock.clone();
        let batch_size = self.batch_size;
        let batch_timeout = self.batch_timeout;
        let flush_interval = self.flush_interval;
        let processed_seq_path = self.processed_seq_path.clone();

        tokio::spawn(async move {
            // `batch_timeout` bounds how long a size-triggered batch
            // (driven by `wake`, fired on every `log`) waits to fill;
            // `flush_interval` is the independent background ticker
            // (§4.7) that forces a drain of whatever partial batch is
            // outstanding even when nothing has woken the aggregator.
            let mut batch_ticker = tokio::time::interval(batch_timeout);
            batch_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut flush_ticker = tokio::time::interval(flush_interval);
            flush_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = batch_ticker.tick() => {}
                    _ = flush_ticker.tick() => {}
                    _ = wake_rx.recv() => {}
                }
                drain_into_repository(&wal, &repository, &counters, &clock, batch_size, &processed_seq_path).await;
            }
        })
    }

    fn spawn_retention_cleaner(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let wal = Arc::clone(&self.wal);
        let repository = Arc::clone(&self.repository);
        let clock = self.clock.clone();
        let interval_dur = self.cleanup_interval;
        let retention = self.retention;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval_dur);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let cutoff = clock.epoch_ms().saturating_sub(retention.as_millis() as u64);
                match repository.cleanup_old_logs(cutoff).await {
                    Ok(removed) => info!(removed, cutoff, "audit retention cleanup complete"),
                    Err(e) => warn!(error = %e, "audit retention cleanup failed"),
                }
                if let Err(e) = wal.lock().compact() {
                    warn!(error = %e, "audit wal compaction failed");
                }
            }
        })
    }

    async fn drain_batch(&self) {
        drain_into_repository(
            &self.wal,
            &self.repository,
            &self.counters,
            &self.clock,
            self.batch_size,
            &self.processed_seq_path,
        )
        .await;
    }

    pub fn stats(&self) -> AuditSinkStats {
        let wal = self.wal.lock();
        let buffered = wal.write_seq().saturating_sub(wal.processed_seq());
        drop(wal);
        AuditSinkStats {
            total_logged: self.counters.total_logged.load(Ordering::Relaxed),
            buffered,
            batch_count: self.counters.batch_count.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            avg_latency_ms: self.counters.latency.lock().mean_ms,
        }
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }
}

impl<C: Clock> pcguard_core::AuditSink for WalAuditSink<C> {
    fn log(&self, entry: AuditEntry) {
        let record = AuditRecord {
            id: AuditId::new(),
            timestamp_ms: self.clock.epoch_ms(),
            event_kind: entry.event_kind,
            target_kind: entry.target_kind,
            target_value: entry.target_value,
            action: entry.action,
            rule_kind: entry.rule_kind,
            rule_id: entry.rule_id,
            details: entry.details,
        };

        let append_result = {
            let mut wal = self.wal.lock();
            wal.append(&record).and_then(|seq| wal.flush().map(|()| seq))
        };
        match append_result {
            Ok(_) => {
                self.counters.total_logged.fetch_add(1, Ordering::Relaxed);
                let _ = self.wake.try_send(());
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "failed to append audit record to wal, record dropped");
            }
        }
    }

    fn stats(&self) -> AuditSinkStats {
        WalAuditSink::stats(self)
    }
}

async fn drain_into_repository<C: Clock>(
    wal: &Arc<Mutex<Wal<AuditRecord>>>,
    repository: &Arc<dyn AuditRepository>,
    counters: &Arc<Counters>,
    clock: &C,
    batch_size: usize,
    processed_seq_path: &Path,
) {
    let mut batch = Vec::with_capacity(batch_size);
    {
        let mut wal = wal.lock();
        for _ in 0..batch_size {
            match wal.next_unprocessed() {
                Ok(Some(entry)) => batch.push(entry),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read wal entry, stopping this batch");
                    break;
                }
            }
        }
    }
    if batch.is_empty() {
        return;
    }

    let mut max_seq = 0u64;
    for entry in &batch {
        match repository.create(&entry.record).await {
            Ok(()) => {
                let latency = (clock.epoch_ms().saturating_sub(entry.record.timestamp_ms)) as f64;
                counters.latency.lock().observe(latency);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, audit_id = %entry.record.id, "failed to persist audit record, dropping");
            }
        }
        max_seq = max_seq.max(entry.seq);
    }

    wal.lock().mark_processed(max_seq);
    write_processed_seq(processed_seq_path, max_seq);
    counters.batch_count.fetch_add(1, Ordering::Relaxed);
}

fn read_processed_seq(path: &Path) -> u64 {
    std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

fn write_processed_seq(path: &Path, seq: u64) {
    if let Err(e) = std::fs::write(path, seq.to_string()) {
        warn!(error = %e, "failed to persist audit wal processed-seq marker");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pcguard_core::{AuditEventKind, AuditSink, FakeClock, RepositoryError, RuleAction, RuleKind, TargetKind};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingRepository {
        records: StdMutex<Vec<AuditRecord>>,
        fail_next: StdMutex<bool>,
    }

    #[async_trait]
    impl AuditRepository for RecordingRepository {
        async fn create(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
            let mut fail = self.fail_next.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(RepositoryError::Backend("injected failure".into()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
        async fn count_by_time_range(&self, _from_ms: u64, _to_ms: u64) -> Result<u64, RepositoryError> {
            Ok(self.records.lock().unwrap().len() as u64)
        }
        async fn cleanup_old_logs(&self, before_ms: u64) -> Result<u64, RepositoryError> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.timestamp_ms >= before_ms);
            Ok((before - records.len()) as u64)
        }
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.data_dir = dir.display().to_string();
        config.audit_batch_size = 10;
        config.audit_batch_timeout_ms = 50;
        config.audit_cleanup_interval_secs = 3600;
        config
    }

    fn sample_entry() -> AuditEntry {
        AuditEntry {
            event_kind: AuditEventKind::Enforcement,
            target_kind: TargetKind::Url,
            target_value: "ads.example.com".into(),
            action: RuleAction::Block,
            rule_kind: RuleKind::Blacklist,
            rule_id: None,
            details: Default::default(),
        }
    }

    #[tokio::test]
    async fn log_appends_durably_even_without_background_task_running() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let sink: WalAuditSink<FakeClock> =
            WalAuditSink::new(FakeClock::new(), &config, Arc::new(RecordingRepository::default())).unwrap();

        sink.log(sample_entry());
        assert_eq!(sink.stats().total_logged, 1);
        assert_eq!(sink.stats().buffered, 1);
    }

    #[tokio::test]
    async fn background_task_drains_logged_entries_into_repository() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let repository = Arc::new(RecordingRepository::default());
        let sink: WalAuditSink<FakeClock> =
            WalAuditSink::new(FakeClock::new(), &config, repository.clone()).unwrap();
        sink.start();

        sink.log(sample_entry());
        sink.log(sample_entry());
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        assert_eq!(repository.records.lock().unwrap().len(), 2);
        assert_eq!(sink.stats().buffered, 0);
        sink.stop().await;
    }

    #[tokio::test]
    async fn repository_failure_is_counted_and_does_not_block_the_next_record() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let repository = Arc::new(RecordingRepository::default());
        *repository.fail_next.lock().unwrap() = true;
        let sink: WalAuditSink<FakeClock> =
            WalAuditSink::new(FakeClock::new(), &config, repository.clone()).unwrap();
        sink.start();

        sink.log(sample_entry());
        sink.log(sample_entry());
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        assert_eq!(repository.records.lock().unwrap().len(), 1);
        assert_eq!(sink.stats().failed, 1);
        assert_eq!(sink.stats().buffered, 0);
        sink.stop().await;
    }

    #[tokio::test]
    async fn reopening_after_restart_resumes_from_persisted_processed_seq() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let repository = Arc::new(RecordingRepository::default());
        {
            let sink: WalAuditSink<FakeClock> =
                WalAuditSink::new(FakeClock::new(), &config, repository.clone()).unwrap();
            sink.start();
            sink.log(sample_entry());
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
            sink.stop().await;
        }

        let sink: WalAuditSink<FakeClock> =
            WalAuditSink::new(FakeClock::new(), &config, repository.clone()).unwrap();
        assert_eq!(sink.stats().buffered, 0);
    }
}
