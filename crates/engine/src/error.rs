// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("process monitor failed: {0}")]
    ProcessMonitor(#[from] pcguard_adapters::MonitorError),

    #[error("dns resolver failed: {0}")]
    DnsResolver(#[from] pcguard_dns::DnsError),

    #[error("packet filter failed: {0}")]
    PacketFilter(#[from] pcguard_adapters::FilterError),

    #[error("{0} failed to stop within its shutdown deadline")]
    ShutdownTimeout(&'static str),

    #[error("engine start failed; {failed} subsystem did not start: {source}")]
    StartFailed { failed: &'static str, #[source] source: Box<EngineError> },
}
