// SPDX-License-Identifier: MIT

//! Admin protocol server (SPEC_FULL §6): a Unix domain socket accepting
//! 4-byte big-endian length-prefixed JSON frames, mirroring the teacher
//! daemon's IPC wire shape. One connection, any number of pipelined
//! requests; a decode failure closes that connection without touching
//! the others.

use pcguard_core::{AdminRequest, AdminResponse, Clock, KillOutcome, SyncSummary};
use pcguard_engine::{EnforcementEngine, EngineError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

pub struct AdminServer {
    listener: UnixListener,
    socket_path: PathBuf,
    cancel: CancellationToken,
}

impl AdminServer {
    pub fn bind(socket_path: &Path) -> std::io::Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        Ok(Self { listener, socket_path: socket_path.to_path_buf(), cancel: CancellationToken::new() })
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accepts connections until cancelled, spawning one task per
    /// connection. Removes the socket file on exit.
    pub async fn run<C: Clock + 'static>(self, engine: Arc<EnforcementEngine<C>>) {
        info!(path = %self.socket_path.display(), "admin server listening");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let engine = Arc::clone(&engine);
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, &engine).await {
                                    debug!(error = %e, "admin connection closed");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "admin socket accept failed"),
                    }
                }
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
        info!("admin server stopped");
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

async fn serve_connection<C: Clock>(
    mut stream: UnixStream,
    engine: &EnforcementEngine<C>,
) -> std::io::Result<()> {
    loop {
        let request = match read_frame::<AdminRequest>(&mut stream).await? {
            Some(request) => request,
            None => return Ok(()),
        };
        let response = dispatch(engine, request).await;
        write_frame(&mut stream, &response).await?;
    }
}

async fn read_frame<T: serde::de::DeserializeOwned>(
    stream: &mut (impl AsyncRead + Unpin),
) -> std::io::Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = stream.read_exact(&mut len_buf).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(e);
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "admin frame too large"));
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

async fn write_frame<T: serde::Serialize>(
    stream: &mut (impl AsyncWrite + Unpin),
    value: &T,
) -> std::io::Result<()> {
    let body = serde_json::to_vec(value)?;
    let len = u32::try_from(body.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "admin response too large"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await
}

async fn dispatch<C: Clock>(engine: &EnforcementEngine<C>, request: AdminRequest) -> AdminResponse {
    match request {
        AdminRequest::Ping => AdminResponse::Pong,
        AdminRequest::AddProcessSignature { signature } => {
            engine.add_process_signature(signature);
            AdminResponse::Ok
        }
        AdminRequest::AddNetworkRule { rule } => match engine.add_network_rule(rule).await {
            Ok(()) => AdminResponse::Ok,
            Err(e) => error_response(e),
        },
        AdminRequest::RemoveNetworkRule { id } => match engine.remove_network_rule(id).await {
            Ok(()) => AdminResponse::Ok,
            Err(e) => error_response(e),
        },
        AdminRequest::GetCurrentRules => AdminResponse::Rules { rules: engine.get_current_rules() },
        AdminRequest::ClearAllRules => match engine.clear_all_rules().await {
            Ok(()) => AdminResponse::Ok,
            Err(e) => error_response(e),
        },
        AdminRequest::SyncRules => {
            let report = engine.sync_rules().await;
            AdminResponse::SyncReport {
                report: SyncSummary {
                    added: report.added,
                    removed: report.removed,
                    skipped_filter_failures: report.skipped_filter_failures,
                    terminated_processes: report.terminated_processes,
                    rule_set_version: report.rule_set_version,
                },
            }
        }
        AdminRequest::GetProcesses => AdminResponse::Processes { processes: engine.get_processes() },
        AdminRequest::KillProcess { pid, graceful } => match engine.kill_process(pid, graceful).await {
            Ok(()) => AdminResponse::Ok,
            Err(e) => error_response(e),
        },
        AdminRequest::KillProcessByName { pattern, graceful } => {
            let results = engine.kill_process_by_name(&pattern, graceful).await;
            AdminResponse::KillResults {
                results: results
                    .into_iter()
                    .map(|(pid, result)| match result {
                        Ok(()) => KillOutcome { pid, ok: true, error: None },
                        Err(e) => KillOutcome { pid, ok: false, error: Some(e.to_string()) },
                    })
                    .collect(),
            }
        }
        AdminRequest::IsProcessRunning { pid } => {
            AdminResponse::Running { running: engine.is_process_running(pid) }
        }
        AdminRequest::Stats => AdminResponse::Stats { stats: engine.stats().await },
        AdminRequest::SystemInfo => AdminResponse::SystemInfo { info: engine.system_info().await },
    }
}

fn error_response(e: EngineError) -> AdminResponse {
    warn!(error = %e, "admin request failed");
    AdminResponse::Error { message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trips_over_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_frame(&mut a, &AdminRequest::Ping).await.unwrap();
        let received: AdminRequest = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(received, AdminRequest::Ping);
    }

    #[tokio::test]
    async fn reading_past_a_clean_close_yields_none() {
        let (a, b) = tokio::io::duplex(4096);
        drop(a);
        let mut b = b;
        let received: Option<AdminRequest> = read_frame(&mut b).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn oversized_frame_length_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        a.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();
        let result: std::io::Result<Option<AdminRequest>> = read_frame(&mut b).await;
        assert!(result.is_err());
    }
}
