// SPDX-License-Identifier: MIT

//! A thin client for the admin protocol (SPEC_FULL §6): connects to
//! `pcguardd`'s Unix domain socket and speaks the same 4-byte big-endian
//! length-prefixed JSON frames as the daemon's `admin.rs` server, one
//! request per round trip.

use crate::error::ClientError;
use pcguard_core::{AdminRequest, AdminResponse};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

pub struct AdminClient {
    stream: UnixStream,
}

impl AdminClient {
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream =
            UnixStream::connect(socket_path).await.map_err(|source| ClientError::Connect {
                path: socket_path.display().to_string(),
                source,
            })?;
        Ok(Self { stream })
    }

    pub async fn call(&mut self, request: &AdminRequest) -> Result<AdminResponse, ClientError> {
        write_frame(&mut self.stream, request).await?;
        read_frame(&mut self.stream).await
    }
}

async fn write_frame<T: serde::Serialize>(
    stream: &mut (impl AsyncWrite + Unpin),
    value: &T,
) -> Result<(), ClientError> {
    let body = serde_json::to_vec(value)?;
    let len = u32::try_from(body.len()).map_err(|_| {
        ClientError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "request too large"))
    })?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame(stream: &mut (impl AsyncRead + Unpin)) -> Result<AdminResponse, ClientError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "admin response too large",
        )));
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    let response = serde_json::from_slice(&body)?;
    Ok(response)
}

/// Resolves the admin socket path: an explicit `--socket` flag wins,
/// otherwise the configured/default path as loaded from `Config`.
pub fn resolve_socket_path(explicit: Option<PathBuf>, configured: &str) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(configured))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_a_response() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_frame(&mut a, &AdminResponse::Pong).await.unwrap();
        let response = read_frame(&mut b).await.unwrap();
        assert_eq!(response, AdminResponse::Pong);
    }

    #[test]
    fn explicit_socket_flag_overrides_configured_path() {
        let resolved =
            resolve_socket_path(Some(PathBuf::from("/tmp/explicit.sock")), "/tmp/configured.sock");
        assert_eq!(resolved, PathBuf::from("/tmp/explicit.sock"));
    }

    #[test]
    fn absent_socket_flag_falls_back_to_configured_path() {
        let resolved = resolve_socket_path(None, "/tmp/configured.sock");
        assert_eq!(resolved, PathBuf::from("/tmp/configured.sock"));
    }
}
