// SPDX-License-Identifier: MIT

//! UDP-primary, TCP-fallback accept loop (§4.3 `Start`/`Stop`). Structure
//! mirrors the teacher daemon's `Listener` task: a spawned task per
//! accepted connection/datagram, `tokio::select!` over both sockets, and
//! a `CancellationToken` for cooperative shutdown within
//! `shutdown-timeout` (§4.3 `Stop`).

use crate::error::DnsError;
use crate::message;
use crate::resolver::DnsResolver;
use pcguard_core::Clock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const MAX_UDP_DATAGRAM: usize = 4096;

/// Owns the bound sockets and drives the serve loop until cancelled.
pub struct DnsServer<C: Clock> {
    resolver: Arc<DnsResolver<C>>,
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    cancel: CancellationToken,
    inflight: Arc<tokio::sync::Semaphore>,
    max_concurrent: usize,
}

impl<C: Clock> DnsServer<C> {
    pub async fn bind(
        resolver: Arc<DnsResolver<C>>,
        addr: &str,
        max_concurrent: usize,
    ) -> Result<Self, DnsError> {
        let socket_addr: SocketAddr = addr.parse().map_err(|_| DnsError::BindFailed {
            addr: addr.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad address"),
        })?;

        let udp = UdpSocket::bind(socket_addr)
            .await
            .map_err(|source| DnsError::BindFailed { addr: addr.to_string(), source })?;
        let tcp = TcpListener::bind(socket_addr)
            .await
            .map_err(|source| DnsError::BindFailed { addr: addr.to_string(), source })?;

        let max_concurrent = max_concurrent.max(1);
        Ok(Self {
            resolver,
            udp: Arc::new(udp),
            tcp,
            cancel: CancellationToken::new(),
            inflight: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    /// Runs until the cancellation token fires, then stops accepting and
    /// waits (bounded by `shutdown_timeout`) for in-flight queries to
    /// drain (§4.3 `Stop`).
    pub async fn run(self, shutdown_timeout: Duration) {
        self.resolver.mark_started();
        let mut udp_buf = vec![0u8; MAX_UDP_DATAGRAM];

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.udp.recv_from(&mut udp_buf) => {
                    match result {
                        Ok((n, peer)) => self.spawn_udp(udp_buf[..n].to_vec(), peer),
                        Err(e) => error!(error = %e, "udp recv error"),
                    }
                }
                result = self.tcp.accept() => {
                    match result {
                        Ok((stream, peer)) => self.spawn_tcp(stream, peer),
                        Err(e) => error!(error = %e, "tcp accept error"),
                    }
                }
            }
        }

        debug!("dns server stopping, draining in-flight queries");
        let drained = tokio::time::timeout(shutdown_timeout, async {
            let _ = self.inflight.acquire_many(self.max_concurrent as u32).await;
        })
        .await;
        if drained.is_err() {
            warn!("shutdown timeout elapsed with queries still in flight");
        }
        self.resolver.mark_stopped();
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn spawn_udp(&self, bytes: Vec<u8>, peer: SocketAddr) {
        let resolver = Arc::clone(&self.resolver);
        let permits = Arc::clone(&self.inflight);
        let udp = Arc::clone(&self.udp);
        tokio::spawn(async move {
            let Ok(_guard) = permits.acquire_owned().await else { return };
            match message::decode(&bytes) {
                Ok(request) if DnsResolver::<C>::is_query(&request) => {
                    match resolver.handle_query(&request).await {
                        Ok(response_bytes) => {
                            if let Err(e) = udp.send_to(&response_bytes, peer).await {
                                warn!(%peer, error = %e, "udp send failed");
                            }
                        }
                        Err(e) => warn!(%peer, error = %e, "query handling failed"),
                    }
                }
                Ok(_) => debug!(%peer, "ignoring non-query dns message"),
                Err(e) => debug!(%peer, error = %e, "failed to decode udp datagram"),
            }
        });
    }

    fn spawn_tcp(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let resolver = Arc::clone(&self.resolver);
        let permits = Arc::clone(&self.inflight);
        tokio::spawn(async move {
            let Ok(_guard) = permits.acquire_owned().await else { return };
            if let Err(e) = serve_tcp_connection(stream, &resolver).await {
                debug!(%peer, error = %e, "tcp connection closed");
            }
        });
    }
}

/// Reads one length-prefixed DNS message per RFC 1035 §4.2.2, answers it,
/// and writes back a length-prefixed response. A TCP client may pipeline
/// multiple queries on one connection; this loop serves them until EOF.
async fn serve_tcp_connection<C: Clock>(
    mut stream: tokio::net::TcpStream,
    resolver: &DnsResolver<C>,
) -> Result<(), DnsError> {
    loop {
        let mut len_buf = [0u8; 2];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream
            .read_exact(&mut body)
            .await
            .map_err(|_| DnsError::Decode("truncated tcp message".into()))?;

        let request = message::decode(&body)?;
        if !DnsResolver::<C>::is_query(&request) {
            continue;
        }
        let response_bytes = resolver.handle_query(&request).await?;
        let len_prefix = (response_bytes.len() as u16).to_be_bytes();
        stream
            .write_all(&len_prefix)
            .await
            .map_err(|source| DnsError::BindFailed { addr: "tcp-write".into(), source })?;
        stream
            .write_all(&response_bytes)
            .await
            .map_err(|source| DnsError::BindFailed { addr: "tcp-write".into(), source })?;
    }
}
