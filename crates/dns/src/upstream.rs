// SPDX-License-Identifier: MIT

//! Upstream resolver forwarding with round-robin order and per-upstream
//! health tracking (§4.3; the failover algorithm is a supplement beyond
//! spec.md's narrative, per SPEC_FULL §4.3).

use crate::error::DnsError;
use crate::message;
use hickory_proto::op::Message;
use parking_lot::Mutex;
use pcguard_core::Clock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing::warn;

struct Health {
    consecutive_timeouts: u32,
    unhealthy_until: Option<Instant>,
}

/// Round-robins across `upstream-dns` (§6), skipping an upstream that has
/// timed out `upstream-unhealthy-threshold` times in a row until its
/// cooldown window elapses.
pub struct UpstreamPool<C: Clock> {
    clock: C,
    addrs: Vec<String>,
    next: AtomicUsize,
    health: Mutex<HashMap<String, Health>>,
    query_deadline: Duration,
    unhealthy_threshold: u32,
    cooldown: Duration,
}

impl<C: Clock> UpstreamPool<C> {
    pub fn new(
        clock: C,
        addrs: Vec<String>,
        query_deadline: Duration,
        unhealthy_threshold: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            clock,
            addrs,
            next: AtomicUsize::new(0),
            health: Mutex::new(HashMap::new()),
            query_deadline,
            unhealthy_threshold,
            cooldown,
        }
    }

    fn is_healthy(&self, addr: &str) -> bool {
        match self.health.lock().get(addr) {
            Some(h) => match h.unhealthy_until {
                Some(until) => self.clock.now() >= until,
                None => true,
            },
            None => true,
        }
    }

    fn record_success(&self, addr: &str) {
        self.health.lock().remove(addr);
    }

    fn record_timeout(&self, addr: &str) {
        let mut health = self.health.lock();
        let entry = health
            .entry(addr.to_string())
            .or_insert_with(|| Health { consecutive_timeouts: 0, unhealthy_until: None });
        entry.consecutive_timeouts += 1;
        if entry.consecutive_timeouts >= self.unhealthy_threshold {
            entry.unhealthy_until = Some(self.clock.now() + self.cooldown);
        }
    }

    /// The order to try upstreams this query, starting from the next
    /// round-robin position, filtered to currently-healthy addresses
    /// (falling back to the full list if all are marked unhealthy — a
    /// cooldown should never cause total outage).
    fn order(&self) -> Vec<String> {
        if self.addrs.is_empty() {
            return Vec::new();
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        let mut ordered: Vec<String> =
            (0..self.addrs.len()).map(|i| self.addrs[(start + i) % self.addrs.len()].clone()).collect();

        let healthy: Vec<String> = ordered.iter().filter(|a| self.is_healthy(a)).cloned().collect();
        if !healthy.is_empty() {
            ordered = healthy;
        }
        ordered
    }

    /// Forwards `query` to upstreams in order until one answers or all
    /// fail; returns `UpstreamFailure` only once every candidate timed
    /// out (§4.3 "On all-upstreams-failure, answer SERVFAIL").
    pub async fn forward(&self, query: &Message) -> Result<Message, DnsError> {
        let bytes = message::encode(query)?;
        let mut last_err = DnsError::UpstreamFailure;

        for addr in self.order() {
            match self.try_one(&addr, &bytes).await {
                Ok(response) => {
                    self.record_success(&addr);
                    return Ok(response);
                }
                Err(e) => {
                    warn!(upstream = %addr, error = %e, "upstream query failed");
                    self.record_timeout(&addr);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn try_one(&self, addr: &str, query_bytes: &[u8]) -> Result<Message, DnsError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|_| DnsError::UpstreamFailure)?;
        socket.connect(addr).await.map_err(|_| DnsError::UpstreamFailure)?;

        tokio::time::timeout(self.query_deadline, async {
            socket.send(query_bytes).await.map_err(|_| DnsError::UpstreamFailure)?;
            let mut buf = [0u8; 4096];
            let n = socket.recv(&mut buf).await.map_err(|_| DnsError::UpstreamFailure)?;
            message::decode(&buf[..n])
        })
        .await
        .map_err(|_| DnsError::UpstreamTimeout)?
    }
}
