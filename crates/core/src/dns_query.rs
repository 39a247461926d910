// SPDX-License-Identifier: MIT

//! Transient DNS query representation consumed by the Decision Engine.
//! Never persisted; lives only for the duration of one resolver exchange.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Record type requested. Only the kinds the sinkhole/forward path cares
/// about are modeled explicitly; anything else forwards unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QType {
    A,
    Aaaa,
    Cname,
    Other(u16),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsQuery {
    pub qname: String,
    pub qtype: QType,
    pub client_ip: IpAddr,
    pub received_at_ms: u64,
}

impl DnsQuery {
    /// Normalizes a raw wire qname: lowercase, trailing dot removed.
    pub fn normalize_qname(raw: &str) -> String {
        raw.trim_end_matches('.').to_ascii_lowercase()
    }
}
