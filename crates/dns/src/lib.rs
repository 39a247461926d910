// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcguard-dns: the DNS Resolver/Blocker (§4.3) — wire codec, response
//! cache, upstream forwarding, and the UDP/TCP serve loop.

pub mod cache;
pub mod error;
pub mod message;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod upstream;

pub use error::DnsError;
pub use resolver::{DnsResolver, ResolverConfig};
pub use server::DnsServer;
pub use stats::ResolverStats;
