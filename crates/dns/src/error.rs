// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed { addr: String, #[source] source: std::io::Error },

    #[error("resolver is already running")]
    AlreadyRunning,

    #[error("resolver is not running")]
    NotRunning,

    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("all upstreams failed")]
    UpstreamFailure,

    #[error("failed to decode DNS message: {0}")]
    Decode(String),

    #[error("failed to encode DNS message: {0}")]
    Encode(String),
}
