// SPDX-License-Identifier: MIT

//! Errors talking to `pcguardd` over the admin socket.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to pcguardd admin socket at {path}: {source}")]
    Connect { path: String, #[source] source: std::io::Error },

    #[error("io error talking to pcguardd: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed admin response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("pcguardd reported an error: {0}")]
    Daemon(String),

    #[error("unexpected admin response for this request")]
    UnexpectedResponse,
}
