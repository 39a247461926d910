// SPDX-License-Identifier: MIT

//! `pcguardctl signatures ...`

use crate::client::AdminClient;
use crate::error::ClientError;
use anyhow::Result;
use clap::Subcommand;
use pcguard_core::{AdminRequest, AdminResponse, ProcessSignature};

#[derive(Subcommand, Debug)]
pub enum SignaturesCommand {
    /// Add a process signature to the Process Identifier's table.
    Add {
        /// Logical process name, matched case-insensitively (§4.2).
        name: String,
        /// Glob pattern matched against the observed executable path.
        #[arg(long)]
        path_glob: Option<String>,
        /// Expected SHA-256 digest of the executable, hex-encoded.
        #[arg(long)]
        hash: Option<String>,
    },
}

pub async fn handle(client: &mut AdminClient, cmd: SignaturesCommand) -> Result<()> {
    match cmd {
        SignaturesCommand::Add { name, path_glob, hash } => {
            let signature = ProcessSignature { name, path_glob, hash };
            match client.call(&AdminRequest::AddProcessSignature { signature }).await? {
                AdminResponse::Ok => println!("signature added"),
                other => return Err(unexpected(other)),
            }
        }
    }
    Ok(())
}

fn unexpected(response: AdminResponse) -> anyhow::Error {
    match response {
        AdminResponse::Error { message } => ClientError::Daemon(message).into(),
        _ => ClientError::UnexpectedResponse.into(),
    }
}
