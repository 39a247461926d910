// SPDX-License-Identifier: MIT

//! `pcguardctl ping`/`stats`/`system-info`

use crate::client::AdminClient;
use crate::error::ClientError;
use crate::output::{print_stats, print_system_info, OutputFormat};
use anyhow::Result;
use pcguard_core::{AdminRequest, AdminResponse};

pub async fn ping(client: &mut AdminClient) -> Result<()> {
    match client.call(&AdminRequest::Ping).await? {
        AdminResponse::Pong => {
            println!("pong");
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

pub async fn stats(client: &mut AdminClient, format: OutputFormat) -> Result<()> {
    match client.call(&AdminRequest::Stats).await? {
        AdminResponse::Stats { stats } => {
            print_stats(format, &stats);
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

pub async fn system_info(client: &mut AdminClient, format: OutputFormat) -> Result<()> {
    match client.call(&AdminRequest::SystemInfo).await? {
        AdminResponse::SystemInfo { info } => {
            print_system_info(format, &info);
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: AdminResponse) -> anyhow::Error {
    match response {
        AdminResponse::Error { message } => ClientError::Daemon(message).into(),
        _ => ClientError::UnexpectedResponse.into(),
    }
}
