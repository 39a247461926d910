// SPDX-License-Identifier: MIT

//! `pcguardctl processes ...`

use crate::client::AdminClient;
use crate::error::ClientError;
use crate::output::{print_kill_results, print_processes, print_value, OutputFormat};
use anyhow::Result;
use clap::Subcommand;
use pcguard_core::{AdminRequest, AdminResponse, Pid};

#[derive(Subcommand, Debug)]
pub enum ProcessesCommand {
    /// List processes currently observed by the Process Monitor.
    List,
    /// Terminate a process by pid.
    Kill {
        pid: Pid,
        /// Send SIGTERM (or the platform equivalent) instead of a hard kill.
        #[arg(long)]
        graceful: bool,
    },
    /// Terminate every process whose name matches a glob pattern.
    KillByName {
        pattern: String,
        #[arg(long)]
        graceful: bool,
    },
    /// Check whether a pid is currently observed as running.
    IsRunning { pid: Pid },
}

pub async fn handle(
    client: &mut AdminClient,
    format: OutputFormat,
    cmd: ProcessesCommand,
) -> Result<()> {
    match cmd {
        ProcessesCommand::List => match client.call(&AdminRequest::GetProcesses).await? {
            AdminResponse::Processes { processes } => print_processes(format, &processes),
            other => return Err(unexpected(other)),
        },
        ProcessesCommand::Kill { pid, graceful } => {
            match client.call(&AdminRequest::KillProcess { pid, graceful }).await? {
                AdminResponse::Ok => println!("pid {pid}: killed"),
                other => return Err(unexpected(other)),
            }
        }
        ProcessesCommand::KillByName { pattern, graceful } => {
            match client.call(&AdminRequest::KillProcessByName { pattern, graceful }).await? {
                AdminResponse::KillResults { results } => print_kill_results(format, &results),
                other => return Err(unexpected(other)),
            }
        }
        ProcessesCommand::IsRunning { pid } => {
            match client.call(&AdminRequest::IsProcessRunning { pid }).await? {
                AdminResponse::Running { running } => {
                    print_value(format, &running, |running| {
                        println!("pid {pid}: {}", if *running { "running" } else { "not running" });
                    });
                }
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
