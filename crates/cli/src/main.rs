// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `pcguardctl`: an admin-protocol client for `pcguardd`.

mod client;
mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use client::AdminClient;
use commands::{processes, rules, signatures, system};
use output::OutputFormat;
use pcguard_core::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "pcguardctl",
    version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH")),
    about = "Control and inspect a running pcguardd"
)]
struct Args {
    /// Path to the TOML configuration file pcguardd was started with, used
    /// only to discover the admin socket path when `--socket` is absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Admin socket path, overriding whatever the configuration says.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that pcguardd is reachable.
    Ping,
    /// Aggregate DNS/decision/audit counters.
    Stats,
    /// Platform, packet-filter mechanism, and version information.
    SystemInfo,
    /// Manage network rules loaded in the Decision Engine.
    Rules {
        #[command(subcommand)]
        command: rules::RulesCommand,
    },
    /// Inspect and terminate observed processes.
    Processes {
        #[command(subcommand)]
        command: processes::ProcessesCommand,
    },
    /// Manage the Process Identifier's signature table.
    Signatures {
        #[command(subcommand)]
        command: signatures::SignaturesCommand,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config_path = args.config.or_else(default_config_path);
    let config = Config::load(config_path.as_deref())?;
    let socket_path = client::resolve_socket_path(args.socket, &config.admin_socket_path);

    let mut client = AdminClient::connect(&socket_path).await?;

    match args.command {
        Command::Ping => system::ping(&mut client).await,
        Command::Stats => system::stats(&mut client, args.format).await,
        Command::SystemInfo => system::system_info(&mut client, args.format).await,
        Command::Rules { command } => rules::handle(&mut client, args.format, command).await,
        Command::Processes { command } => processes::handle(&mut client, args.format, command).await,
        Command::Signatures { command } => signatures::handle(&mut client, command).await,
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PCGUARD_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let etc = PathBuf::from("/etc/pcguard/pcguard.toml");
    etc.exists().then_some(etc)
}
