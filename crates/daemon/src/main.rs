// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `pcguardd`: the enforcement daemon binary.

use clap::Parser;
use pcguard_core::Config;
use pcguard_daemon::LifecycleError;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pcguardd", version, about = "Host-resident process/DNS/packet enforcement daemon")]
struct Args {
    /// Path to a TOML configuration file. Falls back to PCGUARD_CONFIG or
    /// /etc/pcguard/pcguard.toml, then to defaults plus env overrides.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = args.config.or_else(pcguard_daemon::env::default_config_path);
    let config = Config::load(config_path.as_deref())?;

    let _log_guard = setup_logging(&config)?;

    if let Err(e) = pcguard_daemon::run(config, config_path.as_deref()).await {
        tracing::error!(error = %e, "pcguardd exited with an error");
        return Err(e.into());
    }
    Ok(())
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    let data_dir = config.data_dir();
    std::fs::create_dir_all(data_dir)?;

    let file_appender = tracing_appender::rolling::never(data_dir, "pcguardd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
