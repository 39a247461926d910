// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcguard-daemon: `pcguardd`, the long-running process hosting every
//! enforcement subsystem (SPEC_FULL §4.8) behind a Unix-socket admin
//! protocol (§6).

pub mod admin;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod signatures;

pub use error::LifecycleError;
pub use lifecycle::Daemon;

use pcguard_core::Config;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs `pcguardd` to completion: start every subsystem, block until a
/// shutdown signal (SIGINT/SIGTERM) or the given token fires, then stop
/// in reverse order.
pub async fn run(config: Config, config_source: Option<&std::path::Path>) -> Result<(), LifecycleError> {
    if let Some(path) = config_source {
        info!(path = %path.display(), "loaded configuration");
    } else {
        info!("running with built-in configuration defaults plus environment overrides");
    }

    let data_dir = config.data_dir().to_path_buf();
    let lock_path = env::lock_path(&data_dir);
    let signatures_path = env::signatures_path(&data_dir);

    let daemon = lifecycle::start(config, &data_dir, &lock_path, &signatures_path).await?;

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_shutdown.cancel();
    });

    daemon.run_until_shutdown(shutdown).await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler, watching SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
