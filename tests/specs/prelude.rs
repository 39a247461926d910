//! Test helpers for black-box `pcguardd`/`pcguardctl` specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 2_000;

/// Returns the path to a workspace binary, checking the llvm-cov target
/// directory first. Falls back to resolving relative to the test binary
/// itself when `CARGO_MANIFEST_DIR` is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where pcguardd/pcguardctl are built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn pcguardd_binary() -> PathBuf {
    binary_path("pcguardd")
}

pub fn pcguardctl_binary() -> PathBuf {
    binary_path("pcguardctl")
}

/// Poll a condition until it returns true or the timeout elapses.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

/// Fluent builder for a single `pcguardctl` invocation against a
/// particular daemon's config file.
pub struct CliBuilder {
    args: Vec<String>,
    config_path: PathBuf,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn command(self) -> Command {
        let mut cmd = Command::new(pcguardctl_binary());
        cmd.arg("--config").arg(&self.config_path);
        cmd.args(&self.args);
        cmd.env_remove("PCGUARD_CONFIG");
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("pcguardctl should run");
        assert!(
            output.status.success(),
            "expected pcguardctl to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("pcguardctl should run");
        assert!(
            !output.status.success(),
            "expected pcguardctl to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Result of a `pcguardctl` run, for chaining assertions.
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain '{expected}'\nstdout: {stdout}");
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(!stdout.contains(unexpected), "stdout should not contain '{unexpected}'\nstdout: {stdout}");
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr does not contain '{expected}'\nstderr: {stderr}");
        self
    }
}

/// A real `pcguardd` process, isolated to a tempdir, torn down on `Drop`.
pub struct Daemon {
    _dir: tempfile::TempDir,
    config_path: PathBuf,
    admin_socket_path: PathBuf,
    child: Child,
}

impl Daemon {
    /// Spawns `pcguardd` against an isolated config (ephemeral DNS port,
    /// packet filtering disabled so no root/iptables is required) and
    /// blocks until its admin socket answers `ping`.
    pub fn start() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let data_dir = dir.path().join("data");
        let admin_socket_path = dir.path().join("admin.sock");
        let config_path = dir.path().join("pcguard.toml");

        std::fs::write(
            &config_path,
            format!(
                r#"
data-dir = "{data_dir}"
admin-socket-path = "{admin_socket_path}"
dns-listen-address = "127.0.0.1:0"
enable-network-filtering = false
shutdown-timeout-secs = 1
sync-interval-secs = 3600
log-level = "warn"
"#,
                data_dir = data_dir.display(),
                admin_socket_path = admin_socket_path.display(),
            ),
        )
        .expect("config file should be writable");

        let child = Command::new(pcguardd_binary())
            .arg("--config")
            .arg(&config_path)
            .env_remove("PCGUARD_CONFIG")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("pcguardd should spawn");

        let daemon = Self { _dir: dir, config_path, admin_socket_path, child };

        let reachable = wait_for(SPEC_WAIT_MAX_MS, || {
            daemon.ctl().args(&["ping"]).command().output().map(|o| o.status.success()).unwrap_or(false)
        });
        assert!(reachable, "pcguardd did not become reachable within {SPEC_WAIT_MAX_MS}ms");
        daemon
    }

    /// Build a `pcguardctl` invocation scoped to this daemon's config.
    pub fn ctl(&self) -> CliBuilder {
        CliBuilder { args: Vec::new(), config_path: self.config_path.clone() }
    }

    pub fn admin_socket_path(&self) -> &Path {
        &self.admin_socket_path
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let pid = self.child.id();
        let _ = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let deadline = Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS));
                }
                _ => {
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }
    }
}
