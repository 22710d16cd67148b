// ABOUTME: RemoteShell adapter that runs commands through /bin/sh for the local account.
// ABOUTME: Installs keys on the machine keyfleet runs on, optionally under a different $HOME.

use super::{CommandOutput, Endpoint, RemoteShell};
use crate::error::TransportError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs every command locally; the endpoint is only used for logging.
#[derive(Debug, Clone)]
pub struct LocalShell {
    shell: PathBuf,
    home: Option<PathBuf>,
}

impl Default for LocalShell {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            home: None,
        }
    }
}

impl LocalShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands with `$HOME` set to `home`.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}

#[async_trait]
impl RemoteShell for LocalShell {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn exec(
        &self,
        endpoint: &Endpoint,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError> {
        debug!(endpoint = %endpoint, "running command in local shell");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(home) = &self.home {
            cmd.env("HOME", home);
        }

        let child = cmd.spawn().map_err(|source| TransportError::Spawn {
            program: self.shell.display().to_string(),
            source,
        })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?.into()),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("localhost", 22, "me")
    }

    #[tokio::test]
    async fn test_captures_stdout_and_status() {
        let output = LocalShell::new()
            .exec(&endpoint(), "echo out; echo err >&2; exit 3", Duration::from_secs(5))
            .await
            .expect("should run");
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.status, Some(3));
    }

    #[tokio::test]
    async fn test_overrides_home() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let output = LocalShell::new()
            .with_home(dir.path())
            .exec(&endpoint(), "printf %s \"$HOME\"", Duration::from_secs(5))
            .await
            .expect("should run");
        assert_eq!(output.stdout, dir.path().display().to_string());
    }

    #[tokio::test]
    async fn test_times_out() {
        let started = std::time::Instant::now();
        let err = LocalShell::new()
            .exec(&endpoint(), "sleep 30", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
