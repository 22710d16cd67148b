// ABOUTME: Remote command execution port used by the key installer.
// ABOUTME: Adapters: the system OpenSSH client and a local /bin/sh for the current account.

mod local;
mod openssh;

pub use local::LocalShell;
pub use openssh::OpenSshTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::process::Output;
use std::time::Duration;

/// Where a command runs: `login@host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub login: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, login: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            login: login.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.login, self.host, self.port)
    }
}

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Trimmed stderr, or a description of the exit status when stderr is empty.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.status {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Executes one shell command on an endpoint.
///
/// Implementations must give up after `timeout` and must not leave the
/// underlying process running once the returned future is dropped.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Unique name for this transport
    fn name(&self) -> &'static str;

    async fn exec(
        &self,
        endpoint: &Endpoint,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::new("db.internal", 2200, "postgres");
        assert_eq!(endpoint.to_string(), "postgres@db.internal:2200");
    }

    #[test]
    fn test_failure_detail_prefers_stderr() {
        let output = CommandOutput {
            status: Some(255),
            stdout: String::new(),
            stderr: "ssh: connect to host x port 22: Connection refused\n".to_string(),
        };
        assert!(!output.success());
        assert_eq!(
            output.failure_detail(),
            "ssh: connect to host x port 22: Connection refused"
        );
    }

    #[test]
    fn test_failure_detail_falls_back_to_status() {
        let output = CommandOutput {
            status: Some(3),
            ..CommandOutput::default()
        };
        assert_eq!(output.failure_detail(), "exit status 3");

        let killed = CommandOutput::default();
        assert_eq!(killed.failure_detail(), "terminated by signal");
    }
}
