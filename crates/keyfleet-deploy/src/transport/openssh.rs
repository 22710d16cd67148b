// ABOUTME: RemoteShell adapter that runs commands through the system ssh client.
// ABOUTME: Public key authentication only; host keys are neither checked nor recorded.

use super::{CommandOutput, Endpoint, RemoteShell};
use crate::config::DeployConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Options that keep ssh non-interactive and key-only.
///
/// Host key checking is disabled and nothing is written to known_hosts, so a
/// spoofed host is not detected.
const SSH_OPTIONS: &[&str] = &[
    "BatchMode=yes",
    "PreferredAuthentications=publickey",
    "PasswordAuthentication=no",
    "KbdInteractiveAuthentication=no",
    "StrictHostKeyChecking=no",
    "UserKnownHostsFile=/dev/null",
    "LogLevel=ERROR",
];

#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    program: String,
    identity_file: Option<PathBuf>,
    connect_timeout: Duration,
}

impl OpenSshTransport {
    pub fn new(program: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            identity_file: None,
            connect_timeout,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            program: config.ssh_binary.clone(),
            identity_file: config.identity_file.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Full argument vector for running `command` on `endpoint`.
    pub fn args(&self, endpoint: &Endpoint, command: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        for option in SSH_OPTIONS {
            args.push("-o".into());
            args.push((*option).into());
        }
        args.push("-o".into());
        args.push(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)).into());

        if let Some(identity) = &self.identity_file {
            args.push("-i".into());
            args.push(identity.clone().into_os_string());
            args.push("-o".into());
            args.push("IdentitiesOnly=yes".into());
        }

        args.push("-p".into());
        args.push(endpoint.port.to_string().into());
        args.push("--".into());
        args.push(format!("{}@{}", endpoint.login, endpoint.host).into());
        args.push(command.into());
        args
    }
}

#[async_trait]
impl RemoteShell for OpenSshTransport {
    fn name(&self) -> &'static str {
        "openssh"
    }

    async fn exec(
        &self,
        endpoint: &Endpoint,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError> {
        debug!(
            host = %endpoint.host,
            port = endpoint.port,
            login = %endpoint.login,
            "running remote command over ssh"
        );

        let child = Command::new(&self.program)
            .args(self.args(endpoint, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: self.program.clone(),
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

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_args_disable_interactive_auth() {
        let transport = OpenSshTransport::new("ssh", Duration::from_secs(10));
        let args = strings(&transport.args(&Endpoint::new("web1", 22, "deploy"), "true"));

        for option in [
            "BatchMode=yes",
            "PreferredAuthentications=publickey",
            "PasswordAuthentication=no",
            "KbdInteractiveAuthentication=no",
            "StrictHostKeyChecking=no",
            "UserKnownHostsFile=/dev/null",
            "ConnectTimeout=10",
        ] {
            assert!(args.iter().any(|a| a == option), "missing {option}");
        }
        assert!(!args.iter().any(|a| a == "-i"));
    }

    #[test]
    fn test_args_end_with_destination_and_command() {
        let transport = OpenSshTransport::new("ssh", Duration::from_secs(5));
        let args = strings(&transport.args(&Endpoint::new("10.1.2.3", 2222, "ops"), "echo hi"));
        let tail = &args[args.len() - 5..];
        assert_eq!(tail, ["-p", "2222", "--", "ops@10.1.2.3", "echo hi"]);
    }

    #[test]
    fn test_args_include_identity_file() {
        let transport = OpenSshTransport::new("ssh", Duration::from_millis(200))
            .with_identity_file("/keys/deploy");
        let args = strings(&transport.args(&Endpoint::new("h", 22, "u"), "true"));

        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "/keys/deploy");
        assert!(args.iter().any(|a| a == "IdentitiesOnly=yes"));
        assert!(args.iter().any(|a| a == "ConnectTimeout=1"));
    }

    #[test]
    fn test_from_config() {
        let config = DeployConfig {
            ssh_binary: "/opt/ssh".to_string(),
            identity_file: Some(PathBuf::from("/k")),
            connect_timeout_secs: 3,
            ..DeployConfig::default()
        };
        let transport = OpenSshTransport::from_config(&config);
        let args = strings(&transport.args(&Endpoint::new("h", 22, "u"), "true"));
        assert!(args.iter().any(|a| a == "ConnectTimeout=3"));
        assert!(args.iter().any(|a| a == "/k"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let transport = OpenSshTransport::new("/nonexistent/keyfleet/ssh", Duration::from_secs(1));
        let err = transport
            .exec(&Endpoint::new("h", 22, "u"), "true", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
