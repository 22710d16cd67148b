// ABOUTME: Reachability probing and idempotent authorized_keys install/remove for one endpoint.
// ABOUTME: Each mutation is one remote invocation whose outcome is read from a printed marker.

use crate::error::{InstallError, ReachabilityError, TransportError};
use crate::script::{
    has_marker, install_script, remove_script, MARKER_ALREADY_PRESENT, MARKER_INSTALLED,
    MARKER_NOT_PRESENT, MARKER_NO_KEY_STORE, MARKER_REMOVED, PROBE_COMMAND, PROBE_RESPONSE,
};
use crate::transport::{CommandOutput, Endpoint, RemoteShell};
use keyfleet_keys::AuthorizedKey;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What an install call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    AlreadyPresent,
}

/// What a remove call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStatus {
    Removed,
    /// The store exists but holds no matching line.
    NotPresent,
    /// The account has no authorized_keys file.
    NoKeyStore,
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStatus::Installed => write!(f, "installed"),
            InstallStatus::AlreadyPresent => write!(f, "already present"),
        }
    }
}

impl fmt::Display for RemovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalStatus::Removed => write!(f, "removed"),
            RemovalStatus::NotPresent => write!(f, "not present"),
            RemovalStatus::NoKeyStore => write!(f, "no authorized_keys file"),
        }
    }
}

/// Installs and removes one public key on remote accounts through a [`RemoteShell`].
#[derive(Clone)]
pub struct RemoteKeyInstaller {
    shell: Arc<dyn RemoteShell>,
    command_timeout: Duration,
}

impl RemoteKeyInstaller {
    pub fn new(shell: Arc<dyn RemoteShell>, command_timeout: Duration) -> Self {
        Self {
            shell,
            command_timeout,
        }
    }

    /// Run the no-op probe and require its exact response.
    pub async fn test_reachability(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<(), ReachabilityError> {
        let output = match self.shell.exec(endpoint, PROBE_COMMAND, timeout).await {
            Ok(output) => output,
            Err(TransportError::Timeout(_)) => {
                return Err(ReachabilityError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout,
                });
            }
            Err(source) => {
                return Err(ReachabilityError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
        };

        if !output.success() {
            let err = classify_probe_failure(endpoint, &output, timeout);
            warn!(endpoint = %endpoint, error = %err, "reachability probe failed");
            return Err(err);
        }

        if output.stdout.trim() != PROBE_RESPONSE {
            return Err(ReachabilityError::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                output: output.stdout.trim().to_string(),
            });
        }

        debug!(endpoint = %endpoint, "reachability probe succeeded");
        Ok(())
    }

    /// Append `key` to the account's authorized_keys unless the same
    /// (key type, key blob) pair is already there.
    pub async fn install_public_key(
        &self,
        endpoint: &Endpoint,
        key: &AuthorizedKey,
    ) -> Result<InstallStatus, InstallError> {
        let script = install_script(key.key_type(), key.key_blob(), &key.to_string());
        let output = self.run(endpoint, &script).await?;

        let status = if has_marker(&output.stdout, MARKER_INSTALLED) {
            InstallStatus::Installed
        } else if has_marker(&output.stdout, MARKER_ALREADY_PRESENT) {
            InstallStatus::AlreadyPresent
        } else {
            return Err(confirmation_mismatch(endpoint, &output));
        };

        info!(endpoint = %endpoint, status = %status, "public key install finished");
        Ok(status)
    }

    /// Remove every line carrying the same (key type, key blob) pair as `key`.
    pub async fn remove_public_key(
        &self,
        endpoint: &Endpoint,
        key: &AuthorizedKey,
    ) -> Result<RemovalStatus, InstallError> {
        let script = remove_script(key.key_type(), key.key_blob());
        let output = self.run(endpoint, &script).await?;

        let status = if has_marker(&output.stdout, MARKER_REMOVED) {
            RemovalStatus::Removed
        } else if has_marker(&output.stdout, MARKER_NOT_PRESENT) {
            RemovalStatus::NotPresent
        } else if has_marker(&output.stdout, MARKER_NO_KEY_STORE) {
            RemovalStatus::NoKeyStore
        } else {
            return Err(confirmation_mismatch(endpoint, &output));
        };

        info!(endpoint = %endpoint, status = %status, "public key removal finished");
        Ok(status)
    }

    async fn run(&self, endpoint: &Endpoint, script: &str) -> Result<CommandOutput, InstallError> {
        let output = self
            .shell
            .exec(endpoint, script, self.command_timeout)
            .await
            .map_err(|source| InstallError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if output.success() {
            return Ok(output);
        }

        let detail = output.failure_detail();
        if output.stderr.contains("Permission denied") {
            return Err(InstallError::PermissionDenied {
                endpoint: endpoint.to_string(),
                detail,
            });
        }
        Err(InstallError::CommandFailed {
            endpoint: endpoint.to_string(),
            code: output.status,
            detail,
        })
    }
}

impl fmt::Debug for RemoteKeyInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKeyInstaller")
            .field("shell", &self.shell.name())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

fn confirmation_mismatch(endpoint: &Endpoint, output: &CommandOutput) -> InstallError {
    InstallError::ConfirmationMismatch {
        endpoint: endpoint.to_string(),
        output: output.stdout.trim().to_string(),
    }
}

/// Map a failed probe to a reachability error using ssh's diagnostics.
fn classify_probe_failure(
    endpoint: &Endpoint,
    output: &CommandOutput,
    timeout: Duration,
) -> ReachabilityError {
    let detail = output.failure_detail();
    let lower = detail.to_ascii_lowercase();

    if lower.contains("permission denied")
        || lower.contains("too many authentication failures")
        || lower.contains("no supported authentication methods")
    {
        ReachabilityError::AuthenticationFailed {
            endpoint: endpoint.to_string(),
            detail,
        }
    } else if lower.contains("timed out") {
        ReachabilityError::Timeout {
            endpoint: endpoint.to_string(),
            timeout,
        }
    } else {
        ReachabilityError::Unreachable {
            endpoint: endpoint.to_string(),
            detail,
        }
    }
}
