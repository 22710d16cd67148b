// ABOUTME: Concurrent fan-out of one public key to many targets.
// ABOUTME: Bounded by a semaphore; every dispatched target yields exactly one outcome, in dispatch order.

use crate::config::DeployLimits;
use crate::error::{BatchTimeoutError, DeadlineScope, DeployError, ReachabilityError, TargetError};
use crate::installer::RemoteKeyInstaller;
use crate::outcome::{DeploymentBatch, DeploymentOutcome, PendingDeployment};
use crate::target::DeployTarget;
use crate::transport::{Endpoint, RemoteShell};
use keyfleet_keys::AuthorizedKey;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Deploy,
    Revoke,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Deploy => write!(f, "deploy"),
            Operation::Revoke => write!(f, "revoke"),
        }
    }
}

/// Deploys or revokes one public key across a set of targets.
#[derive(Debug, Clone)]
pub struct Deployer {
    installer: RemoteKeyInstaller,
    limits: DeployLimits,
}

impl Deployer {
    /// # Errors
    /// Returns `DeployError::InvalidLimits` for zero concurrency or zero deadlines.
    pub fn new(shell: Arc<dyn RemoteShell>, limits: DeployLimits) -> Result<Self, DeployError> {
        limits.validate()?;
        Ok(Self {
            installer: RemoteKeyInstaller::new(shell, limits.command_timeout),
            limits,
        })
    }

    pub fn installer(&self) -> &RemoteKeyInstaller {
        &self.installer
    }

    pub fn limits(&self) -> &DeployLimits {
        &self.limits
    }

    /// Run only the reachability probe against one endpoint.
    pub async fn check(&self, endpoint: &Endpoint) -> Result<(), ReachabilityError> {
        self.installer
            .test_reachability(endpoint, self.limits.command_timeout)
            .await
    }

    /// Probe each target, then install `line` on it.
    ///
    /// # Errors
    /// Only usage errors are returned; per-target failures are reported in
    /// the batch.
    pub async fn deploy(
        &self,
        line: &str,
        targets: &[DeployTarget],
    ) -> Result<DeploymentBatch, DeployError> {
        self.fan_out(Operation::Deploy, line, targets).await
    }

    /// Probe each target, then remove `line` from it.
    ///
    /// # Errors
    /// Same usage errors as [`Deployer::deploy`].
    pub async fn revoke(
        &self,
        line: &str,
        targets: &[DeployTarget],
    ) -> Result<DeploymentBatch, DeployError> {
        self.fan_out(Operation::Revoke, line, targets).await
    }

    async fn fan_out(
        &self,
        operation: Operation,
        line: &str,
        targets: &[DeployTarget],
    ) -> Result<DeploymentBatch, DeployError> {
        let key = validate_request(line, targets)?;
        let batch_started = Instant::now();
        let batch_deadline = self.limits.batch_deadline.map(|limit| (batch_started + limit, limit));

        info!(
            operation = %operation,
            targets = targets.len(),
            max_concurrency = self.limits.max_concurrency,
            "starting batch"
        );

        // Backpressure: cap simultaneous remote sessions
        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrency));

        let mut dispatched = Vec::with_capacity(targets.len());
        for target in targets {
            let pending = PendingDeployment::new(target.clone());
            let endpoint = target.endpoint();
            let installer = self.installer.clone();
            let key = key.clone();
            let sem_clone = Arc::clone(&semaphore);
            let limits = self.limits;

            let handle = tokio::spawn(async move {
                let _permit = match sem_clone.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            Err(TargetError::Aborted("concurrency limiter closed".to_string())),
                            Duration::ZERO,
                        );
                    }
                };

                // The per-target deadline starts once a permit is held.
                let started = Instant::now();
                let work = run_target(&installer, operation, &endpoint, &key, limits.command_timeout);
                let result = match tokio::time::timeout(limits.target_deadline, work).await {
                    Ok(result) => result,
                    Err(_) => Err(BatchTimeoutError {
                        scope: DeadlineScope::Target,
                        limit: limits.target_deadline,
                    }
                    .into()),
                };
                (result, started.elapsed())
            });
            dispatched.push((pending, handle));
        }

        let mut outcomes = Vec::with_capacity(dispatched.len());
        for (pending, mut handle) in dispatched {
            let joined = match batch_deadline {
                Some((deadline, limit)) => {
                    match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            handle.abort();
                            let err = BatchTimeoutError {
                                scope: DeadlineScope::Batch,
                                limit,
                            };
                            let outcome =
                                pending.complete::<()>(Err(err.into()), batch_started.elapsed());
                            log_outcome(operation, &outcome);
                            outcomes.push(outcome);
                            continue;
                        }
                    }
                }
                None => handle.await,
            };

            let (result, elapsed) = match joined {
                Ok(report) => report,
                Err(join_err) => (Err(join_error(join_err)), batch_started.elapsed()),
            };
            let outcome = pending.complete(result, elapsed);
            log_outcome(operation, &outcome);
            outcomes.push(outcome);
        }

        let batch = DeploymentBatch::from_outcomes(outcomes);
        info!(
            operation = %operation,
            total = batch.total(),
            success = batch.success(),
            failed = batch.failed(),
            elapsed_ms = batch_started.elapsed().as_millis() as u64,
            "batch finished"
        );
        Ok(batch)
    }
}

/// Check a deploy request before any remote command is issued.
///
/// # Errors
/// Returns the first usage problem: empty or invalid key line, no targets,
/// an invalid target, or two targets sharing a (host, port) pair.
pub fn validate_request(
    line: &str,
    targets: &[DeployTarget],
) -> Result<AuthorizedKey, DeployError> {
    if line.trim().is_empty() {
        return Err(DeployError::EmptyKeyLine);
    }
    let key = AuthorizedKey::parse(line).map_err(DeployError::InvalidKeyLine)?;

    if targets.is_empty() {
        return Err(DeployError::NoTargets);
    }

    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        target.validate()?;
        if !seen.insert(target.identity()) {
            return Err(DeployError::DuplicateTarget {
                host: target.host.clone(),
                port: target.port,
            });
        }
    }
    Ok(key)
}

async fn run_target(
    installer: &RemoteKeyInstaller,
    operation: Operation,
    endpoint: &Endpoint,
    key: &AuthorizedKey,
    probe_timeout: Duration,
) -> Result<(), TargetError> {
    installer.test_reachability(endpoint, probe_timeout).await?;
    match operation {
        Operation::Deploy => {
            installer.install_public_key(endpoint, key).await?;
        }
        Operation::Revoke => {
            installer.remove_public_key(endpoint, key).await?;
        }
    }
    Ok(())
}

fn join_error(err: JoinError) -> TargetError {
    if !err.is_panic() {
        return TargetError::Aborted("task was cancelled".to_string());
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    TargetError::TaskPanicked(message)
}

fn log_outcome(operation: Operation, outcome: &DeploymentOutcome) {
    if outcome.is_success() {
        info!(
            operation = %operation,
            target_id = %outcome.target_id(),
            host = %outcome.host(),
            port = outcome.port(),
            duration_ms = outcome.duration().as_millis() as u64,
            "target succeeded"
        );
    } else {
        warn!(
            operation = %operation,
            target_id = %outcome.target_id(),
            host = %outcome.host(),
            port = outcome.port(),
            error = outcome.error_message().unwrap_or_default(),
            "target failed"
        );
    }
}
