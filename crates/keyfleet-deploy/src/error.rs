// ABOUTME: Error types for remote key installation and batch deployment using thiserror.
// ABOUTME: Per-target failures stay inside outcomes; only DeployError escapes a deploy call.

use keyfleet_keys::FormatError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures of the command-execution transport itself.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport program could not be started.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish within its time limit.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// Reading the command's output failed.
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The reachability probe did not succeed.
#[derive(Error, Debug)]
pub enum ReachabilityError {
    #[error("connection to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("public key authentication to {endpoint} was rejected: {detail}")]
    AuthenticationFailed { endpoint: String, detail: String },

    #[error("{endpoint} is unreachable: {detail}")]
    Unreachable { endpoint: String, detail: String },

    #[error("unexpected probe response from {endpoint}: {output:?}")]
    UnexpectedResponse { endpoint: String, output: String },

    #[error("transport failed for {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },
}

/// The install or remove command did not complete as expected.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("permission denied on {endpoint}: {detail}")]
    PermissionDenied { endpoint: String, detail: String },

    #[error("remote command failed on {endpoint} (exit {code:?}): {detail}")]
    CommandFailed {
        endpoint: String,
        code: Option<i32>,
        detail: String,
    },

    /// The command exited cleanly without printing its confirmation marker.
    #[error("remote command on {endpoint} did not confirm: {output:?}")]
    ConfirmationMismatch { endpoint: String, output: String },

    #[error("transport failed for {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },
}

/// Which deadline a target ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineScope {
    Target,
    Batch,
}

impl fmt::Display for DeadlineScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineScope::Target => write!(f, "per-target"),
            DeadlineScope::Batch => write!(f, "batch"),
        }
    }
}

/// A target was still pending when a deadline expired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{scope} deadline of {limit:?} exceeded")]
pub struct BatchTimeoutError {
    pub scope: DeadlineScope,
    pub limit: Duration,
}

/// Everything that can fail a single target inside a batch.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("reachability check failed: {0}")]
    Reachability(#[from] ReachabilityError),

    #[error("key installation failed: {0}")]
    Install(#[from] InstallError),

    #[error("{0}")]
    Timeout(#[from] BatchTimeoutError),

    /// The target's task panicked before reporting.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// The target's task was cancelled before reporting.
    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Usage errors rejected before any remote command is issued.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("no public key to deploy")]
    EmptyKeyLine,

    #[error("public key line is invalid: {0}")]
    InvalidKeyLine(#[source] FormatError),

    #[error("no deploy targets given")]
    NoTargets,

    #[error("target {host}:{port} appears more than once")]
    DuplicateTarget { host: String, port: u16 },

    #[error("target {id:?} is invalid: {reason}")]
    InvalidTarget { id: String, reason: String },

    #[error("invalid deploy limits: {0}")]
    InvalidLimits(String),
}
