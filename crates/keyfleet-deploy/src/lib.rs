// ABOUTME: Fleet-wide public key deployment for keyfleet.
// ABOUTME: Remote authorized_keys install/remove over a pluggable shell, fanned out with bounded concurrency.

pub mod config;
pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod outcome;
pub mod script;
pub mod target;
pub mod transport;

pub use config::{DeployConfig, DeployLimits};
pub use error::{
    BatchTimeoutError, DeadlineScope, DeployError, InstallError, ReachabilityError, TargetError,
    TransportError,
};
pub use installer::{InstallStatus, RemoteKeyInstaller, RemovalStatus};
pub use orchestrator::{validate_request, Deployer};
pub use outcome::{DeploymentBatch, DeploymentOutcome, DeploymentStatus, PendingDeployment};
pub use target::{DeployTarget, TargetList};
pub use transport::{CommandOutput, Endpoint, LocalShell, OpenSshTransport, RemoteShell};
