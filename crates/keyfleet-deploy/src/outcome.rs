// ABOUTME: Per-target deployment outcomes and the aggregated batch result.
// ABOUTME: Outcomes are terminal; batch counts are derived from them once, at construction.

use crate::error::TargetError;
use crate::target::DeployTarget;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failed,
}

/// A target that has been dispatched but has not finished.
///
/// Not `Clone`: each pending deployment is consumed exactly once by
/// [`PendingDeployment::complete`].
#[derive(Debug)]
pub struct PendingDeployment {
    target: DeployTarget,
}

impl PendingDeployment {
    pub fn new(target: DeployTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &DeployTarget {
        &self.target
    }

    pub fn complete<T>(
        self,
        result: Result<T, TargetError>,
        duration: Duration,
    ) -> DeploymentOutcome {
        let (status, error_message) = match result {
            Ok(_) => (DeploymentStatus::Success, None),
            Err(err) => (DeploymentStatus::Failed, Some(err.to_string())),
        };
        DeploymentOutcome {
            target_id: self.target.id,
            target_name: self.target.name,
            host: self.target.host,
            port: self.target.port,
            status,
            error_message,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Terminal result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentOutcome {
    target_id: String,
    target_name: String,
    host: String,
    port: u16,
    status: DeploymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    duration_ms: u64,
}

impl DeploymentOutcome {
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Outcomes in dispatch order plus counts derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentBatch {
    outcomes: Vec<DeploymentOutcome>,
    total: usize,
    success: usize,
    failed: usize,
}

impl DeploymentBatch {
    pub fn from_outcomes(outcomes: Vec<DeploymentOutcome>) -> Self {
        let success = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            total: outcomes.len(),
            failed: outcomes.len() - success,
            success,
            outcomes,
        }
    }

    pub fn outcomes(&self) -> &[DeploymentOutcome] {
        &self.outcomes
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn success(&self) -> usize {
        self.success
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// `"success/total"`, e.g. `"3/4"`.
    pub fn success_ratio(&self) -> String {
        format!("{}/{}", self.success, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BatchTimeoutError, DeadlineScope, ReachabilityError};

    fn target(id: &str) -> DeployTarget {
        DeployTarget::new(id, format!("name-{id}"), format!("{id}.example"), 22, "ops")
    }

    fn success(id: &str) -> DeploymentOutcome {
        PendingDeployment::new(target(id)).complete(Ok(()), Duration::from_millis(15))
    }

    fn failure(id: &str) -> DeploymentOutcome {
        let err: TargetError = ReachabilityError::Unreachable {
            endpoint: format!("ops@{id}.example:22"),
            detail: "Connection refused".to_string(),
        }
        .into();
        PendingDeployment::new(target(id)).complete::<()>(Err(err), Duration::from_millis(7))
    }

    #[test]
    fn test_complete_success() {
        let outcome = success("a");
        assert!(outcome.is_success());
        assert_eq!(outcome.target_id(), "a");
        assert_eq!(outcome.target_name(), "name-a");
        assert_eq!(outcome.error_message(), None);
        assert_eq!(outcome.duration(), Duration::from_millis(15));
    }

    #[test]
    fn test_complete_failure_keeps_detail() {
        let outcome = failure("b");
        assert_eq!(outcome.status(), DeploymentStatus::Failed);
        assert!(outcome
            .error_message()
            .unwrap()
            .contains("Connection refused"));
    }

    #[test]
    fn test_batch_counts_are_derived() {
        let batch = DeploymentBatch::from_outcomes(vec![success("a"), failure("b"), success("c")]);
        assert_eq!(batch.total(), 3);
        assert_eq!(batch.success(), 2);
        assert_eq!(batch.failed(), 1);
        assert_eq!(batch.total(), batch.success() + batch.failed());
        assert_eq!(batch.success_ratio(), "2/3");
    }

    #[test]
    fn test_outcome_json_shape() {
        let ok = serde_json::to_value(success("a")).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({
                "target_id": "a",
                "target_name": "name-a",
                "host": "a.example",
                "port": 22,
                "status": "success",
                "duration_ms": 15
            })
        );

        let timed_out = PendingDeployment::new(target("c")).complete::<()>(
            Err(BatchTimeoutError {
                scope: DeadlineScope::Batch,
                limit: Duration::from_secs(5),
            }
            .into()),
            Duration::from_secs(5),
        );
        let json = serde_json::to_value(timed_out).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_message"], "batch deadline of 5s exceeded");
    }

    #[test]
    fn test_batch_json_shape() {
        let batch = DeploymentBatch::from_outcomes(vec![success("a"), failure("b")]);
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["success"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["outcomes"].as_array().unwrap().len(), 2);
        assert_eq!(json["outcomes"][1]["target_id"], "b");
    }
}
