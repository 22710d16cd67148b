// ABOUTME: Renders deployment batches for the terminal or as JSON.
// ABOUTME: One line per target in dispatch order, then a success/total summary.

use anyhow::{Context, Result};
use keyfleet_deploy::{DeploymentBatch, DeploymentStatus};
use std::fmt::Write;

/// Human-readable report, one line per target.
pub fn render_batch(batch: &DeploymentBatch) -> String {
    let mut out = String::new();
    for outcome in batch.outcomes() {
        let marker = match outcome.status() {
            DeploymentStatus::Success => "ok",
            DeploymentStatus::Failed => "FAILED",
        };
        let _ = write!(
            out,
            "{marker:<6} {} ({}) {}:{} in {}ms",
            outcome.target_id(),
            outcome.target_name(),
            outcome.host(),
            outcome.port(),
            outcome.duration().as_millis()
        );
        if let Some(error) = outcome.error_message() {
            let _ = write!(out, ": {error}");
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{} targets succeeded", batch.success_ratio());
    out
}

/// Pretty-printed JSON of the whole batch.
pub fn render_json(batch: &DeploymentBatch) -> Result<String> {
    serde_json::to_string_pretty(batch).context("Failed to serialize deployment batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfleet_deploy::{DeployTarget, PendingDeployment, TargetError};
    use std::time::Duration;

    fn sample_batch() -> DeploymentBatch {
        let ok = PendingDeployment::new(DeployTarget::new("web-1", "Web", "10.0.0.1", 22, "ops"))
            .complete::<()>(Ok(()), Duration::from_millis(120));
        let failed =
            PendingDeployment::new(DeployTarget::new("db-1", "Database", "10.0.0.2", 2222, "ops"))
                .complete::<()>(
                    Err(TargetError::TaskPanicked("boom".to_string())),
                    Duration::from_millis(5),
                );
        DeploymentBatch::from_outcomes(vec![ok, failed])
    }

    #[test]
    fn test_render_batch_lines() {
        let text = render_batch(&sample_batch());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ok     web-1 (Web) 10.0.0.1:22 in 120ms",
                "FAILED db-1 (Database) 10.0.0.2:2222 in 5ms: task panicked: boom",
                "1/2 targets succeeded",
            ]
        );
    }

    #[test]
    fn test_render_json_shape() {
        let json = render_json(&sample_batch()).expect("should serialize");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["success"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["outcomes"][0]["target_id"], "web-1");
        assert_eq!(value["outcomes"][1]["status"], "failed");
    }
}
