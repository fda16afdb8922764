//! Overall run verdict aggregation.

use serde::{Deserialize, Serialize};

use crate::graph::TaskGraph;
use crate::pipeline::{PipelineRun, StageOutcome};

/// Aggregate pass/fail result of one pipeline run.
///
/// This is the primary user-visible output: the overall outcome plus the
/// stage ids behind it. Tool diagnostics stay in each stage's own report
/// artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the run succeeded overall.
    pub succeeded: bool,

    /// Non-ignorable stages that failed.
    pub failed: Vec<String>,

    /// Non-ignorable stages skipped because a failed prerequisite blocked
    /// them. A blocked stage counts against the run: required work never
    /// happened.
    pub blocked: Vec<String>,

    /// Stages that failed but were declared failure-tolerant.
    pub ignored: Vec<String>,

    /// Summary message.
    pub message: String,
}

impl Verdict {
    /// Evaluate a sealed run against its graph.
    ///
    /// The run succeeds iff no stage with `ignore_failures = false` is
    /// `Failed` or `Skipped`-because-blocked.
    pub fn evaluate(run: &PipelineRun, graph: &TaskGraph) -> Self {
        let mut failed = Vec::new();
        let mut blocked = Vec::new();
        let mut ignored = Vec::new();

        for result in run.results() {
            let tolerant = graph
                .stage(&result.stage_id)
                .map(|s| s.ignore_failures)
                .unwrap_or(false);
            match result.outcome {
                StageOutcome::Failed if tolerant => ignored.push(result.stage_id.clone()),
                StageOutcome::Failed => failed.push(result.stage_id.clone()),
                StageOutcome::Skipped if !tolerant => blocked.push(result.stage_id.clone()),
                _ => {}
            }
        }

        let succeeded = failed.is_empty() && blocked.is_empty();
        let message = if succeeded {
            "all stages passed".to_string()
        } else {
            format!(
                "verification failed: {} stage(s) failed, {} blocked",
                failed.len(),
                blocked.len()
            )
        };

        Self {
            succeeded,
            failed,
            blocked,
            ignored,
            message,
        }
    }
}
