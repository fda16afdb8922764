//! Pipeline execution over a validated stage graph.
//!
//! The runner walks the graph wave by wave in topological order. Stages in
//! one wave have no path between them, so they execute concurrently; their
//! results are appended in declaration order, which keeps runs reproducible.
//!
//! Stage work failures are captured into results and never escape the stage
//! boundary. The only fatal errors past construction are report-sink I/O
//! failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::VerifierConfig;
use crate::graph::TaskGraph;
use crate::invoke::{InvocationOutput, ToolInvoker};
use crate::report::ReportSink;
use crate::stage::StageSpec;

/// Terminal outcome of one stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Passed,
    Failed,
    Skipped,
}

/// Result of one stage in one pipeline run. Created exactly once per stage,
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage id.
    pub stage_id: String,

    /// Terminal outcome.
    pub outcome: StageOutcome,

    /// Where the report artifact was written. `None` for skipped stages,
    /// which produce no artifact.
    pub report_path: Option<PathBuf>,

    /// Wall-clock duration in milliseconds. Zero for skipped stages.
    pub duration_ms: u64,

    /// Failure or skip detail, when there is one.
    pub detail: Option<String>,
}

impl StageResult {
    /// Whether this stage passed.
    pub fn passed(&self) -> bool {
        self.outcome == StageOutcome::Passed
    }

    /// Whether this stage was skipped.
    pub fn skipped(&self) -> bool {
        self.outcome == StageOutcome::Skipped
    }

    fn skipped_because(stage_id: &str, blocker: &str) -> Self {
        Self {
            stage_id: stage_id.to_string(),
            outcome: StageOutcome::Skipped,
            report_path: None,
            duration_ms: 0,
            detail: Some(format!("blocked by prerequisite '{blocker}'")),
        }
    }
}

/// One sealed pipeline execution: every stage's result plus run identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run id.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Deterministic digest of the ordered stage ids.
    pub stages_digest: String,

    /// Per-stage results in execution order.
    results: Vec<StageResult>,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineRun {
    /// Seal a run. Only the runner (and crate-internal tests) build these.
    pub(crate) fn sealed(
        run_id: String,
        started_at: DateTime<Utc>,
        stages_digest: String,
        results: Vec<StageResult>,
        duration_ms: u64,
    ) -> Self {
        Self {
            run_id,
            started_at,
            stages_digest,
            results,
            duration_ms,
        }
    }

    /// All stage results in execution order.
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// Result of a specific stage, if it participated in the run.
    pub fn result_for(&self, stage_id: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage_id == stage_id)
    }

    /// Number of stages that passed.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == StageOutcome::Failed)
            .count()
    }

    /// Number of stages skipped because an upstream blocked them.
    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.skipped()).count()
    }
}

/// Executes a validated [`TaskGraph`], producing one [`PipelineRun`].
///
/// A runner exclusively owns the run being built; it is not shared across
/// concurrent runs of the same graph.
pub struct PipelineRunner {
    invoker: Arc<dyn ToolInvoker>,
    sink: Arc<dyn ReportSink>,
    config: VerifierConfig,
}

/// Per-stage scheduling decision within a wave.
enum Decision<'a> {
    Run(&'a StageSpec),
    Skip(&'a StageSpec, String),
}

impl PipelineRunner {
    /// Create a runner over the given collaborators and configuration.
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        sink: Arc<dyn ReportSink>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            invoker,
            sink,
            config,
        }
    }

    /// Execute every stage of `graph` to a terminal outcome.
    ///
    /// Returns the sealed run. Errors only on report-sink I/O failure; stage
    /// work failures are recorded in the run instead.
    pub async fn run(&self, graph: &TaskGraph) -> anyhow::Result<PipelineRun> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        let stage_ids: Vec<&str> = graph
            .stages()
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.id.as_str())
            .collect();
        let stages_digest = compute_stages_digest(&stage_ids);

        info!(run_id = %run_id, stages = stage_ids.len(), "starting pipeline");

        let mut results: Vec<StageResult> = Vec::with_capacity(graph.len());

        for wave in graph.waves() {
            let decisions: Vec<Decision<'_>> = wave
                .iter()
                .copied()
                .filter(|stage| stage.enabled)
                .map(|stage| match self.find_blocker(graph, stage, &results) {
                    Some(blocker) => Decision::Skip(stage, blocker),
                    None => Decision::Run(stage),
                })
                .collect();

            // Execute the runnable subset of the wave concurrently; stages
            // in one wave have no path between them.
            let executions = decisions.iter().filter_map(|d| match d {
                Decision::Run(stage) => Some(self.execute_stage(stage)),
                Decision::Skip(..) => None,
            });
            let mut executed = futures::future::join_all(executions)
                .await
                .into_iter()
                .collect::<anyhow::Result<Vec<StageResult>>>()?
                .into_iter();

            // Append results in declaration order regardless of which stage
            // finished first.
            for decision in decisions {
                match decision {
                    Decision::Run(_) => {
                        let result = executed.next().expect("one result per executed stage");
                        results.push(result);
                    }
                    Decision::Skip(stage, blocker) => {
                        warn!(stage = %stage.id, blocker = %blocker, "skipping blocked stage");
                        results.push(StageResult::skipped_because(&stage.id, &blocker));
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(run_id = %run_id, duration_ms, "pipeline sealed");

        Ok(PipelineRun::sealed(
            run_id,
            started_at,
            stages_digest,
            results,
            duration_ms,
        ))
    }

    /// First hard prerequisite that blocks `stage`, if any.
    ///
    /// A prerequisite blocks when it failed without `ignore_failures`, or
    /// when it was itself skipped — a stage must not run on top of work that
    /// never happened, so skips cascade. Always-after upstreams never block.
    fn find_blocker(
        &self,
        graph: &TaskGraph,
        stage: &StageSpec,
        results: &[StageResult],
    ) -> Option<String> {
        for prereq in graph.hard_prerequisites_of(&stage.id) {
            let Some(result) = results.iter().find(|r| r.stage_id == prereq.id) else {
                // Disabled prerequisites produce no result and do not gate.
                continue;
            };
            match result.outcome {
                StageOutcome::Failed if !prereq.ignore_failures => return Some(prereq.id.clone()),
                StageOutcome::Skipped => return Some(prereq.id.clone()),
                _ => {}
            }
        }
        None
    }

    /// Run one stage's tool and write its report artifact.
    ///
    /// Tool failures (non-zero exit, spawn error, timeout) become a `Failed`
    /// result. Only the report write can error out of here.
    async fn execute_stage(&self, stage: &StageSpec) -> anyhow::Result<StageResult> {
        let stage_start = Instant::now();
        let report_path = stage.report_path(&self.config.report_dir);

        info!(stage = %stage.id, tool = %stage.tool.tool_id, "executing stage");

        let (outcome, detail, report) = match self.invoker.invoke(stage, &self.config).await {
            Ok(output) => {
                let outcome = if output.passed() {
                    StageOutcome::Passed
                } else {
                    StageOutcome::Failed
                };
                let detail = (!output.passed())
                    .then(|| format!("tool '{}' exited with code {}", stage.tool.tool_id, output.exit_code));
                let report = render_report(stage, &output);
                (outcome, detail, report)
            }
            Err(e) => {
                warn!(stage = %stage.id, error = %e, "stage execution error");
                let report = format!(
                    "stage: {}\ntool: {}\nexecution error: {}\n",
                    stage.id, stage.tool.tool_id, e
                );
                (StageOutcome::Failed, Some(e.to_string()), report)
            }
        };

        self.sink
            .write(
                &stage.id,
                stage.kind.report_format(),
                &report_path,
                report.as_bytes(),
            )
            .await?;

        Ok(StageResult {
            stage_id: stage.id.clone(),
            outcome,
            report_path: Some(report_path),
            duration_ms: stage_start.elapsed().as_millis() as u64,
            detail,
        })
    }
}

/// Render the report artifact body for an executed stage.
fn render_report(stage: &StageSpec, output: &InvocationOutput) -> String {
    format!(
        "stage: {}\ntool: {}{}\nexit code: {}\n\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
        stage.id,
        stage.tool.tool_id,
        stage
            .tool
            .version
            .as_deref()
            .map(|v| format!(" {v}"))
            .unwrap_or_default(),
        output.exit_code,
        output.stdout,
        output.stderr,
    )
}

/// Deterministic digest of ordered stage ids.
fn compute_stages_digest(stage_ids: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for id in stage_ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
