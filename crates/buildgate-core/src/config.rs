//! Verifier configuration and pipeline definitions.
//!
//! The original build expressed analyzer settings as process-wide plugin
//! blocks loaded once at startup. Here they are one immutable struct, built
//! at the entry point and passed explicitly to whatever needs it.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::stage::{StageKind, StageSpec};

/// How hard the bug-pattern analyzer should work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerEffort {
    Min,
    Default,
    Max,
}

/// Minimum confidence an analyzer finding needs to be reported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportConfidence {
    Low,
    Default,
    High,
}

/// Immutable, process-wide verifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Root of the project under verification.
    pub workspace: PathBuf,

    /// Directory report artifacts are written under.
    pub report_dir: PathBuf,

    /// Heap ceiling handed to heavyweight analyzers, e.g. `"1g"`.
    pub max_heap: Option<String>,

    /// Analyzer effort knob.
    pub analyzer_effort: AnalyzerEffort,

    /// Analyzer confidence knob.
    pub report_confidence: ReportConfidence,

    /// Worker threads the mutation-testing stage may use internally.
    pub mutation_threads: usize,
}

impl VerifierConfig {
    /// Configuration rooted at `workspace` with the stock defaults.
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        let report_dir = workspace.join("build").join("reports");
        Self {
            workspace,
            report_dir,
            max_heap: Some("1g".to_string()),
            analyzer_effort: AnalyzerEffort::Default,
            report_confidence: ReportConfidence::Default,
            mutation_threads: 4,
        }
    }

    /// Override the report directory.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }
}

/// On-disk pipeline definition: an ordered list of stage specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    /// Load a pipeline definition from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline spec {}", path.display()))?;
        let spec: PipelineSpec = serde_json::from_str(&raw)
            .with_context(|| format!("invalid pipeline spec {}", path.display()))?;
        Ok(spec)
    }
}

/// The builtin full-verification pipeline.
///
/// Compilation gates everything. Style, bug and security analysis run off
/// the compiled classes, independent of the test suite. Coverage is
/// ordering-only after tests so a report exists even for a red build;
/// mutation testing hard-requires a green suite, since mutants measured
/// against failing tests mean nothing.
pub fn default_pipeline() -> Vec<StageSpec> {
    vec![
        StageSpec::builtin(StageKind::Compile),
        StageSpec::builtin(StageKind::StyleCheck).requires("compile"),
        StageSpec::builtin(StageKind::BugCheck).requires("compile"),
        StageSpec::builtin(StageKind::SecurityCheck).requires("compile"),
        StageSpec::builtin(StageKind::Test).requires("compile"),
        StageSpec::builtin(StageKind::Coverage).follows("test"),
        StageSpec::builtin(StageKind::MutationTest).requires("test"),
    ]
}
