//! In-memory fakes for the invoker and sink traits (testing only)
//!
//! Provides `ScriptedInvoker` and `MemoryReportSink` that satisfy the trait
//! contracts without spawning processes or touching the filesystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::VerifierConfig;
use crate::invoke::{InvocationOutput, ToolInvoker};
use crate::report::ReportSink;
use crate::stage::{ReportFormat, StageSpec};

// ---------------------------------------------------------------------------
// ScriptedInvoker
// ---------------------------------------------------------------------------

/// What a scripted stage should do when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Pass,
    Fail,
    Error,
}

/// Invoker whose per-stage outcomes are scripted up front.
///
/// Stages without a script pass. Every invocation is logged so tests can
/// assert which stages actually ran.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    scripts: HashMap<String, Script>,
    invoked: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `stage_id` to exit non-zero.
    pub fn failing(mut self, stage_id: impl Into<String>) -> Self {
        self.scripts.insert(stage_id.into(), Script::Fail);
        self
    }

    /// Script `stage_id` to error before producing any output, as a spawn
    /// failure or timeout would.
    pub fn erroring(mut self, stage_id: impl Into<String>) -> Self {
        self.scripts.insert(stage_id.into(), Script::Error);
        self
    }

    /// Ids of the stages that were invoked, in invocation order.
    pub fn invoked(&self) -> Vec<String> {
        self.invoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        stage: &StageSpec,
        _config: &VerifierConfig,
    ) -> anyhow::Result<InvocationOutput> {
        self.invoked.lock().unwrap().push(stage.id.clone());

        match self.scripts.get(&stage.id).copied().unwrap_or(Script::Pass) {
            Script::Pass => Ok(InvocationOutput {
                exit_code: 0,
                stdout: format!("{} ok\n", stage.tool.tool_id),
                stderr: String::new(),
                success: true,
            }),
            Script::Fail => Ok(InvocationOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("{} reported violations\n", stage.tool.tool_id),
                success: false,
            }),
            Script::Error => anyhow::bail!("scripted execution error for stage {}", stage.id),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryReportSink
// ---------------------------------------------------------------------------

/// One recorded report write.
#[derive(Debug, Clone)]
pub struct RecordedReport {
    pub stage_id: String,
    pub format: ReportFormat,
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Sink that records every write in memory.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    writes: Mutex<Vec<RecordedReport>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded writes, in write order.
    pub fn writes(&self) -> Vec<RecordedReport> {
        self.writes.lock().unwrap().clone()
    }

    /// Recorded writes for one stage.
    pub fn writes_for(&self, stage_id: &str) -> Vec<RecordedReport> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.stage_id == stage_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn write(
        &self,
        stage_id: &str,
        format: ReportFormat,
        path: &std::path::Path,
        contents: &[u8],
    ) -> anyhow::Result<()> {
        self.writes.lock().unwrap().push(RecordedReport {
            stage_id: stage_id.to_string(),
            format,
            path: path.to_path_buf(),
            contents: contents.to_vec(),
        });
        Ok(())
    }
}

/// Sink whose writes always fail, for exercising fatal report-I/O paths.
#[derive(Debug, Default)]
pub struct FailingReportSink;

#[async_trait]
impl ReportSink for FailingReportSink {
    async fn write(
        &self,
        stage_id: &str,
        _format: ReportFormat,
        _path: &std::path::Path,
        _contents: &[u8],
    ) -> anyhow::Result<()> {
        anyhow::bail!("report sink unavailable for stage {}", stage_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageKind, ToolConfig};

    fn stage(id: &str) -> StageSpec {
        StageSpec::custom(id, StageKind::Test, ToolConfig::new("noop", ["true"], 60))
    }

    #[tokio::test]
    async fn test_scripted_invoker_defaults_to_pass() {
        let invoker = ScriptedInvoker::new();
        let output = invoker
            .invoke(&stage("compile"), &VerifierConfig::for_workspace("."))
            .await
            .unwrap();
        assert!(output.passed());
        assert_eq!(invoker.invoked(), vec!["compile".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_invoker_failure_and_error() {
        let invoker = ScriptedInvoker::new().failing("test").erroring("coverage");
        let config = VerifierConfig::for_workspace(".");

        let failed = invoker.invoke(&stage("test"), &config).await.unwrap();
        assert!(!failed.passed());

        assert!(invoker.invoke(&stage("coverage"), &config).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_sink_records_writes() {
        let sink = MemoryReportSink::new();
        sink.write(
            "compile",
            ReportFormat::Text,
            std::path::Path::new("reports/compile/compile.txt"),
            b"ok",
        )
        .await
        .unwrap();

        let writes = sink.writes_for("compile");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].contents, b"ok");
    }
}
