//! External analyzer invocation.
//!
//! Every stage delegates its actual work to an external tool through the
//! narrow [`ToolInvoker`] contract. The production implementation spawns the
//! configured command; tests substitute a scripted fake.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::VerifierConfig;
use crate::stage::StageSpec;

/// Captured output of one tool invocation.
#[derive(Debug, Clone)]
pub struct InvocationOutput {
    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Whether the process exited successfully.
    pub success: bool,
}

impl InvocationOutput {
    /// Whether the invocation passed.
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// The external-tool seam: `invoke(tool, config) -> output`.
///
/// Errors returned here mean the tool could not be run at all (spawn
/// failure, timeout); the runner records them as a failed stage, it never
/// lets them escape the stage boundary.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        stage: &StageSpec,
        config: &VerifierConfig,
    ) -> anyhow::Result<InvocationOutput>;
}

/// Invoker that spawns the stage's configured command as a child process.
pub struct ProcessInvoker;

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    async fn invoke(
        &self,
        stage: &StageSpec,
        config: &VerifierConfig,
    ) -> anyhow::Result<InvocationOutput> {
        let tool = &stage.tool;
        if tool.command.is_empty() {
            anyhow::bail!("stage {} has empty command", stage.id);
        }

        let exe = &tool.command[0];
        let args = &tool.command[1..];

        let mut command = Command::new(exe);
        command
            .args(args)
            .args(&tool.target_patterns)
            .current_dir(&config.workspace)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(heap) = &config.max_heap {
            command.env("BUILDGATE_TOOL_MAX_HEAP", heap);
        }
        if stage.kind == crate::stage::StageKind::MutationTest {
            // The mutation tester's internal worker pool is bounded by
            // configuration; this never affects the runner's own contract.
            command.arg(format!("-Pmutation.threads={}", config.mutation_threads));
        }

        let child = command.spawn()?;

        let output = if tool.timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(tool.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "stage {} timed out after {} seconds",
                    stage.id,
                    tool.timeout_secs
                )
            })??
        } else {
            child.wait_with_output().await?
        };

        Ok(InvocationOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageKind, ToolConfig};

    fn config() -> VerifierConfig {
        VerifierConfig::for_workspace(".")
    }

    #[test]
    fn test_invocation_output_passed() {
        let output = InvocationOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            success: true,
        };
        assert!(output.passed());
    }

    #[test]
    fn test_invocation_output_failed() {
        let output = InvocationOutput {
            exit_code: 2,
            stdout: String::new(),
            stderr: "analyzer found violations".to_string(),
            success: false,
        };
        assert!(!output.passed());
    }

    #[tokio::test]
    async fn test_invoke_simple_command() {
        let stage = StageSpec::custom(
            "echo_stage",
            StageKind::Compile,
            ToolConfig::new("echo", ["echo", "hello"], 60),
        );
        let output = ProcessInvoker
            .invoke(&stage, &config())
            .await
            .expect("invoke failed");
        assert!(output.passed());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_invoke_failing_command() {
        let stage = StageSpec::custom(
            "false_stage",
            StageKind::Test,
            ToolConfig::new("false", ["false"], 60),
        );
        let output = ProcessInvoker
            .invoke(&stage, &config())
            .await
            .expect("invoke failed");
        assert!(!output.passed());
        assert_ne!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_invoke_rejects_empty_command() {
        let stage = StageSpec::custom(
            "empty",
            StageKind::Test,
            ToolConfig::new("noop", Vec::<String>::new(), 60),
        );
        assert!(ProcessInvoker.invoke(&stage, &config()).await.is_err());
    }

    #[tokio::test]
    async fn test_invoke_missing_executable_errors() {
        let stage = StageSpec::custom(
            "ghost",
            StageKind::Test,
            ToolConfig::new("ghost", ["definitely-not-a-real-binary-xyz"], 60),
        );
        assert!(ProcessInvoker.invoke(&stage, &config()).await.is_err());
    }

    #[tokio::test]
    async fn test_mutation_stage_is_thread_bounded() {
        let stage = StageSpec::custom(
            "mutation_test",
            StageKind::MutationTest,
            ToolConfig::new("pitest", ["echo"], 60),
        );
        let output = ProcessInvoker
            .invoke(&stage, &config())
            .await
            .expect("invoke failed");
        assert!(output.stdout.contains("-Pmutation.threads=4"));
    }

    #[tokio::test]
    async fn test_target_patterns_are_forwarded_as_args() {
        let stage = StageSpec::custom(
            "targeted",
            StageKind::StyleCheck,
            ToolConfig::new("echo", ["echo"], 60).with_targets(["com.foo.*", "com.bar.Baz"]),
        );
        let output = ProcessInvoker
            .invoke(&stage, &config())
            .await
            .expect("invoke failed");
        assert!(output.stdout.contains("com.foo.*"));
        assert!(output.stdout.contains("com.bar.Baz"));
    }
}
