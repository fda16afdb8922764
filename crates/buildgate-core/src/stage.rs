//! Stage definitions and tool configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kinds of verification work a stage can perform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Compile the sources.
    Compile,

    /// Run the unit-test suite.
    Test,

    /// Style-rule analysis.
    StyleCheck,

    /// Bug-pattern analysis.
    BugCheck,

    /// Security-pattern analysis.
    SecurityCheck,

    /// Code-coverage measurement over the test run.
    Coverage,

    /// Mutation testing against the test suite.
    MutationTest,
}

impl StageKind {
    /// Get the kind name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Compile => "compile",
            StageKind::Test => "test",
            StageKind::StyleCheck => "style_check",
            StageKind::BugCheck => "bug_check",
            StageKind::SecurityCheck => "security_check",
            StageKind::Coverage => "coverage",
            StageKind::MutationTest => "mutation_test",
        }
    }

    /// Format of the report artifact this kind emits.
    pub fn report_format(&self) -> ReportFormat {
        match self {
            StageKind::Compile => ReportFormat::Text,
            StageKind::Test => ReportFormat::Xml,
            StageKind::StyleCheck
            | StageKind::BugCheck
            | StageKind::SecurityCheck
            | StageKind::Coverage
            | StageKind::MutationTest => ReportFormat::Html,
        }
    }

    /// Default external tool backing this kind.
    pub fn default_tool(&self) -> ToolConfig {
        match self {
            StageKind::Compile => ToolConfig::new("javac", ["./gradlew", "compileJava"], 300),
            StageKind::Test => ToolConfig::new("junit", ["./gradlew", "test"], 1200),
            StageKind::StyleCheck => {
                ToolConfig::new("checkstyle", ["./gradlew", "checkstyleMain"], 600)
            }
            StageKind::BugCheck => {
                ToolConfig::new("spotbugs", ["./gradlew", "spotbugsMain"], 600)
                    .with_version("6.0.25")
            }
            StageKind::SecurityCheck => {
                ToolConfig::new("find-sec-bugs", ["./gradlew", "spotbugsMain", "-PsecurityAudit"], 600)
            }
            StageKind::Coverage => {
                ToolConfig::new("jacoco", ["./gradlew", "jacocoTestReport"], 600)
            }
            StageKind::MutationTest => ToolConfig::new("pitest", ["./gradlew", "pitest"], 3600),
        }
    }
}

/// Report artifact formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Html,
    Xml,
    Json,
    Text,
}

impl ReportFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Xml => "xml",
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
        }
    }
}

/// Configuration for the external tool a stage delegates to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolConfig {
    /// Tool identifier, e.g. `"checkstyle"`.
    pub tool_id: String,

    /// Optional pinned tool version.
    pub version: Option<String>,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Target selectors passed to the tool, e.g. class-name globs.
    pub target_patterns: Vec<String>,

    /// Timeout in seconds. Zero disables the timeout.
    pub timeout_secs: u64,
}

impl ToolConfig {
    /// Create a tool configuration.
    pub fn new<I, S>(tool_id: impl Into<String>, command: I, timeout_secs: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool_id: tool_id.into(),
            version: None,
            command: command.into_iter().map(Into::into).collect(),
            target_patterns: Vec::new(),
            timeout_secs,
        }
    }

    /// Pin a tool version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Restrict the tool to the given target selectors.
    pub fn with_targets<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Definition of one stage in the verification graph.
///
/// Declaration order is significant: when several stages are ready at the
/// same time, the scheduler breaks the tie by declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// Unique stage id.
    pub id: String,

    /// What kind of work this stage performs.
    pub kind: StageKind,

    /// External tool backing the stage.
    pub tool: ToolConfig,

    /// Hard prerequisites: a failure in any of these blocks this stage.
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Ordering-only upstreams: this stage runs once each of them reaches a
    /// terminal outcome, whatever that outcome is.
    #[serde(default)]
    pub always_after: Vec<String>,

    /// When true, a failure here neither blocks dependents nor fails the
    /// overall verdict.
    #[serde(default)]
    pub ignore_failures: bool,

    /// Whether this stage participates in the run at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl StageSpec {
    /// Create a stage backed by the kind's default tool, with the kind name
    /// as its id.
    pub fn builtin(kind: StageKind) -> Self {
        Self {
            id: kind.name().to_string(),
            kind,
            tool: kind.default_tool(),
            prerequisites: Vec::new(),
            always_after: Vec::new(),
            ignore_failures: false,
            enabled: true,
        }
    }

    /// Create a stage with an explicit id and tool.
    pub fn custom(id: impl Into<String>, kind: StageKind, tool: ToolConfig) -> Self {
        Self {
            id: id.into(),
            kind,
            tool,
            prerequisites: Vec::new(),
            always_after: Vec::new(),
            ignore_failures: false,
            enabled: true,
        }
    }

    /// Add a hard prerequisite.
    pub fn requires(mut self, stage_id: impl Into<String>) -> Self {
        self.prerequisites.push(stage_id.into());
        self
    }

    /// Add an ordering-only upstream.
    pub fn follows(mut self, stage_id: impl Into<String>) -> Self {
        self.always_after.push(stage_id.into());
        self
    }

    /// Tolerate failures in this stage.
    pub fn tolerated(mut self) -> Self {
        self.ignore_failures = true;
        self
    }

    /// Disable this stage.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Deterministic location of this stage's report artifact.
    ///
    /// Computable before the stage runs, which is what lets a skipped stage
    /// guarantee it produced nothing.
    pub fn report_path(&self, report_dir: &Path) -> PathBuf {
        report_dir
            .join(&self.id)
            .join(format!("{}.{}", self.id, self.kind.report_format().extension()))
    }
}
