//! buildgate-core - dependency-ordered build verification
//!
//! Provides the verification pipeline core:
//! - A validated stage graph with prerequisite and always-after edges
//! - A runner that executes stages topologically, skipping work blocked by
//!   failed prerequisites while still honoring ordering-only follow-ups
//! - Verdict aggregation into one overall pass/fail result

pub mod config;
pub mod error;
pub mod fakes;
pub mod graph;
pub mod invoke;
pub mod pipeline;
pub mod report;
pub mod stage;
pub mod telemetry;
pub mod verdict;

// Re-export key types
pub use config::{default_pipeline, AnalyzerEffort, PipelineSpec, ReportConfidence, VerifierConfig};
pub use error::{GraphError, GraphResult};
pub use graph::TaskGraph;
pub use invoke::{InvocationOutput, ProcessInvoker, ToolInvoker};
pub use pipeline::{PipelineRun, PipelineRunner, StageOutcome, StageResult};
pub use report::{FsReportSink, ReportSink};
pub use stage::{ReportFormat, StageKind, StageSpec, ToolConfig};
pub use telemetry::init_tracing;
pub use verdict::Verdict;
