//! Error types for graph construction and pipeline execution.

use thiserror::Error;

/// Errors raised while validating a stage graph.
///
/// These are construction-time failures: a graph that produces one of these
/// never ran anything, so they abort before the first stage executes.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The ordering relation contains a cycle.
    #[error("dependency cycle detected involving stages: {stages:?}")]
    CycleDetected { stages: Vec<String> },

    /// An edge references a stage id that was never declared.
    #[error("stage '{referenced_by}' references unknown stage: {stage}")]
    UnknownStage {
        stage: String,
        referenced_by: String,
    },

    /// Two stage declarations share the same id.
    #[error("duplicate stage id: {stage}")]
    DuplicateStage { stage: String },
}

/// Convenience result alias.
pub type GraphResult<T> = std::result::Result<T, GraphError>;
