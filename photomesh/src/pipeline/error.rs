//! Error types for the reconstruction pipeline.
//!
//! Cancellation is deliberately absent from this taxonomy: a stage that
//! observes a stop request returns cleanly with a stopped outcome, and
//! on-disk state is left exactly as far as the run progressed. Missing
//! build capabilities are also not errors; the dense stage warns and
//! ends early instead.

use thiserror::Error;

/// Failure inside an external collaborator.
#[derive(Debug, Error)]
pub enum CollabError {
    /// The collaborator process exited unsuccessfully.
    #[error("collaborator failed: {0}")]
    Process(String),

    /// Reconstruction output on disk could not be interpreted.
    #[error("invalid reconstruction data: {0}")]
    InvalidModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of one pipeline stage, attributed to the stage that raised it.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("feature extraction failed: {0}")]
    Extraction(#[source] CollabError),

    #[error("feature matching failed: {0}")]
    Matching(#[source] CollabError),

    #[error("sparse mapping failed: {0}")]
    SparseMapping(#[source] CollabError),

    #[error("dense mapping failed: {0}")]
    DenseMapping(#[source] CollabError),

    /// Workspace bookkeeping failed (directory creation, snapshots).
    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A collaborator required by the configuration was not wired in.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

/// Terminal failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),
}
