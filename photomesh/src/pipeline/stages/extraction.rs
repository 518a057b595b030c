//! Feature extraction stage.

use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs the feature extraction collaborator against the workspace
/// database. The collaborator owns its own parallelism and idempotency;
/// this stage only wires paths, options and the cancellation token.
pub(crate) async fn run(
    ctx: &PipelineContext,
    cancel: &CancellationToken,
) -> Result<(), StageError> {
    let database_path = ctx.workspace.database_path();
    info!(
        images = %ctx.options.extraction.image_path.display(),
        database = %database_path.display(),
        "extracting features"
    );

    ctx.collaborators
        .extractor
        .extract(&database_path, &ctx.options.extraction, cancel)
        .await
        .map_err(StageError::Extraction)
}
