//! Sparse mapping stage.
//!
//! Idempotency policy: existing sparse model directories mean a previous
//! run already computed (or partially computed) this stage, so the
//! incremental mapper is skipped entirely and the registry is rebuilt from
//! disk in lexicographic directory order. Existing output is trusted as
//! complete; no partial-output detection is performed.

use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use crate::workspace::CheckpointMarker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) async fn run(
    ctx: &PipelineContext,
    cancel: &CancellationToken,
) -> Result<(), StageError> {
    let sparse_root = ctx.workspace.sparse_root();

    let existing = ctx.workspace.list_sparse_model_dirs()?;
    if !existing.is_empty() {
        warn!(
            models = existing.len(),
            "skipping sparse reconstruction because it is already computed"
        );
        if CheckpointMarker::read(&sparse_root).is_none() {
            debug!("sparse output has no checkpoint marker; trusting it anyway");
        }
        for dir in &existing {
            let reconstruction = ctx
                .collaborators
                .mapper
                .load(dir)
                .await
                .map_err(StageError::SparseMapping)?;
            ctx.registry.push(reconstruction);
        }
        return Ok(());
    }

    info!("running incremental sparse reconstruction");
    ctx.collaborators
        .mapper
        .run(
            &ctx.options.mapper,
            &ctx.config.image_path,
            &ctx.workspace.database_path(),
            &ctx.registry,
            cancel,
        )
        .await
        .map_err(StageError::SparseMapping)?;

    // Persist whatever was produced, even after a stop request; resume
    // picks these directories up on the next run.
    std::fs::create_dir_all(&sparse_root)?;
    for index in 0..ctx.registry.len() {
        let dir = ctx.workspace.sparse_model_dir(index);
        ctx.collaborators
            .mapper
            .persist(index, &dir)
            .await
            .map_err(StageError::SparseMapping)?;
        debug!(index, dir = %dir.display(), "persisted sparse reconstruction");
    }

    let snapshot = serde_json::to_string_pretty(&ctx.config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(ctx.workspace.project_snapshot_path(), snapshot)?;

    if !cancel.is_cancelled() {
        CheckpointMarker::new("sparse").write(&sparse_root)?;
    }

    info!(models = ctx.registry.len(), "sparse mapping finished");
    Ok(())
}
