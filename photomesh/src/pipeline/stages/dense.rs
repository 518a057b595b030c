//! Dense mapping stage.
//!
//! Processes each registry reconstruction independently and in order
//! through undistortion, patch-match stereo, fusion and meshing. This is
//! the latency-dominant stage, so the cancellation token is checked
//! between every sub-step and between reconstruction indices; a positive
//! check aborts the whole stage, not just the current reconstruction.
//!
//! Resume granularity is whole-reconstruction: when both the fused point
//! cloud and the configured mesh file already exist, the reconstruction is
//! skipped without invoking any collaborator.
//!
//! Missing build capabilities (GPU stereo, Delaunay geometry) terminate
//! the stage early with a warning instead of failing: every later
//! reconstruction shares the same constraint, so continuing would only
//! repeat the discovery.

use crate::config::MesherKind;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use crate::pipeline::stages::StageOutcome;
use crate::workspace::CheckpointMarker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) async fn run(
    ctx: &PipelineContext,
    cancel: &CancellationToken,
) -> Result<StageOutcome, StageError> {
    std::fs::create_dir_all(ctx.workspace.dense_root())?;

    let reconstructions = ctx.registry.snapshot();
    for (index, reconstruction) in reconstructions.iter().enumerate() {
        if cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        let dense_dir = ctx.workspace.dense_model_dir(index);
        let fused_path = ctx.workspace.fused_path(index);
        let mesh_path = ctx.workspace.mesh_path(index, ctx.config.mesher);

        if fused_path.exists() && mesh_path.exists() {
            debug!(index, "dense outputs already present, skipping reconstruction");
            continue;
        }

        // Undistortion. The dense directory's existence doubles as this
        // sub-step's checkpoint.
        if !dense_dir.exists() {
            std::fs::create_dir_all(&dense_dir)?;
            info!(index, "undistorting images");
            ctx.collaborators
                .undistorter
                .undistort(
                    &ctx.workspace.sparse_model_dir(index),
                    &ctx.config.image_path,
                    &dense_dir,
                    &ctx.options.undistort,
                    cancel,
                )
                .await
                .map_err(StageError::DenseMapping)?;
        }

        if cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        // Patch-match stereo. Requires GPU support compiled in; without it
        // the whole stage ends here.
        if !ctx.capabilities.gpu_stereo {
            warn!("skipping patch-match stereo because GPU support is not available");
            return Ok(StageOutcome::Completed);
        }
        info!(index, "running patch-match stereo");
        ctx.collaborators
            .stereo_matcher
            .run(&dense_dir, &ctx.options.stereo, cancel)
            .await
            .map_err(StageError::DenseMapping)?;

        if cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        // Stereo fusion.
        if !fused_path.exists() {
            let mut fusion = ctx.options.fusion.clone();
            fusion.min_num_pixels = effective_min_num_pixels(
                reconstruction.num_registered_images,
                fusion.min_num_pixels,
            );
            info!(
                index,
                min_num_pixels = fusion.min_num_pixels,
                "fusing depth maps"
            );
            ctx.collaborators
                .fuser
                .fuse(&dense_dir, &fused_path, &fusion, cancel)
                .await
                .map_err(StageError::DenseMapping)?;
            info!(path = %fused_path.display(), "wrote fused point cloud");
        }

        if cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        // Surface meshing.
        if !mesh_path.exists() {
            let mesher = match ctx.config.mesher {
                MesherKind::Poisson => &ctx.collaborators.poisson_mesher,
                MesherKind::Delaunay => {
                    if !ctx.capabilities.delaunay_meshing {
                        warn!(
                            "skipping Delaunay meshing because the geometry library \
                             is not available"
                        );
                        return Ok(StageOutcome::Completed);
                    }
                    &ctx.collaborators.delaunay_mesher
                }
            };
            info!(index, mesh = %mesh_path.display(), "meshing surface");
            mesher
                .mesh(&dense_dir, &fused_path, &mesh_path, &ctx.options.meshing, cancel)
                .await
                .map_err(StageError::DenseMapping)?;
        }

        if !cancel.is_cancelled() {
            CheckpointMarker::new("dense").write(&dense_dir)?;
        }
    }

    Ok(StageOutcome::Completed)
}

/// Effective minimum-observation count for fusion.
///
/// A reconstruction with `r` registered images can never produce a point
/// observed more than `r` times, so the configured minimum is clamped to
/// `r + 1` at most.
pub(crate) fn effective_min_num_pixels(
    num_registered_images: usize,
    configured_min: usize,
) -> usize {
    (num_registered_images + 1).min(configured_min)
}
