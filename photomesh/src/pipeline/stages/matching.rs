//! Feature matching stage.
//!
//! Reads the corpus size from the feature database, selects a matching
//! strategy through the decision table in [`selector`](crate::pipeline::selector)
//! and runs the corresponding collaborator.

use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use crate::pipeline::selector::{select_matcher, MatcherKind};
use crate::pipeline::traits::FeatureMatcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub(crate) async fn run(
    ctx: &PipelineContext,
    cancel: &CancellationToken,
) -> Result<(), StageError> {
    let database_path = ctx.workspace.database_path();

    let num_images = ctx
        .collaborators
        .database
        .num_images(&database_path)
        .await
        .map_err(StageError::Matching)?;

    let kind = select_matcher(ctx.config.data_type, num_images, ctx.config.has_vocab_tree());
    info!(num_images, matcher = %kind, "matching features");

    let matcher: &Arc<dyn FeatureMatcher> = match kind {
        MatcherKind::Exhaustive => &ctx.collaborators.exhaustive_matcher,
        MatcherKind::Sequential => &ctx.collaborators.sequential_matcher,
        MatcherKind::VocabTree => ctx
            .collaborators
            .vocab_tree_matcher
            .as_ref()
            .ok_or(StageError::MissingCollaborator("vocabulary tree matcher"))?,
    };

    matcher
        .match_features(&database_path, &ctx.options.matching, cancel)
        .await
        .map_err(StageError::Matching)
}
