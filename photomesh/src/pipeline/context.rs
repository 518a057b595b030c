//! Shared context threaded through the stage runners.

use crate::capabilities::Capabilities;
use crate::config::{PipelineConfig, StageOptions};
use crate::pipeline::traits::{
    DatabaseProbe, FeatureExtractor, FeatureMatcher, Mesher, SparseMapper, StereoFuser,
    StereoMatcher, Undistorter,
};
use crate::registry::ReconstructionRegistry;
use crate::workspace::Workspace;
use std::sync::Arc;

/// The full set of external collaborators for one run.
///
/// The vocabulary-tree matcher is only present when a tree is configured;
/// the selector never picks it otherwise.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn FeatureExtractor>,
    pub database: Arc<dyn DatabaseProbe>,
    pub exhaustive_matcher: Arc<dyn FeatureMatcher>,
    pub sequential_matcher: Arc<dyn FeatureMatcher>,
    pub vocab_tree_matcher: Option<Arc<dyn FeatureMatcher>>,
    pub mapper: Arc<dyn SparseMapper>,
    pub undistorter: Arc<dyn Undistorter>,
    pub stereo_matcher: Arc<dyn StereoMatcher>,
    pub fuser: Arc<dyn StereoFuser>,
    pub poisson_mesher: Arc<dyn Mesher>,
    pub delaunay_mesher: Arc<dyn Mesher>,
}

/// Everything a stage runner needs: validated configuration, derived
/// options, workspace layout, capability flags, collaborators and the
/// shared registry.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub options: StageOptions,
    pub workspace: Workspace,
    pub capabilities: Capabilities,
    pub collaborators: Collaborators,
    pub registry: Arc<ReconstructionRegistry>,
}
