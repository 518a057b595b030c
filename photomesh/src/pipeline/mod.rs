//! Reconstruction pipeline orchestration.
//!
//! This module holds the scheduling core: the controller that sequences
//! the four stages, the matcher decision table, the stage runners with
//! their checkpoint/resume policies, and the narrow trait contracts the
//! external reconstruction algorithms are invoked through.
//!
//! # Architecture
//!
//! ```text
//! ReconstructionController
//!   -> Extraction   (populate feature database)
//!   -> Matching     (exhaustive | sequential | vocab tree, via selector)
//!   -> SparseMapping (incremental SfM, skip if sparse/ exists)
//!   -> DenseMapping  (per reconstruction: undistort -> stereo -> fuse -> mesh)
//! ```
//!
//! Cancellation is a root token held by the controller, checked at every
//! stage boundary and, inside dense mapping, between every sub-step.
//! Resume is driven by the workspace layout: existing outputs are
//! trusted and skipped.

mod context;
mod controller;
mod error;
mod selector;
mod stages;
mod traits;

pub use context::{Collaborators, PipelineContext};
pub use controller::{ControllerHandle, PipelineState, ReconstructionController};
pub use error::{CollabError, PipelineError, StageError};
pub use selector::{select_matcher, MatcherKind, VOCAB_TREE_MIN_NUM_IMAGES};
pub use traits::{
    CollabFuture, DatabaseProbe, FeatureExtractor, FeatureMatcher, Mesher, SparseMapper,
    StereoFuser, StereoMatcher, Undistorter,
};
