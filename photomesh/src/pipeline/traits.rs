//! Collaborator contracts.
//!
//! The actual reconstruction algorithms (feature detection, matching,
//! bundle adjustment, stereo, meshing) are external collaborators invoked
//! through the narrow traits below. Every long-running method receives the
//! stage's cancellation token; implementations poll it at safe points and
//! return cleanly once it fires. An implementation that never polls cannot
//! be interrupted mid-call.
//!
//! The traits are dyn-compatible, so async methods are written as
//! boxed-future returns.

use crate::config::{
    ExtractionOptions, FusionOptions, MapperOptions, MatchingOptions, MeshingOptions,
    StereoOptions, UndistortOptions,
};
use crate::pipeline::error::CollabError;
use crate::registry::{Reconstruction, ReconstructionRegistry};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by collaborator methods.
pub type CollabFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Detects image features and writes them into the feature database.
pub trait FeatureExtractor: Send + Sync {
    fn extract<'a>(
        &'a self,
        database_path: &'a Path,
        options: &'a ExtractionOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>>;
}

/// Read-only queries against the feature database.
pub trait DatabaseProbe: Send + Sync {
    /// Number of images recorded in the database.
    fn num_images<'a>(
        &'a self,
        database_path: &'a Path,
    ) -> CollabFuture<'a, Result<usize, CollabError>>;
}

/// Matches features between image pairs and writes match/geometry records
/// into the database. One implementation per strategy (exhaustive,
/// sequential, vocabulary tree).
pub trait FeatureMatcher: Send + Sync {
    fn match_features<'a>(
        &'a self,
        database_path: &'a Path,
        options: &'a MatchingOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>>;
}

/// Incremental structure-from-motion.
pub trait SparseMapper: Send + Sync {
    /// Runs the incremental pipeline and appends every produced
    /// reconstruction to `registry`, in emission order. The token is the
    /// polling predicate; a stopped run returns Ok with whatever was
    /// produced so far.
    fn run<'a>(
        &'a self,
        options: &'a MapperOptions,
        image_path: &'a Path,
        database_path: &'a Path,
        registry: &'a ReconstructionRegistry,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>>;

    /// Persists reconstruction `index` (registry order of the preceding
    /// [`run`](Self::run) call) under `dir`, creating the directory.
    fn persist<'a>(
        &'a self,
        index: usize,
        dir: &'a Path,
    ) -> CollabFuture<'a, Result<(), CollabError>>;

    /// Loads the summary of a previously persisted reconstruction.
    fn load<'a>(&'a self, dir: &'a Path) -> CollabFuture<'a, Result<Reconstruction, CollabError>>;
}

/// Rectifies images and cameras of one reconstruction for stereo.
pub trait Undistorter: Send + Sync {
    fn undistort<'a>(
        &'a self,
        sparse_dir: &'a Path,
        image_path: &'a Path,
        dense_dir: &'a Path,
        options: &'a UndistortOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>>;
}

/// Patch-match stereo over an undistorted dense workspace.
pub trait StereoMatcher: Send + Sync {
    fn run<'a>(
        &'a self,
        dense_dir: &'a Path,
        options: &'a StereoOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>>;
}

/// Fuses depth maps into a point cloud at `fused_path`, writing the
/// per-point visibility record next to it.
pub trait StereoFuser: Send + Sync {
    fn fuse<'a>(
        &'a self,
        dense_dir: &'a Path,
        fused_path: &'a Path,
        options: &'a FusionOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>>;
}

/// Extracts a surface mesh from dense output.
///
/// Poisson meshing reads the fused point cloud; Delaunay meshing reads
/// the dense workspace directly. Both paths are provided and each
/// implementation uses what it needs.
pub trait Mesher: Send + Sync {
    fn mesh<'a>(
        &'a self,
        dense_dir: &'a Path,
        fused_path: &'a Path,
        mesh_path: &'a Path,
        options: &'a MeshingOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>>;
}
