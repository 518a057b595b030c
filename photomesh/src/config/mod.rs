//! Pipeline configuration.
//!
//! [`PipelineConfig`] is the immutable input to one controller run. It is
//! validated once, before any work starts: the workspace and image
//! directories must exist and the camera model must be a supported name.
//! From the validated configuration the controller derives per-stage
//! option structs ([`options::StageOptions`]), applying the quality-tier
//! and dataset-category modifiers in one place so the stage runners see
//! plain data.

mod options;

pub use options::{
    ExtractionOptions, FusionOptions, MapperOptions, MatchingOptions, MeshingOptions,
    StageOptions, StereoOptions, UndistortOptions, DEFAULT_MIN_FUSION_PIXELS,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What kind of image corpus the workspace holds.
///
/// The category drives matcher selection: video exploits temporal
/// locality, photo collections use exhaustive or retrieval-based matching
/// depending on corpus size.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum DataType {
    /// Ordered frames extracted from a video.
    Video,
    /// An unordered set of photos of one scene, taken deliberately.
    IndividualPhotos,
    /// Crowd-sourced photos with wildly varying cameras and conditions.
    InternetPhotos,
}

/// Reconstruction quality tier.
///
/// Higher tiers raise image resolution and feature budgets across all
/// stages, trading run time for fidelity.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Quality {
    Low,
    Medium,
    High,
    Extreme,
}

/// Surface meshing algorithm for the dense stage.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum MesherKind {
    Poisson,
    Delaunay,
}

impl MesherKind {
    /// Output file name this mesher writes inside a dense model directory.
    pub fn mesh_file_name(&self) -> &'static str {
        match self {
            Self::Poisson => "meshed-poisson.ply",
            Self::Delaunay => "meshed-delaunay.ply",
        }
    }
}

/// Camera model names accepted by the external collaborators.
pub const SUPPORTED_CAMERA_MODELS: &[&str] = &[
    "SIMPLE_PINHOLE",
    "PINHOLE",
    "SIMPLE_RADIAL",
    "SIMPLE_RADIAL_FISHEYE",
    "RADIAL",
    "RADIAL_FISHEYE",
    "OPENCV",
    "OPENCV_FISHEYE",
    "FULL_OPENCV",
    "FOV",
    "THIN_PRISM_FISHEYE",
];

/// Configuration errors are fatal at construction; no partial work is
/// performed on an invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("workspace directory does not exist: {}", .0.display())]
    WorkspaceMissing(PathBuf),

    #[error("image directory does not exist: {}", .0.display())]
    ImagesMissing(PathBuf),

    #[error("mask directory does not exist: {}", .0.display())]
    MaskMissing(PathBuf),

    #[error("unsupported camera model: {0}")]
    UnsupportedCameraModel(String),
}

/// Immutable input for one pipeline run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Root directory for all persisted pipeline state.
    pub workspace_path: PathBuf,
    /// Directory holding the source images.
    pub image_path: PathBuf,
    /// Optional directory of per-image masks for extraction and fusion.
    pub mask_path: Option<PathBuf>,
    /// Corpus category; drives matcher selection.
    pub data_type: DataType,
    /// Quality tier; scales per-stage budgets.
    pub quality: Quality,
    /// Camera model hint passed to extraction.
    pub camera_model: String,
    /// All images share one camera.
    pub single_camera: bool,
    /// Images in the same folder share one camera.
    pub single_camera_per_folder: bool,
    /// Use the GPU for extraction, matching and bundle adjustment.
    pub use_gpu: bool,
    /// GPU index list understood by the collaborators ("-1" = auto).
    pub gpu_index: String,
    /// Worker threads per collaborator (0 = all available cores).
    pub num_threads: usize,
    /// Precomputed vocabulary tree for retrieval-based matching.
    pub vocab_tree_path: Option<PathBuf>,
    /// Run the feature extraction stage.
    pub extraction: bool,
    /// Run the feature matching stage.
    pub matching: bool,
    /// Run the sparse mapping stage.
    pub sparse: bool,
    /// Run the dense mapping stage.
    pub dense: bool,
    /// Surface meshing algorithm.
    pub mesher: MesherKind,
}

impl PipelineConfig {
    /// Creates a configuration with defaults for everything but the paths.
    pub fn new(workspace_path: impl Into<PathBuf>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            image_path: image_path.into(),
            mask_path: None,
            data_type: DataType::IndividualPhotos,
            quality: Quality::High,
            camera_model: "SIMPLE_RADIAL".to_string(),
            single_camera: false,
            single_camera_per_folder: false,
            use_gpu: true,
            gpu_index: "-1".to_string(),
            num_threads: 0,
            vocab_tree_path: None,
            extraction: true,
            matching: true,
            sparse: true,
            dense: true,
            mesher: MesherKind::Poisson,
        }
    }

    /// Checks the configuration against the filesystem and the supported
    /// camera model table. Called by the controller before any work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.workspace_path.is_dir() {
            return Err(ConfigError::WorkspaceMissing(self.workspace_path.clone()));
        }
        if !self.image_path.is_dir() {
            return Err(ConfigError::ImagesMissing(self.image_path.clone()));
        }
        if let Some(mask_path) = &self.mask_path {
            if !mask_path.is_dir() {
                return Err(ConfigError::MaskMissing(mask_path.clone()));
            }
        }
        if !is_supported_camera_model(&self.camera_model) {
            return Err(ConfigError::UnsupportedCameraModel(self.camera_model.clone()));
        }
        Ok(())
    }

    /// Whether a vocabulary tree is configured for retrieval matching.
    pub fn has_vocab_tree(&self) -> bool {
        self.vocab_tree_path.is_some()
    }

    /// Derives the per-stage option structs for this configuration.
    pub fn stage_options(&self) -> StageOptions {
        StageOptions::derive(self)
    }
}

/// Returns true if `name` is a camera model the collaborators accept.
pub fn is_supported_camera_model(name: &str) -> bool {
    SUPPORTED_CAMERA_MODELS.contains(&name)
}
