//! Per-stage option structs derived from [`PipelineConfig`].
//!
//! Stage runners and collaborators consume plain data; the quality-tier
//! and dataset-category policy lives here, applied once at derivation.
//! The numeric tables are policy constants, not computed values.

use super::{DataType, PipelineConfig, Quality};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default minimum number of consistent pixel observations for fusion.
///
/// Per reconstruction this is clamped down to `registered images + 1` so
/// the filter is never stricter than a small reconstruction could satisfy.
pub const DEFAULT_MIN_FUSION_PIXELS: usize = 5;

/// Adjacent-frame overlap for sequential (video) matching.
const SEQUENTIAL_OVERLAP: u32 = 10;

impl Quality {
    /// Longest image dimension processed by extraction and undistortion.
    fn max_image_size(self) -> u32 {
        match self {
            Self::Low => 1000,
            Self::Medium => 1600,
            Self::High => 2400,
            Self::Extreme => 3200,
        }
    }

    /// Feature budget per image.
    fn max_num_features(self) -> u32 {
        match self {
            Self::Low => 2048,
            Self::Medium => 4096,
            Self::High => 8192,
            Self::Extreme => 16384,
        }
    }

    /// Longest image dimension for patch-match stereo.
    fn stereo_max_image_size(self) -> u32 {
        match self {
            Self::Low => 1000,
            Self::Medium => 1600,
            Self::High => 2000,
            Self::Extreme => 2400,
        }
    }

    /// Patch window radius for stereo matching.
    fn stereo_window_radius(self) -> u32 {
        match self {
            Self::Low => 3,
            Self::Medium => 4,
            Self::High | Self::Extreme => 5,
        }
    }

    /// Geometric consistency is skipped at the lowest tier to halve the
    /// number of stereo passes.
    fn geom_consistency(self) -> bool {
        !matches!(self, Self::Low)
    }
}

/// Options for the feature extraction collaborator.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExtractionOptions {
    pub image_path: PathBuf,
    pub mask_path: Option<PathBuf>,
    pub camera_model: String,
    pub single_camera: bool,
    pub single_camera_per_folder: bool,
    pub use_gpu: bool,
    pub gpu_index: String,
    pub num_threads: usize,
    pub max_image_size: u32,
    pub max_num_features: u32,
}

/// Options shared by all three feature matching collaborators.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchingOptions {
    pub use_gpu: bool,
    pub gpu_index: String,
    pub num_threads: usize,
    pub vocab_tree_path: Option<PathBuf>,
    /// Sequential matching only: also run vocabulary-tree loop detection.
    pub loop_detection: bool,
    /// Sequential matching only: how many neighboring frames to match.
    pub sequential_overlap: u32,
}

/// Options for the incremental sparse mapper.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MapperOptions {
    pub num_threads: usize,
    pub ba_use_gpu: bool,
    pub ba_gpu_index: String,
}

/// Options for image/camera undistortion.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UndistortOptions {
    pub max_image_size: u32,
}

/// Options for patch-match stereo.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StereoOptions {
    pub max_image_size: u32,
    pub gpu_index: String,
    pub window_radius: u32,
    pub geom_consistency: bool,
}

/// Options for stereo fusion.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FusionOptions {
    /// Minimum consistent observations per fused point, before the
    /// per-reconstruction clamp.
    pub min_num_pixels: usize,
    pub max_image_size: u32,
    pub mask_path: Option<PathBuf>,
    /// Fuse geometric depth maps when stereo ran with geometric
    /// consistency, photometric ones otherwise.
    pub geometric_input: bool,
}

/// Options for surface meshing.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MeshingOptions {
    pub num_threads: usize,
}

/// All derived stage options for one run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StageOptions {
    pub extraction: ExtractionOptions,
    pub matching: MatchingOptions,
    pub mapper: MapperOptions,
    pub undistort: UndistortOptions,
    pub stereo: StereoOptions,
    pub fusion: FusionOptions,
    pub meshing: MeshingOptions,
}

impl StageOptions {
    pub(super) fn derive(config: &PipelineConfig) -> Self {
        let quality = config.quality;

        let extraction = ExtractionOptions {
            image_path: config.image_path.clone(),
            mask_path: config.mask_path.clone(),
            camera_model: config.camera_model.clone(),
            single_camera: config.single_camera,
            single_camera_per_folder: config.single_camera_per_folder,
            use_gpu: config.use_gpu,
            gpu_index: config.gpu_index.clone(),
            num_threads: config.num_threads,
            max_image_size: quality.max_image_size(),
            max_num_features: quality.max_num_features(),
        };

        let matching = MatchingOptions {
            use_gpu: config.use_gpu,
            gpu_index: config.gpu_index.clone(),
            num_threads: config.num_threads,
            vocab_tree_path: config.vocab_tree_path.clone(),
            // Loop detection needs a vocabulary tree and only applies to
            // video corpora.
            loop_detection: config.data_type == DataType::Video && config.has_vocab_tree(),
            sequential_overlap: SEQUENTIAL_OVERLAP,
        };

        let mapper = MapperOptions {
            num_threads: config.num_threads,
            ba_use_gpu: config.use_gpu,
            ba_gpu_index: config.gpu_index.clone(),
        };

        let undistort = UndistortOptions {
            max_image_size: quality.stereo_max_image_size(),
        };

        let stereo = StereoOptions {
            max_image_size: quality.stereo_max_image_size(),
            gpu_index: config.gpu_index.clone(),
            window_radius: quality.stereo_window_radius(),
            geom_consistency: quality.geom_consistency(),
        };

        let fusion = FusionOptions {
            min_num_pixels: DEFAULT_MIN_FUSION_PIXELS,
            max_image_size: quality.stereo_max_image_size(),
            mask_path: config.mask_path.clone(),
            geometric_input: stereo.geom_consistency,
        };

        let meshing = MeshingOptions {
            num_threads: config.num_threads,
        };

        Self {
            extraction,
            matching,
            mapper,
            undistort,
            stereo,
            fusion,
            meshing,
        }
    }
}
