//! photomesh CLI - automatic 3D reconstruction from a folder of images.
//!
//! Drives the full pipeline (feature extraction, matching, sparse
//! mapping, dense mapping) over a workspace directory, delegating the
//! numerics to an installed COLMAP-compatible toolbox. Re-running against
//! the same workspace resumes from whatever outputs already exist.

use clap::{Parser, ValueEnum};
use photomesh::config::{DataType, MesherKind, PipelineConfig, Quality};
use photomesh::pipeline::{PipelineState, ReconstructionController};
use photomesh::registry::ReconstructionRegistry;
use photomesh::toolbox::Toolbox;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, ValueEnum)]
enum DataTypeArg {
    /// Ordered frames extracted from a video
    Video,
    /// An unordered set of photos of one scene
    Individual,
    /// Crowd-sourced internet photos
    Internet,
}

impl From<DataTypeArg> for DataType {
    fn from(value: DataTypeArg) -> Self {
        match value {
            DataTypeArg::Video => Self::Video,
            DataTypeArg::Individual => Self::IndividualPhotos,
            DataTypeArg::Internet => Self::InternetPhotos,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum QualityArg {
    Low,
    Medium,
    High,
    Extreme,
}

impl From<QualityArg> for Quality {
    fn from(value: QualityArg) -> Self {
        match value {
            QualityArg::Low => Self::Low,
            QualityArg::Medium => Self::Medium,
            QualityArg::High => Self::High,
            QualityArg::Extreme => Self::Extreme,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum MesherArg {
    /// Poisson surface reconstruction from the fused point cloud
    Poisson,
    /// Delaunay meshing over the dense workspace (needs the geometry library)
    Delaunay,
}

impl From<MesherArg> for MesherKind {
    fn from(value: MesherArg) -> Self {
        match value {
            MesherArg::Poisson => Self::Poisson,
            MesherArg::Delaunay => Self::Delaunay,
        }
    }
}

#[derive(Parser)]
#[command(name = "photomesh")]
#[command(about = "Automatic 3D reconstruction from a folder of images", long_about = None)]
struct Args {
    /// Workspace directory for all pipeline state and outputs
    #[arg(long)]
    workspace: PathBuf,

    /// Directory containing the source images
    #[arg(long)]
    images: PathBuf,

    /// Optional directory of per-image masks
    #[arg(long)]
    masks: Option<PathBuf>,

    /// What kind of image corpus this is
    #[arg(long, value_enum, default_value = "individual")]
    data_type: DataTypeArg,

    /// Reconstruction quality tier
    #[arg(long, value_enum, default_value = "high")]
    quality: QualityArg,

    /// Camera model hint for feature extraction
    #[arg(long, default_value = "SIMPLE_RADIAL")]
    camera_model: String,

    /// All images share one camera
    #[arg(long)]
    single_camera: bool,

    /// Images in the same folder share one camera
    #[arg(long)]
    single_camera_per_folder: bool,

    /// Disable GPU acceleration for extraction, matching and bundle adjustment
    #[arg(long)]
    no_gpu: bool,

    /// GPU index list passed to the toolbox ("-1" = auto)
    #[arg(long, default_value = "-1")]
    gpu_index: String,

    /// Worker threads per stage (0 = all cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Precomputed vocabulary tree for retrieval-based matching
    #[arg(long)]
    vocab_tree: Option<PathBuf>,

    /// Surface meshing algorithm
    #[arg(long, value_enum, default_value = "poisson")]
    mesher: MesherArg,

    /// Skip the feature extraction stage
    #[arg(long)]
    skip_extraction: bool,

    /// Skip the feature matching stage
    #[arg(long)]
    skip_matching: bool,

    /// Skip the sparse mapping stage
    #[arg(long)]
    skip_sparse: bool,

    /// Skip the dense mapping stage
    #[arg(long)]
    skip_dense: bool,

    /// Reconstruction toolbox executable
    #[arg(long, default_value = "colmap")]
    toolbox: PathBuf,
}

impl Args {
    fn into_config(self) -> (PipelineConfig, PathBuf) {
        let mut config = PipelineConfig::new(&self.workspace, &self.images);
        config.mask_path = self.masks;
        config.data_type = self.data_type.clone().into();
        config.quality = self.quality.clone().into();
        config.camera_model = self.camera_model.clone();
        config.single_camera = self.single_camera;
        config.single_camera_per_folder = self.single_camera_per_folder;
        config.use_gpu = !self.no_gpu;
        config.gpu_index = self.gpu_index.clone();
        config.num_threads = self.threads;
        config.vocab_tree_path = self.vocab_tree.clone();
        config.mesher = self.mesher.clone().into();
        config.extraction = !self.skip_extraction;
        config.matching = !self.skip_matching;
        config.sparse = !self.skip_sparse;
        config.dense = !self.skip_dense;
        (config, self.toolbox)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, toolbox_binary) = Args::parse().into_config();

    let collaborators = Toolbox::new(&toolbox_binary).collaborators(&config);
    let registry = Arc::new(ReconstructionRegistry::new());

    let controller =
        match ReconstructionController::new(config, collaborators, Arc::clone(&registry)) {
            Ok(controller) => controller,
            Err(err) => {
                eprintln!("Error: {err}");
                process::exit(1);
            }
        };

    let mut handle = controller.start();

    // Ctrl-C requests a cooperative stop; the run winds down at its next
    // cancellation checkpoint and on-disk state stays resumable.
    let interrupt_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping pipeline");
            interrupt_handle.stop();
        }
    });

    if let Err(err) = handle.wait().await {
        eprintln!("Error: {err}");
        process::exit(1);
    }

    match handle.state() {
        PipelineState::Stopped => {
            info!("pipeline stopped; re-run with the same workspace to resume");
        }
        _ => {
            info!(
                reconstructions = registry.len(),
                "pipeline finished"
            );
        }
    }
}
