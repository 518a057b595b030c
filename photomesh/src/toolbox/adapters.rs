//! Collaborator implementations backed by an external toolbox binary.
//!
//! Each adapter maps one collaborator contract onto a subcommand of a
//! COLMAP-compatible reconstruction toolbox, translating the option
//! structs into command-line flags. Argument construction is kept in
//! plain functions so the mappings stay testable without spawning
//! processes.

use crate::config::{
    ExtractionOptions, FusionOptions, MapperOptions, MatchingOptions, MeshingOptions,
    StereoOptions, UndistortOptions,
};
use crate::pipeline::{
    CollabError, CollabFuture, DatabaseProbe, FeatureExtractor, FeatureMatcher, Mesher,
    SparseMapper, StereoFuser, StereoMatcher, Undistorter,
};
use crate::registry::{Reconstruction, ReconstructionRegistry};
use crate::toolbox::command::{bool_arg, path_arg, run_tool, thread_arg};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Image file extensions the probe recognizes when counting the corpus.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp", "pgm", "ppm"];

pub(crate) struct ToolboxExtractor {
    pub(crate) binary: PathBuf,
}

fn extractor_args(database_path: &Path, options: &ExtractionOptions) -> Vec<String> {
    let mut args = vec![
        "feature_extractor".to_string(),
        "--database_path".to_string(),
        path_arg(database_path),
        "--image_path".to_string(),
        path_arg(&options.image_path),
        "--ImageReader.camera_model".to_string(),
        options.camera_model.clone(),
        "--ImageReader.single_camera".to_string(),
        bool_arg(options.single_camera),
        "--ImageReader.single_camera_per_folder".to_string(),
        bool_arg(options.single_camera_per_folder),
        "--SiftExtraction.use_gpu".to_string(),
        bool_arg(options.use_gpu),
        "--SiftExtraction.gpu_index".to_string(),
        options.gpu_index.clone(),
        "--SiftExtraction.num_threads".to_string(),
        thread_arg(options.num_threads),
        "--SiftExtraction.max_image_size".to_string(),
        options.max_image_size.to_string(),
        "--SiftExtraction.max_num_features".to_string(),
        options.max_num_features.to_string(),
    ];
    if let Some(mask_path) = &options.mask_path {
        args.push("--ImageReader.mask_path".to_string());
        args.push(path_arg(mask_path));
    }
    args
}

impl FeatureExtractor for ToolboxExtractor {
    fn extract<'a>(
        &'a self,
        database_path: &'a Path,
        options: &'a ExtractionOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            run_tool(&self.binary, &extractor_args(database_path, options), cancel).await
        })
    }
}

/// Corpus-size probe.
///
/// The feature database format is owned by the toolbox, so the probe
/// counts image files under the source directory instead; extraction
/// records exactly these images.
pub(crate) struct ImageFolderProbe {
    pub(crate) image_path: PathBuf,
}

impl DatabaseProbe for ImageFolderProbe {
    fn num_images<'a>(
        &'a self,
        _database_path: &'a Path,
    ) -> CollabFuture<'a, Result<usize, CollabError>> {
        Box::pin(async move {
            let mut count = 0usize;
            let mut pending = vec![self.image_path.clone()];
            while let Some(dir) = pending.pop() {
                let mut entries = tokio::fs::read_dir(&dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let file_type = entry.file_type().await?;
                    if file_type.is_dir() {
                        pending.push(entry.path());
                    } else if is_image_file(&entry.path()) {
                        count += 1;
                    }
                }
            }
            Ok(count)
        })
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Which matching subcommand an adapter drives.
#[derive(Clone, Copy)]
pub(crate) enum MatcherCommand {
    Exhaustive,
    Sequential,
    VocabTree,
}

pub(crate) struct ToolboxMatcher {
    pub(crate) binary: PathBuf,
    pub(crate) command: MatcherCommand,
}

fn matcher_args(
    command: MatcherCommand,
    database_path: &Path,
    options: &MatchingOptions,
) -> Vec<String> {
    let subcommand = match command {
        MatcherCommand::Exhaustive => "exhaustive_matcher",
        MatcherCommand::Sequential => "sequential_matcher",
        MatcherCommand::VocabTree => "vocab_tree_matcher",
    };
    let mut args = vec![
        subcommand.to_string(),
        "--database_path".to_string(),
        path_arg(database_path),
        "--SiftMatching.use_gpu".to_string(),
        bool_arg(options.use_gpu),
        "--SiftMatching.gpu_index".to_string(),
        options.gpu_index.clone(),
        "--SiftMatching.num_threads".to_string(),
        thread_arg(options.num_threads),
    ];
    match command {
        MatcherCommand::Exhaustive => {}
        MatcherCommand::Sequential => {
            args.push("--SequentialMatching.overlap".to_string());
            args.push(options.sequential_overlap.to_string());
            args.push("--SequentialMatching.loop_detection".to_string());
            args.push(bool_arg(options.loop_detection));
            if options.loop_detection {
                if let Some(vocab_tree_path) = &options.vocab_tree_path {
                    args.push("--SequentialMatching.vocab_tree_path".to_string());
                    args.push(path_arg(vocab_tree_path));
                }
            }
        }
        MatcherCommand::VocabTree => {
            if let Some(vocab_tree_path) = &options.vocab_tree_path {
                args.push("--VocabTreeMatching.vocab_tree_path".to_string());
                args.push(path_arg(vocab_tree_path));
            }
        }
    }
    args
}

impl FeatureMatcher for ToolboxMatcher {
    fn match_features<'a>(
        &'a self,
        database_path: &'a Path,
        options: &'a MatchingOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            let args = matcher_args(self.command, database_path, options);
            run_tool(&self.binary, &args, cancel).await
        })
    }
}

/// Incremental mapper adapter.
///
/// The toolbox writes one numbered model directory per reconstruction
/// into a staging directory; `persist` moves each into its final
/// `sparse/<index>/` location so a cancelled run never leaves a
/// half-written directory at the checkpoint path.
pub(crate) struct ToolboxMapper {
    pub(crate) binary: PathBuf,
    pub(crate) staging: PathBuf,
}

fn mapper_args(
    options: &MapperOptions,
    image_path: &Path,
    database_path: &Path,
    output_path: &Path,
) -> Vec<String> {
    vec![
        "mapper".to_string(),
        "--database_path".to_string(),
        path_arg(database_path),
        "--image_path".to_string(),
        path_arg(image_path),
        "--output_path".to_string(),
        path_arg(output_path),
        "--Mapper.num_threads".to_string(),
        thread_arg(options.num_threads),
        "--Mapper.ba_use_gpu".to_string(),
        bool_arg(options.ba_use_gpu),
        "--Mapper.ba_gpu_index".to_string(),
        options.ba_gpu_index.clone(),
    ]
}

impl SparseMapper for ToolboxMapper {
    fn run<'a>(
        &'a self,
        options: &'a MapperOptions,
        image_path: &'a Path,
        database_path: &'a Path,
        registry: &'a ReconstructionRegistry,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.staging).await?;
            let args = mapper_args(options, image_path, database_path, &self.staging);
            run_tool(&self.binary, &args, cancel).await?;

            // Register whatever the mapper produced, in model order. A
            // stopped run registers the models that finished before the
            // kill.
            let mut model_dirs = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.staging).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    model_dirs.push(entry.path());
                }
            }
            model_dirs.sort();
            for dir in model_dirs {
                let reconstruction = read_model_summary(&dir).await?;
                debug!(
                    dir = %dir.display(),
                    images = reconstruction.num_registered_images,
                    "mapper produced reconstruction"
                );
                registry.push(reconstruction);
            }
            Ok(())
        })
    }

    fn persist<'a>(
        &'a self,
        index: usize,
        dir: &'a Path,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            let staged = self.staging.join(index.to_string());
            tokio::fs::rename(&staged, dir).await?;
            // Drop the staging directory with the last model; harmless if
            // other models are still waiting.
            let _ = tokio::fs::remove_dir(&self.staging).await;
            Ok(())
        })
    }

    fn load<'a>(&'a self, dir: &'a Path) -> CollabFuture<'a, Result<Reconstruction, CollabError>> {
        Box::pin(read_model_summary(dir))
    }
}

/// Reads the registered-image and point counts from a persisted model.
///
/// Both binary model files start with a little-endian u64 element count.
async fn read_model_summary(dir: &Path) -> Result<Reconstruction, CollabError> {
    let num_registered_images = read_bin_count(&dir.join("images.bin")).await?;
    let num_points = read_bin_count(&dir.join("points3D.bin")).await?;
    Ok(Reconstruction {
        num_registered_images,
        num_points,
    })
}

async fn read_bin_count(path: &Path) -> Result<usize, CollabError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CollabError::InvalidModel(format!("{}: {e}", path.display())))?;
    let mut header = [0u8; 8];
    file.read_exact(&mut header)
        .await
        .map_err(|e| CollabError::InvalidModel(format!("{}: {e}", path.display())))?;
    Ok(u64::from_le_bytes(header) as usize)
}

pub(crate) struct ToolboxUndistorter {
    pub(crate) binary: PathBuf,
}

impl Undistorter for ToolboxUndistorter {
    fn undistort<'a>(
        &'a self,
        sparse_dir: &'a Path,
        image_path: &'a Path,
        dense_dir: &'a Path,
        options: &'a UndistortOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            let args = vec![
                "image_undistorter".to_string(),
                "--image_path".to_string(),
                path_arg(image_path),
                "--input_path".to_string(),
                path_arg(sparse_dir),
                "--output_path".to_string(),
                path_arg(dense_dir),
                "--max_image_size".to_string(),
                options.max_image_size.to_string(),
            ];
            run_tool(&self.binary, &args, cancel).await
        })
    }
}

pub(crate) struct ToolboxStereoMatcher {
    pub(crate) binary: PathBuf,
}

impl StereoMatcher for ToolboxStereoMatcher {
    fn run<'a>(
        &'a self,
        dense_dir: &'a Path,
        options: &'a StereoOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            let args = vec![
                "patch_match_stereo".to_string(),
                "--workspace_path".to_string(),
                path_arg(dense_dir),
                "--PatchMatchStereo.max_image_size".to_string(),
                options.max_image_size.to_string(),
                "--PatchMatchStereo.gpu_index".to_string(),
                options.gpu_index.clone(),
                "--PatchMatchStereo.window_radius".to_string(),
                options.window_radius.to_string(),
                "--PatchMatchStereo.geom_consistency".to_string(),
                bool_arg(options.geom_consistency),
            ];
            run_tool(&self.binary, &args, cancel).await
        })
    }
}

pub(crate) struct ToolboxFuser {
    pub(crate) binary: PathBuf,
}

fn fuser_args(dense_dir: &Path, fused_path: &Path, options: &FusionOptions) -> Vec<String> {
    let mut args = vec![
        "stereo_fusion".to_string(),
        "--workspace_path".to_string(),
        path_arg(dense_dir),
        "--output_path".to_string(),
        path_arg(fused_path),
        "--input_type".to_string(),
        if options.geometric_input {
            "geometric".to_string()
        } else {
            "photometric".to_string()
        },
        "--StereoFusion.min_num_pixels".to_string(),
        options.min_num_pixels.to_string(),
        "--StereoFusion.max_image_size".to_string(),
        options.max_image_size.to_string(),
    ];
    if let Some(mask_path) = &options.mask_path {
        args.push("--StereoFusion.mask_path".to_string());
        args.push(path_arg(mask_path));
    }
    args
}

impl StereoFuser for ToolboxFuser {
    fn fuse<'a>(
        &'a self,
        dense_dir: &'a Path,
        fused_path: &'a Path,
        options: &'a FusionOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            run_tool(&self.binary, &fuser_args(dense_dir, fused_path, options), cancel).await
        })
    }
}

pub(crate) struct ToolboxPoissonMesher {
    pub(crate) binary: PathBuf,
}

impl Mesher for ToolboxPoissonMesher {
    fn mesh<'a>(
        &'a self,
        _dense_dir: &'a Path,
        fused_path: &'a Path,
        mesh_path: &'a Path,
        options: &'a MeshingOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            let args = vec![
                "poisson_mesher".to_string(),
                "--input_path".to_string(),
                path_arg(fused_path),
                "--output_path".to_string(),
                path_arg(mesh_path),
                "--PoissonMeshing.num_threads".to_string(),
                thread_arg(options.num_threads),
            ];
            run_tool(&self.binary, &args, cancel).await
        })
    }
}

pub(crate) struct ToolboxDelaunayMesher {
    pub(crate) binary: PathBuf,
}

impl Mesher for ToolboxDelaunayMesher {
    fn mesh<'a>(
        &'a self,
        dense_dir: &'a Path,
        _fused_path: &'a Path,
        mesh_path: &'a Path,
        _options: &'a MeshingOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            let args = vec![
                "delaunay_mesher".to_string(),
                "--input_path".to_string(),
                path_arg(dense_dir),
                "--output_path".to_string(),
                path_arg(mesh_path),
            ];
            run_tool(&self.binary, &args, cancel).await
        })
    }
}
