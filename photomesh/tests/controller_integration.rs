//! Integration tests for the reconstruction controller.
//!
//! These cover the orchestration behavior end to end with mock
//! collaborators: stage sequencing, matcher selection, cancellation
//! propagation, capability fail-fast and the fusion parameter clamp.

mod common;

use common::{model, MockSet};
use photomesh::capabilities::Capabilities;
use photomesh::config::{DataType, PipelineConfig};
use photomesh::pipeline::{PipelineState, ReconstructionController};
use photomesh::registry::ReconstructionRegistry;
use photomesh::worker::WorkerStatus;
use photomesh::workspace::Workspace;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    _workspace_dir: tempfile::TempDir,
    _image_dir: tempfile::TempDir,
    config: PipelineConfig,
}

fn fixture() -> Fixture {
    let workspace_dir = tempfile::tempdir().unwrap();
    let image_dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(workspace_dir.path(), image_dir.path());
    Fixture {
        _workspace_dir: workspace_dir,
        _image_dir: image_dir,
        config,
    }
}

fn controller(
    config: PipelineConfig,
    mocks: &MockSet,
    capabilities: Capabilities,
) -> (ReconstructionController, Arc<ReconstructionRegistry>) {
    let registry = Arc::new(ReconstructionRegistry::new());
    let controller =
        ReconstructionController::new(config, mocks.collaborators(), Arc::clone(&registry))
            .unwrap()
            .with_capabilities(capabilities);
    (controller, registry)
}

#[tokio::test]
async fn test_end_to_end_without_gpu() {
    let fixture = fixture();
    let workspace = Workspace::new(&fixture.config.workspace_path);
    let mut mocks = MockSet::new();
    mocks.probe_num_images = 50;
    mocks.mapper_models = vec![model(5)];

    let mut config = fixture.config.clone();
    config.data_type = DataType::IndividualPhotos;
    let (controller, registry) = controller(config, &mocks, Capabilities::none());

    controller.run().await.unwrap();

    // 50 individual photos without a vocabulary tree select the
    // exhaustive matcher.
    assert_eq!(mocks.extract_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.exhaustive_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.sequential_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.vocab_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.mapper_runs.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);

    // Without GPU stereo the dense stage undistorts and then ends early:
    // no fused cloud, no mesh, and no error.
    assert_eq!(mocks.undistort_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.stereo_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.fuse_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.mesh_calls.load(Ordering::SeqCst), 0);
    assert!(workspace.dense_model_dir(0).exists());
    assert!(!workspace.fused_path(0).exists());
}

#[tokio::test]
async fn test_full_run_with_all_capabilities() {
    let fixture = fixture();
    let workspace = Workspace::new(&fixture.config.workspace_path);
    let mut mocks = MockSet::new();
    mocks.mapper_models = vec![model(3), model(20)];

    let (controller, registry) = controller(fixture.config.clone(), &mocks, Capabilities::all());
    let mut handle = controller.start();
    handle.wait().await.unwrap();

    assert_eq!(handle.state(), PipelineState::Done);
    assert_eq!(handle.status(), WorkerStatus::Succeeded);
    assert_eq!(registry.len(), 2);

    for index in 0..2 {
        assert!(workspace.fused_path(index).exists());
        assert!(
            workspace
                .mesh_path(index, fixture.config.mesher)
                .exists()
        );
    }

    // Fusion minimum clamps to registered images + 1 for the small
    // reconstruction and keeps the configured value for the large one.
    let seen = mocks.fusion_min_pixels.lock().unwrap().clone();
    assert_eq!(seen, vec![4, 5]);
}

#[tokio::test]
async fn test_dense_fail_fast_without_gpu_spans_reconstructions() {
    let fixture = fixture();
    let mut mocks = MockSet::new();
    mocks.mapper_models = vec![model(4), model(6)];

    let (controller, _registry) = controller(fixture.config.clone(), &mocks, Capabilities::none());
    controller.run().await.unwrap();

    // The stage terminates after the first undistortion; the second
    // reconstruction is never touched.
    assert_eq!(mocks.undistort_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.stereo_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.fuse_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.mesh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_delaunay_meshing_fail_fast_without_geometry_library() {
    let fixture = fixture();
    let workspace = Workspace::new(&fixture.config.workspace_path);
    let mut mocks = MockSet::new();
    mocks.mapper_models = vec![model(4), model(6)];

    let mut config = fixture.config.clone();
    config.mesher = photomesh::config::MesherKind::Delaunay;

    let capabilities = Capabilities {
        gpu_stereo: true,
        delaunay_meshing: false,
    };
    let (controller, _registry) = controller(config, &mocks, capabilities);
    controller.run().await.unwrap();

    // Stereo and fusion ran for the first reconstruction, then the stage
    // ended at the meshing step; the second reconstruction never started.
    assert_eq!(mocks.undistort_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.stereo_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.fuse_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.mesh_calls.load(Ordering::SeqCst), 0);
    assert!(workspace.fused_path(0).exists());
    assert!(!workspace
        .mesh_path(0, photomesh::config::MesherKind::Delaunay)
        .exists());
}

#[tokio::test]
async fn test_cancellation_between_dense_sub_steps() {
    let fixture = fixture();
    let mut mocks = MockSet::new();
    mocks.mapper_models = vec![model(4), model(6)];
    mocks.undistorter_cancels = true;

    let (controller, _registry) = controller(fixture.config.clone(), &mocks, Capabilities::all());
    let mut handle = controller.start();
    handle.wait().await.unwrap();

    assert_eq!(handle.state(), PipelineState::Stopped);
    // The stop was observed after undistortion: no later sub-step runs,
    // for this reconstruction or any following one.
    assert_eq!(mocks.undistort_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.stereo_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.fuse_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.mesh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_during_extraction_prevents_later_stages() {
    let fixture = fixture();
    let mut mocks = MockSet::new();
    mocks.extractor_waits_for_cancel = true;

    let (controller, _registry) = controller(fixture.config.clone(), &mocks, Capabilities::all());
    let mut handle = controller.start();

    for _ in 0..200 {
        if handle.state() == PipelineState::Extracting {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(handle.state(), PipelineState::Extracting);

    handle.stop();
    assert!(handle.is_stopped());
    handle.wait().await.unwrap();

    assert_eq!(handle.state(), PipelineState::Stopped);
    assert_eq!(handle.status(), WorkerStatus::Stopped);
    assert_eq!(mocks.extract_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.exhaustive_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.sequential_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.mapper_runs.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.undistort_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_stages_are_skipped() {
    let fixture = fixture();
    let mocks = MockSet::new();

    let mut config = fixture.config.clone();
    config.extraction = false;
    config.matching = false;
    config.sparse = false;
    config.dense = false;

    let (controller, _registry) = controller(config, &mocks, Capabilities::all());
    let mut handle = controller.start();
    handle.wait().await.unwrap();

    assert_eq!(handle.state(), PipelineState::Done);
    assert_eq!(mocks.extract_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.exhaustive_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.mapper_runs.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.undistort_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_video_corpus_selects_sequential_matcher() {
    let fixture = fixture();
    let mut mocks = MockSet::new();
    mocks.probe_num_images = 500;

    let mut config = fixture.config.clone();
    config.data_type = DataType::Video;
    config.sparse = false;
    config.dense = false;

    let (controller, _registry) = controller(config, &mocks, Capabilities::all());
    controller.run().await.unwrap();

    assert_eq!(mocks.sequential_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.exhaustive_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.vocab_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_large_corpus_with_tree_selects_vocab_matcher() {
    let fixture = fixture();
    let mut mocks = MockSet::new();
    mocks.probe_num_images = 200;

    let mut config = fixture.config.clone();
    config.data_type = DataType::InternetPhotos;
    config.vocab_tree_path = Some(PathBuf::from("/trees/words.bin"));
    config.sparse = false;
    config.dense = false;

    let (controller, _registry) = controller(config, &mocks, Capabilities::all());
    controller.run().await.unwrap();

    assert_eq!(mocks.vocab_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.exhaustive_calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.sequential_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_work() {
    let image_dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new("/definitely/not/here", image_dir.path());
    let mocks = MockSet::new();
    let registry = Arc::new(ReconstructionRegistry::new());

    let result = ReconstructionController::new(config, mocks.collaborators(), registry);
    assert!(result.is_err());
    assert_eq!(mocks.extract_calls.load(Ordering::SeqCst), 0);
}
