//! Mock collaborators shared by the integration tests.
//!
//! Every mock counts its invocations so tests can assert exactly which
//! collaborators ran. The mapper and the dense-stage mocks write small
//! placeholder files at the real output paths, which is all the resume
//! rules ever look at.

use photomesh::config::{
    ExtractionOptions, FusionOptions, MapperOptions, MatchingOptions, MeshingOptions,
    StereoOptions, UndistortOptions,
};
use photomesh::pipeline::{
    CollabError, CollabFuture, Collaborators, DatabaseProbe, FeatureExtractor, FeatureMatcher,
    Mesher, SparseMapper, StereoFuser, StereoMatcher, Undistorter,
};
use photomesh::registry::{Reconstruction, ReconstructionRegistry};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Knobs and counters for one mock collaborator set.
///
/// Counters are shared `Arc`s, so several `collaborators()` calls (for
/// several pipeline runs against the same workspace) accumulate into the
/// same counts.
pub struct MockSet {
    /// Image count reported by the database probe.
    pub probe_num_images: usize,
    /// Reconstructions the mapper emits per run.
    pub mapper_models: Vec<Reconstruction>,
    /// Extractor blocks until its cancellation token fires.
    pub extractor_waits_for_cancel: bool,
    /// Undistorter cancels its own token, simulating a stop request
    /// arriving while the sub-step runs.
    pub undistorter_cancels: bool,

    pub extract_calls: Arc<AtomicUsize>,
    pub exhaustive_calls: Arc<AtomicUsize>,
    pub sequential_calls: Arc<AtomicUsize>,
    pub vocab_calls: Arc<AtomicUsize>,
    pub mapper_runs: Arc<AtomicUsize>,
    pub undistort_calls: Arc<AtomicUsize>,
    pub stereo_calls: Arc<AtomicUsize>,
    pub fuse_calls: Arc<AtomicUsize>,
    pub mesh_calls: Arc<AtomicUsize>,
    /// Effective `min_num_pixels` seen by each fusion call, in order.
    pub fusion_min_pixels: Arc<Mutex<Vec<usize>>>,
}

impl MockSet {
    pub fn new() -> Self {
        Self {
            probe_num_images: 50,
            mapper_models: vec![model(5)],
            extractor_waits_for_cancel: false,
            undistorter_cancels: false,
            extract_calls: Arc::new(AtomicUsize::new(0)),
            exhaustive_calls: Arc::new(AtomicUsize::new(0)),
            sequential_calls: Arc::new(AtomicUsize::new(0)),
            vocab_calls: Arc::new(AtomicUsize::new(0)),
            mapper_runs: Arc::new(AtomicUsize::new(0)),
            undistort_calls: Arc::new(AtomicUsize::new(0)),
            stereo_calls: Arc::new(AtomicUsize::new(0)),
            fuse_calls: Arc::new(AtomicUsize::new(0)),
            mesh_calls: Arc::new(AtomicUsize::new(0)),
            fusion_min_pixels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let matcher = |calls: &Arc<AtomicUsize>| -> Arc<dyn FeatureMatcher> {
            Arc::new(MockMatcher {
                calls: Arc::clone(calls),
            })
        };
        Collaborators {
            extractor: Arc::new(MockExtractor {
                calls: Arc::clone(&self.extract_calls),
                wait_for_cancel: self.extractor_waits_for_cancel,
            }),
            database: Arc::new(MockProbe {
                num_images: self.probe_num_images,
            }),
            exhaustive_matcher: matcher(&self.exhaustive_calls),
            sequential_matcher: matcher(&self.sequential_calls),
            vocab_tree_matcher: Some(matcher(&self.vocab_calls)),
            mapper: Arc::new(MockMapper {
                runs: Arc::clone(&self.mapper_runs),
                models: self.mapper_models.clone(),
            }),
            undistorter: Arc::new(MockUndistorter {
                calls: Arc::clone(&self.undistort_calls),
                cancels: self.undistorter_cancels,
            }),
            stereo_matcher: Arc::new(MockStereo {
                calls: Arc::clone(&self.stereo_calls),
            }),
            fuser: Arc::new(MockFuser {
                calls: Arc::clone(&self.fuse_calls),
                min_pixels: Arc::clone(&self.fusion_min_pixels),
            }),
            poisson_mesher: Arc::new(MockMesher {
                calls: Arc::clone(&self.mesh_calls),
            }),
            delaunay_mesher: Arc::new(MockMesher {
                calls: Arc::clone(&self.mesh_calls),
            }),
        }
    }
}

pub fn model(num_registered_images: usize) -> Reconstruction {
    Reconstruction {
        num_registered_images,
        num_points: num_registered_images * 250,
    }
}

struct MockExtractor {
    calls: Arc<AtomicUsize>,
    wait_for_cancel: bool,
}

impl FeatureExtractor for MockExtractor {
    fn extract<'a>(
        &'a self,
        _database_path: &'a Path,
        _options: &'a ExtractionOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.wait_for_cancel {
                cancel.cancelled().await;
            }
            Ok(())
        })
    }
}

struct MockProbe {
    num_images: usize,
}

impl DatabaseProbe for MockProbe {
    fn num_images<'a>(
        &'a self,
        _database_path: &'a Path,
    ) -> CollabFuture<'a, Result<usize, CollabError>> {
        Box::pin(async move { Ok(self.num_images) })
    }
}

struct MockMatcher {
    calls: Arc<AtomicUsize>,
}

impl FeatureMatcher for MockMatcher {
    fn match_features<'a>(
        &'a self,
        _database_path: &'a Path,
        _options: &'a MatchingOptions,
        _cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct MockMapper {
    runs: Arc<AtomicUsize>,
    models: Vec<Reconstruction>,
}

impl SparseMapper for MockMapper {
    fn run<'a>(
        &'a self,
        _options: &'a MapperOptions,
        _image_path: &'a Path,
        _database_path: &'a Path,
        registry: &'a ReconstructionRegistry,
        _cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            for model in &self.models {
                registry.push(model.clone());
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
            let model = self
                .models
                .get(index)
                .ok_or_else(|| CollabError::InvalidModel(format!("no model {index}")))?;
            std::fs::create_dir_all(dir)?;
            std::fs::write(
                dir.join("model.txt"),
                format!("{} {}", model.num_registered_images, model.num_points),
            )?;
            Ok(())
        })
    }

    fn load<'a>(&'a self, dir: &'a Path) -> CollabFuture<'a, Result<Reconstruction, CollabError>> {
        Box::pin(async move {
            let body = std::fs::read_to_string(dir.join("model.txt"))?;
            let mut parts = body.split_whitespace();
            let parse = |token: Option<&str>| {
                token
                    .and_then(|t| t.parse::<usize>().ok())
                    .ok_or_else(|| CollabError::InvalidModel(format!("bad model.txt in {}", dir.display())))
            };
            let num_registered_images = parse(parts.next())?;
            let num_points = parse(parts.next())?;
            Ok(Reconstruction {
                num_registered_images,
                num_points,
            })
        })
    }
}

struct MockUndistorter {
    calls: Arc<AtomicUsize>,
    cancels: bool,
}

impl Undistorter for MockUndistorter {
    fn undistort<'a>(
        &'a self,
        _sparse_dir: &'a Path,
        _image_path: &'a Path,
        dense_dir: &'a Path,
        _options: &'a UndistortOptions,
        cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(dense_dir.join("images"))?;
            std::fs::write(dense_dir.join("images").join("undistorted.txt"), b"ok")?;
            if self.cancels {
                cancel.cancel();
            }
            Ok(())
        })
    }
}

struct MockStereo {
    calls: Arc<AtomicUsize>,
}

impl StereoMatcher for MockStereo {
    fn run<'a>(
        &'a self,
        _dense_dir: &'a Path,
        _options: &'a StereoOptions,
        _cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct MockFuser {
    calls: Arc<AtomicUsize>,
    min_pixels: Arc<Mutex<Vec<usize>>>,
}

impl StereoFuser for MockFuser {
    fn fuse<'a>(
        &'a self,
        _dense_dir: &'a Path,
        fused_path: &'a Path,
        options: &'a FusionOptions,
        _cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.min_pixels
                .lock()
                .unwrap()
                .push(options.min_num_pixels);
            std::fs::write(fused_path, b"ply")?;
            std::fs::write(format!("{}.vis", fused_path.display()), b"vis")?;
            Ok(())
        })
    }
}

struct MockMesher {
    calls: Arc<AtomicUsize>,
}

impl Mesher for MockMesher {
    fn mesh<'a>(
        &'a self,
        _dense_dir: &'a Path,
        _fused_path: &'a Path,
        mesh_path: &'a Path,
        _options: &'a MeshingOptions,
        _cancel: &'a CancellationToken,
    ) -> CollabFuture<'a, Result<(), CollabError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(mesh_path, b"mesh")?;
            Ok(())
        })
    }
}
