//! photomesh - resumable automatic photogrammetry pipeline.
//!
//! This library orchestrates the four stages of image-based 3D
//! reconstruction (feature extraction, feature matching, sparse mapping,
//! dense mapping) over a persistent workspace directory. The numeric
//! algorithms themselves are external collaborators behind narrow trait
//! contracts; this crate is the stateful scheduler: stage ordering,
//! per-dataset algorithm selection, checkpoint/resume from the workspace,
//! cooperative cancellation and graceful degradation when optional build
//! capabilities are missing.
//!
//! # High-level API
//!
//! ```ignore
//! use photomesh::config::PipelineConfig;
//! use photomesh::pipeline::ReconstructionController;
//! use photomesh::registry::ReconstructionRegistry;
//! use photomesh::toolbox::Toolbox;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::new("/data/workspace", "/data/images");
//! let collaborators = Toolbox::new("colmap").collaborators(&config);
//! let registry = Arc::new(ReconstructionRegistry::new());
//!
//! let controller = ReconstructionController::new(config, collaborators, registry)?;
//! let mut handle = controller.start();
//!
//! // From another task: handle.stop();
//! handle.wait().await?;
//! ```

pub mod capabilities;
pub mod config;
pub mod pipeline;
pub mod registry;
pub mod toolbox;
pub mod worker;
pub mod workspace;
