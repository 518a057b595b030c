//! Workspace filesystem layout and checkpoint markers.
//!
//! All pipeline state that must survive a restart lives under a single
//! workspace directory with a fixed layout:
//!
//! ```text
//! <workspace>/database.db            feature/match database
//! <workspace>/sparse/<n>/            one directory per sparse reconstruction
//! <workspace>/sparse/project.json    configuration snapshot
//! <workspace>/dense/<i>/             undistorted images and camera files
//! <workspace>/dense/<i>/fused.ply    fused point cloud
//! <workspace>/dense/<i>/fused.ply.vis  per-point visibility record
//! <workspace>/dense/<i>/meshed-poisson.ply  (or meshed-delaunay.ply)
//! ```
//!
//! The presence of these outputs is the durable source of truth for
//! resumability: existing sparse model directories skip sparse mapping,
//! and an existing fused cloud plus mesh skips that reconstruction's
//! dense pass. Completed checkpoints additionally record a small
//! versioned marker file for provenance; the skip rules stay keyed on
//! output presence so externally produced workspaces still resume.

use crate::config::MesherKind;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// File name of the feature database inside the workspace.
pub const DATABASE_FILE: &str = "database.db";

/// File name of the fused point cloud inside a dense model directory.
pub const FUSED_FILE: &str = "fused.ply";

/// File name of the configuration snapshot written next to sparse output.
pub const PROJECT_SNAPSHOT_FILE: &str = "project.json";

/// Deterministic path layout rooted at one workspace directory.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn sparse_root(&self) -> PathBuf {
        self.root.join("sparse")
    }

    /// Directory of sparse reconstruction `index`.
    pub fn sparse_model_dir(&self, index: usize) -> PathBuf {
        self.sparse_root().join(index.to_string())
    }

    pub fn project_snapshot_path(&self) -> PathBuf {
        self.sparse_root().join(PROJECT_SNAPSHOT_FILE)
    }

    pub fn dense_root(&self) -> PathBuf {
        self.root.join("dense")
    }

    /// Dense working directory of reconstruction `index`.
    pub fn dense_model_dir(&self, index: usize) -> PathBuf {
        self.dense_root().join(index.to_string())
    }

    pub fn fused_path(&self, index: usize) -> PathBuf {
        self.dense_model_dir(index).join(FUSED_FILE)
    }

    /// Visibility record written next to the fused point cloud.
    pub fn fused_visibility_path(&self, index: usize) -> PathBuf {
        self.dense_model_dir(index).join(format!("{FUSED_FILE}.vis"))
    }

    pub fn mesh_path(&self, index: usize, mesher: MesherKind) -> PathBuf {
        self.dense_model_dir(index).join(mesher.mesh_file_name())
    }

    /// Lists existing sparse model directories in lexicographic name order.
    ///
    /// Returns an empty list when the sparse root does not exist yet. The
    /// lexicographic order is what resume relies on to rebuild the registry
    /// with the same indices as the run that produced the directories.
    pub fn list_sparse_model_dirs(&self) -> io::Result<Vec<PathBuf>> {
        let sparse_root = self.sparse_root();
        if !sparse_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&sparse_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

/// Current checkpoint marker format version.
pub const CHECKPOINT_VERSION: u32 = 1;

const CHECKPOINT_FILE: &str = ".checkpoint.json";

/// Versioned record that a checkpointed stage completed.
///
/// Written next to the stage's output on completion. Markers are
/// provenance, not gates: resume decisions are made from output presence,
/// and a marker without its outputs is ignored.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct CheckpointMarker {
    pub version: u32,
    pub stage: String,
}

impl CheckpointMarker {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            stage: stage.into(),
        }
    }

    /// Writes the marker into `dir`.
    pub fn write(&self, dir: &Path) -> io::Result<()> {
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(dir.join(CHECKPOINT_FILE), body)
    }

    /// Reads the marker from `dir`, if one exists and parses.
    pub fn read(dir: &Path) -> Option<Self> {
        let body = std::fs::read_to_string(dir.join(CHECKPOINT_FILE)).ok()?;
        serde_json::from_str(&body).ok()
    }
}
