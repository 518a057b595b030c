//! External reconstruction toolbox integration.
//!
//! The orchestration core never implements reconstruction numerics; this
//! module wires every collaborator contract to subcommands of an
//! installed COLMAP-compatible toolbox binary. Cancellation is honored by
//! killing the child process when the stage token fires, which the
//! toolbox tolerates because all of its outputs are written to
//! deterministic workspace paths that the resume rules re-check.

mod adapters;
mod command;

use crate::config::PipelineConfig;
use crate::pipeline::Collaborators;
use adapters::{
    ImageFolderProbe, MatcherCommand, ToolboxDelaunayMesher, ToolboxExtractor, ToolboxFuser,
    ToolboxMapper, ToolboxMatcher, ToolboxPoissonMesher, ToolboxStereoMatcher,
    ToolboxUndistorter,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Staging directory for mapper output, relative to the workspace root.
const MAPPER_STAGING_DIR: &str = ".sparse-staging";

/// Factory for toolbox-backed collaborators.
#[derive(Clone, Debug)]
pub struct Toolbox {
    binary: PathBuf,
}

impl Toolbox {
    /// Uses `binary` (a name resolved via `PATH`, or an absolute path)
    /// for every subcommand.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Assembles the full collaborator set for one run.
    ///
    /// The vocabulary-tree matcher is wired only when the configuration
    /// names a tree; the matcher selector never picks it otherwise.
    pub fn collaborators(&self, config: &PipelineConfig) -> Collaborators {
        let binary = &self.binary;
        Collaborators {
            extractor: Arc::new(ToolboxExtractor {
                binary: binary.clone(),
            }),
            database: Arc::new(ImageFolderProbe {
                image_path: config.image_path.clone(),
            }),
            exhaustive_matcher: Arc::new(ToolboxMatcher {
                binary: binary.clone(),
                command: MatcherCommand::Exhaustive,
            }),
            sequential_matcher: Arc::new(ToolboxMatcher {
                binary: binary.clone(),
                command: MatcherCommand::Sequential,
            }),
            vocab_tree_matcher: config.vocab_tree_path.as_ref().map(|_| {
                Arc::new(ToolboxMatcher {
                    binary: binary.clone(),
                    command: MatcherCommand::VocabTree,
                }) as Arc<dyn crate::pipeline::FeatureMatcher>
            }),
            mapper: Arc::new(ToolboxMapper {
                binary: binary.clone(),
                staging: config.workspace_path.join(MAPPER_STAGING_DIR),
            }),
            undistorter: Arc::new(ToolboxUndistorter {
                binary: binary.clone(),
            }),
            stereo_matcher: Arc::new(ToolboxStereoMatcher {
                binary: binary.clone(),
            }),
            fuser: Arc::new(ToolboxFuser {
                binary: binary.clone(),
            }),
            poisson_mesher: Arc::new(ToolboxPoissonMesher {
                binary: binary.clone(),
            }),
            delaunay_mesher: Arc::new(ToolboxDelaunayMesher {
                binary: binary.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocab_matcher_wired_only_with_tree() {
        let toolbox = Toolbox::new("colmap");

        let config = PipelineConfig::new("/ws", "/img");
        assert!(toolbox.collaborators(&config).vocab_tree_matcher.is_none());

        let mut config = PipelineConfig::new("/ws", "/img");
        config.vocab_tree_path = Some(PathBuf::from("/trees/words.bin"));
        assert!(toolbox.collaborators(&config).vocab_tree_matcher.is_some());
    }
}
