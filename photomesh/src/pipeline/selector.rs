//! Matching strategy selection.
//!
//! Exhaustive matching compares all image pairs and is O(n^2) in the
//! corpus size; vocabulary-tree retrieval trades completeness for
//! sub-quadratic cost at scale; video corpora exploit temporal locality
//! instead of global retrieval. The decision is a pure function of the
//! dataset category, the image count and whether a vocabulary tree is
//! configured, expressed as a fixed table so the policy constants stay
//! independently testable.

use crate::config::DataType;

/// Corpus size at which retrieval-based matching takes over from
/// exhaustive matching, when a vocabulary tree is available.
pub const VOCAB_TREE_MIN_NUM_IMAGES: usize = 200;

/// Which matching collaborator to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatcherKind {
    /// All-pairs matching.
    Exhaustive,
    /// Adjacent-frame matching with optional loop closure.
    Sequential,
    /// Approximate retrieval via a precomputed vocabulary tree.
    VocabTree,
}

impl std::fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhaustive => write!(f, "exhaustive"),
            Self::Sequential => write!(f, "sequential"),
            Self::VocabTree => write!(f, "vocabulary tree"),
        }
    }
}

/// Selects the matching strategy for one run.
pub fn select_matcher(data_type: DataType, num_images: usize, has_vocab_tree: bool) -> MatcherKind {
    match data_type {
        DataType::Video => MatcherKind::Sequential,
        DataType::IndividualPhotos | DataType::InternetPhotos => {
            if has_vocab_tree && num_images >= VOCAB_TREE_MIN_NUM_IMAGES {
                MatcherKind::VocabTree
            } else {
                MatcherKind::Exhaustive
            }
        }
    }
}
