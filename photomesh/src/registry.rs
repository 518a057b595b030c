//! Shared registry of completed sparse reconstructions.
//!
//! The sparse mapping stage appends reconstructions as the incremental
//! mapper emits them (or as they are re-read from disk on resume); the
//! dense mapping stage then consumes them by index, in order. The registry
//! is single-writer during sparse mapping and read-only afterwards, and it
//! is shared by `Arc` so it outlives the controller that filled it.

use std::sync::{PoisonError, RwLock};

/// Summary of one independent sparse reconstruction.
///
/// The reconstruction data itself (camera poses, 3D points) lives on disk
/// and is owned by the external collaborators; the registry only tracks
/// what the orchestration core needs for scheduling decisions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconstruction {
    /// Number of images registered into this reconstruction.
    pub num_registered_images: usize,
    /// Number of triangulated 3D points.
    pub num_points: usize,
}

/// Ordered, append-only collection of sparse reconstructions.
#[derive(Debug, Default)]
pub struct ReconstructionRegistry {
    inner: RwLock<Vec<Reconstruction>>,
}

impl ReconstructionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reconstruction, returning its registry index.
    pub fn push(&self, reconstruction: Reconstruction) -> usize {
        let mut inner = self.write();
        inner.push(reconstruction);
        inner.len() - 1
    }

    /// Returns the reconstruction at `index`, if present.
    pub fn get(&self, index: usize) -> Option<Reconstruction> {
        self.read().get(index).cloned()
    }

    /// Number of reconstructions recorded so far.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no reconstructions have been recorded.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns an ordered copy of all reconstructions.
    ///
    /// The dense stage snapshots the registry once at entry; the registry
    /// is read-only by then, so the copy cannot go stale.
    pub fn snapshot(&self) -> Vec<Reconstruction> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Reconstruction>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Reconstruction>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(images: usize) -> Reconstruction {
        Reconstruction {
            num_registered_images: images,
            num_points: images * 100,
        }
    }

    #[test]
    fn test_push_preserves_order() {
        let registry = ReconstructionRegistry::new();
        assert_eq!(registry.push(rec(3)), 0);
        assert_eq!(registry.push(rec(7)), 1);
        assert_eq!(registry.push(rec(5)), 2);

        let all = registry.snapshot();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].num_registered_images, 3);
        assert_eq!(all[1].num_registered_images, 7);
        assert_eq!(all[2].num_registered_images, 5);
    }

    #[test]
    fn test_get_out_of_range() {
        let registry = ReconstructionRegistry::new();
        registry.push(rec(1));
        assert!(registry.get(0).is_some());
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn test_empty() {
        let registry = ReconstructionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        registry.push(rec(2));
        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 1);
    }
}
