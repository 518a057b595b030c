//! Compiled-in capability flags.
//!
//! Dense stereo needs GPU support and Delaunay meshing needs the optional
//! geometry library; both are build-time decisions surfaced through cargo
//! features. The orchestration core branches on these flags but never
//! probes hardware itself. A missing capability is a graceful-degradation
//! path, not an error: the affected stage logs a warning and ends early.

/// Which optional build capabilities are present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Patch-match stereo support (`gpu-stereo` feature).
    pub gpu_stereo: bool,
    /// Delaunay meshing support (`delaunay` feature).
    pub delaunay_meshing: bool,
}

impl Capabilities {
    /// Capabilities compiled into this build.
    pub const fn compiled() -> Self {
        Self {
            gpu_stereo: cfg!(feature = "gpu-stereo"),
            delaunay_meshing: cfg!(feature = "delaunay"),
        }
    }

    /// All capabilities present, regardless of build features.
    pub const fn all() -> Self {
        Self {
            gpu_stereo: true,
            delaunay_meshing: true,
        }
    }

    /// No optional capabilities present.
    pub const fn none() -> Self {
        Self {
            gpu_stereo: false,
            delaunay_meshing: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::compiled()
    }
}
