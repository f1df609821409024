//! beadtrack-core — bead tracking and optical-trap stiffness estimation.
//!
//! Processes microscopy footage of an optically trapped bead. The pipeline
//! stages are:
//!
//! 1. **Source** – decoded frames arrive one at a time from a [`FrameSource`].
//! 2. **Threshold** – per-pixel marker classification inside a search window.
//! 3. **Tracker** – per-frame centroid of the qualifying pixels, with
//!    multiplicative window growth while the marker is lost.
//! 4. **Stiffness** – equipartition-theorem trap stiffness with propagated
//!    uncertainty, computed from the completed trajectory.
//!
//! The tracker runs once over the full frame range and hands the finished
//! [`Trajectory`] to the estimator as a batch; there is no streaming path.

pub mod annotate;
pub mod frame;
pub mod source;
pub mod stiffness;
pub mod threshold;
pub mod tracker;
pub mod window;

pub use frame::{Channel, Frame, PixelFormat};
pub use source::{FrameSource, FrameSourceError, MemorySource};
pub use stiffness::{estimate, EstimateConfig, EstimateError, StiffnessReport, BOLTZMANN};
pub use tracker::{track, TrackConfig, TrackError, Trajectory};
pub use window::SearchWindow;

/// Combined result of a full tracking + estimation pass.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    /// Centroid trajectory over the analyzed frame range.
    pub trajectory: Trajectory,
    /// Stiffness estimate derived from the trajectory.
    pub report: StiffnessReport,
}
