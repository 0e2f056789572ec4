//! Pyramidal Lucas-Kanade point tracking.
//!
//! The motion propagation path of marker recovery: track a handful of
//! corner points from the previous frame's ROI crop into the current one.
//! Translational model, coarse-to-fine over an image pyramid, per-point
//! status and residual reporting.

mod lk;
mod pyramid;

pub use lk::{FlowParams, PointTracker, TrackStatus, TrackedPoint};
pub use pyramid::Pyramid;
