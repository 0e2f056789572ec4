//! Recovery of missing fiducial-marker detections.
//!
//! When the upstream detector loses a marker for a few frames, this crate
//! decides per marker whether to propagate its last known position with
//! optical flow, re-acquire it from a stored visual template via feature
//! matching and a robust homography fit, or give up for the frame. Every
//! recovered quad can be re-decoded and checked against the expected id
//! before it is accepted.
//!
//! ## Quickstart
//!
//! ```no_run
//! use marker_rescue::{MarkerRescue, RescueConfig};
//! use std::collections::{BTreeSet, HashMap};
//!
//! let mut cfg = RescueConfig::default();
//! cfg.enabled = true;
//! cfg.template_dir = "templates/markers".into();
//!
//! let mut rescue = MarkerRescue::from_config(cfg);
//! let expected: BTreeSet<u32> = [0, 1, 2].into_iter().collect();
//!
//! // Per frame: `detected` comes from the primary detector.
//! let detected = HashMap::new();
//! let frame = image::RgbImage::new(640, 480);
//! let (merged, attempts) = rescue.recover_missing_rgb(&frame, &detected, &expected);
//! println!("{} markers, {} attempts", merged.len(), attempts.len());
//! ```
//!
//! ## API map
//! - [`MarkerRescue`]: the orchestrator and sole entry point.
//! - [`RescueConfig`]: immutable configuration snapshot.
//! - [`TemplateStore`] / [`MarkerTemplate`]: cached per-marker appearance.
//! - [`MarkerIdDecoder`]: capability seam for identity verification
//!   (implemented by `marker_rescue_aruco::PatchVerifier`).
//! - [`RescueReport`] / [`annotate_frame`]: optional debug artifacts.

pub use marker_rescue_aruco as aruco;
pub use marker_rescue_core as core;
pub use marker_rescue_features as features;
pub use marker_rescue_flow as flow;

mod config;
mod reacquire;
mod report;
mod rescue;
mod state;
mod template;
mod track;
mod verify;

pub use config::{MatchDevice, RescueConfig, RescueIoError};
pub use marker_rescue_core::Quad;
pub use report::RescueReport;
pub use rescue::MarkerRescue;
pub use state::{RecoveryAttempt, RecoverySource, TrackerState};
pub use template::{MarkerTemplate, TemplateStore};
pub use verify::MarkerIdDecoder;

#[cfg(feature = "image")]
pub use report::annotate_frame;
