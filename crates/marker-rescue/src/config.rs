//! Recovery configuration: an immutable snapshot taken at construction.

use marker_rescue_features::FeatureParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum RescueIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Backend the feature matcher runs on.
///
/// Only the CPU backend exists in this workspace; the enum is the seam an
/// accelerated implementation would extend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchDevice {
    #[default]
    Cpu,
}

/// Settings for the recovery subsystem.
///
/// Every field has a serde default, so partial JSON configs deserialize with
/// the remaining fields at their documented defaults. The struct is not
/// mutated after the orchestrator is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RescueConfig {
    /// Master switch; when false the orchestrator is a cheap pass-through.
    #[serde(default)]
    pub enabled: bool,
    /// Matcher backend selector.
    #[serde(default)]
    pub device: MatchDevice,
    /// Directory holding one template image per marker, named `id_<ID>.<ext>`.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Minimum valid matches and minimum geometric inliers for re-acquisition.
    #[serde(default = "default_min_inliers")]
    pub min_inliers: usize,
    /// Maximum age (frames since last seen) for motion tracking.
    #[serde(default = "default_max_age_frames")]
    pub max_age_frames: u64,
    /// ROI expansion around the last known corners, in pixels per side.
    #[serde(default = "default_roi_expand_px")]
    pub roi_expand_px: u32,
    /// Re-decode recovered quads and require the expected id.
    #[serde(default = "default_true")]
    pub verify_id: bool,
    /// Hard cap on recovery attempts per frame.
    #[serde(default = "default_max_fallback")]
    pub max_fallback_markers_per_frame: usize,
    /// Minimum frames between template re-acquire attempts per marker.
    #[serde(default = "default_reacquire_interval")]
    pub reacquire_interval_frames: u64,
    /// Search a region around the last known position (3x the tracking ROI
    /// expansion) before falling back to the full frame.
    #[serde(default = "default_true")]
    pub prefer_roi_matching: bool,
    /// Refine accepted corners to sub-pixel accuracy.
    #[serde(default = "default_true")]
    pub corner_refine: bool,
    /// Descriptor match gate as a fraction of the descriptor bit count.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    /// Feature detection/description settings shared by templates and frames.
    #[serde(default)]
    pub features: FeatureParams,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates/markers")
}

fn default_min_inliers() -> usize {
    4
}

fn default_max_age_frames() -> u64 {
    5
}

fn default_roi_expand_px() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

fn default_max_fallback() -> usize {
    2
}

fn default_reacquire_interval() -> u64 {
    5
}

fn default_match_threshold() -> f32 {
    0.2
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device: MatchDevice::Cpu,
            template_dir: default_template_dir(),
            min_inliers: default_min_inliers(),
            max_age_frames: default_max_age_frames(),
            roi_expand_px: default_roi_expand_px(),
            verify_id: true,
            max_fallback_markers_per_frame: default_max_fallback(),
            reacquire_interval_frames: default_reacquire_interval(),
            prefer_roi_matching: true,
            corner_refine: true,
            match_threshold: default_match_threshold(),
            features: FeatureParams::default(),
        }
    }
}

impl RescueConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RescueIoError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RescueIoError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
