//! Per-marker temporal state and per-frame attempt records.

use marker_rescue_core::{GrayImage, Homography, Quad};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a marker's corners entered the per-frame output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoverySource {
    /// Reported by the upstream detector this frame.
    Direct,
    /// Propagated from the previous position by optical flow.
    Tracked,
    /// Re-derived from the stored template by feature matching.
    Reacquired,
}

/// Last known state of one marker, used for motion propagation.
///
/// Overwritten whenever the marker is accepted into a frame's output
/// (directly detected or recovered); never deleted, so stale entries simply
/// fail the age gate later.
#[derive(Clone, Debug)]
pub struct TrackerState {
    pub marker_id: u32,
    /// Corners at the last accepted position, full-frame pixels.
    pub last_corners: Quad,
    /// Frame counter value when the marker was last accepted; non-decreasing.
    pub last_seen_frame_index: u64,
    /// Grayscale snapshot of that frame, shared between markers seen on it.
    pub last_gray: Arc<GrayImage>,
}

/// Record of one marker's outcome this frame.
///
/// One record per directly detected marker and one per *executed* recovery
/// attempt; skipped markers (no capability, rate-limited, over the per-frame
/// cap) produce no record. `corners` is `None` for failed attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub marker_id: u32,
    pub corners: Option<Quad>,
    pub source: RecoverySource,
    pub inlier_count: usize,
    /// In `[0, 1]`; tracking error or inlier ratio depending on the source.
    pub match_quality: f32,
    /// Present only for re-acquired results.
    pub homography: Option<Homography>,
}

impl RecoveryAttempt {
    /// Record for a directly detected marker.
    pub(crate) fn direct(marker_id: u32, corners: Quad) -> Self {
        Self {
            marker_id,
            corners: Some(corners),
            source: RecoverySource::Direct,
            inlier_count: 0,
            match_quality: 1.0,
            homography: None,
        }
    }

    /// Record for an executed attempt that produced nothing.
    pub(crate) fn failed(marker_id: u32, source: RecoverySource) -> Self {
        Self {
            marker_id,
            corners: None,
            source,
            inlier_count: 0,
            match_quality: 0.0,
            homography: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RecoverySource::Reacquired).expect("json"),
            "\"reacquired\""
        );
    }

    #[test]
    fn attempt_round_trips_through_json() {
        let quad = Quad([
            Point2::new(1.0, 2.0),
            Point2::new(3.0, 2.0),
            Point2::new(3.0, 4.0),
            Point2::new(1.0, 4.0),
        ]);
        let attempt = RecoveryAttempt {
            marker_id: 7,
            corners: Some(quad),
            source: RecoverySource::Tracked,
            inlier_count: 4,
            match_quality: 0.93,
            homography: None,
        };
        let json = serde_json::to_string(&attempt).expect("serialize");
        let back: RecoveryAttempt = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.marker_id, 7);
        assert_eq!(back.source, RecoverySource::Tracked);
        assert_eq!(back.corners, Some(quad));
    }
}
