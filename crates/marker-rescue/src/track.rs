//! Motion propagation: carry a marker's corners forward one frame.

use crate::TrackerState;
use marker_rescue_core::{crop_gray, GrayImageView, Quad};
use marker_rescue_flow::{FlowParams, PointTracker, TrackStatus};
use nalgebra::Point2;

/// Result of one successful propagation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TrackOutcome {
    pub corners: Quad,
    /// Mean optical-flow residual across the four corners, gray levels.
    pub mean_error: f32,
}

/// Optical-flow propagation of the four corner points inside an ROI around
/// the marker's last known position.
pub(crate) struct MotionTracker {
    tracker: PointTracker,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self {
            tracker: PointTracker::new(FlowParams::default()),
        }
    }

    /// Track `state.last_corners` into the current frame.
    ///
    /// Deliberately conservative: all four corners must track successfully
    /// and land inside the frame, otherwise the whole propagation is
    /// rejected and the caller falls through to template re-acquisition.
    pub fn propagate(
        &self,
        state: &TrackerState,
        curr: &GrayImageView<'_>,
        roi_expand_px: u32,
    ) -> Option<TrackOutcome> {
        let prev = state.last_gray.as_view();
        if prev.width != curr.width || prev.height != curr.height {
            log::debug!(
                "marker {}: cached snapshot size differs from current frame",
                state.marker_id
            );
            return None;
        }

        let roi = state
            .last_corners
            .expanded_roi(roi_expand_px, curr.width, curr.height)?;
        let prev_roi = crop_gray(&prev, roi.x0, roi.y0, roi.width, roi.height);
        let curr_roi = crop_gray(curr, roi.x0, roi.y0, roi.width, roi.height);

        let (ox, oy) = (roi.x0 as f32, roi.y0 as f32);
        let roi_points: Vec<Point2<f32>> = state
            .last_corners
            .points()
            .iter()
            .map(|p| Point2::new(p.x - ox, p.y - oy))
            .collect();

        let tracked =
            self.tracker
                .track_points(&prev_roi.as_view(), &curr_roi.as_view(), &roi_points);

        if tracked.iter().any(|t| t.status != TrackStatus::Tracked) {
            log::debug!("marker {}: corner tracking failed", state.marker_id);
            return None;
        }

        let mut corners = [Point2::new(0.0f32, 0.0); 4];
        let mut error_sum = 0.0f32;
        for (slot, t) in corners.iter_mut().zip(&tracked) {
            *slot = Point2::new(t.position.x + ox, t.position.y + oy);
            error_sum += t.residual;
        }
        let corners = Quad(corners);

        if !corners.is_finite() || !corners.in_bounds(curr.width, curr.height) {
            log::debug!(
                "marker {}: tracked corners left the frame",
                state.marker_id
            );
            return None;
        }

        Some(TrackOutcome {
            corners,
            mean_error: error_sum / 4.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_rescue_core::GrayImage;
    use std::sync::Arc;

    /// Textured square patch pasted at (x0, y0) on a mid-gray background.
    fn scene(w: usize, h: usize, x0: usize, y0: usize, side: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                let (tx, ty) = (x - x0, y - y0);
                let v = (tx / 3).wrapping_mul(2654435761) ^ (ty / 3).wrapping_mul(40503);
                (v % 200) as u8
            } else {
                128
            }
        })
    }

    fn quad_at(x0: f32, y0: f32, side: f32) -> Quad {
        Quad([
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ])
    }

    fn state_for(frame: &GrayImage, corners: Quad) -> TrackerState {
        TrackerState {
            marker_id: 1,
            last_corners: corners,
            last_seen_frame_index: 1,
            last_gray: Arc::new(frame.clone()),
        }
    }

    #[test]
    fn follows_a_translated_patch() {
        let prev = scene(200, 160, 60, 50, 48);
        let curr = scene(200, 160, 64, 53, 48);
        let state = state_for(&prev, quad_at(60.0, 50.0, 48.0));

        let out = MotionTracker::new()
            .propagate(&state, &curr.as_view(), 50)
            .expect("tracked");

        for (p, want) in out.corners.points().iter().zip(
            quad_at(64.0, 53.0, 48.0).points(),
        ) {
            assert!((p.x - want.x).abs() < 1.0, "x: {} vs {}", p.x, want.x);
            assert!((p.y - want.y).abs() < 1.0, "y: {} vs {}", p.y, want.y);
        }
        assert!(out.mean_error < 20.0);
    }

    #[test]
    fn rejects_featureless_roi() {
        let prev = GrayImage::filled(200, 160, 128);
        let curr = GrayImage::filled(200, 160, 128);
        let state = state_for(&prev, quad_at(60.0, 50.0, 48.0));
        assert!(MotionTracker::new()
            .propagate(&state, &curr.as_view(), 50)
            .is_none());
    }

    #[test]
    fn rejects_mismatched_frame_sizes() {
        let prev = scene(200, 160, 60, 50, 48);
        let curr = scene(100, 80, 10, 10, 48);
        let state = state_for(&prev, quad_at(60.0, 50.0, 48.0));
        assert!(MotionTracker::new()
            .propagate(&state, &curr.as_view(), 50)
            .is_none());
    }

    #[test]
    fn rejects_corners_leaving_the_frame() {
        // Patch right at the border moving out: tracked corners land outside.
        let prev = scene(200, 160, 150, 110, 48);
        let curr = scene(200, 160, 156, 116, 48);
        let state = state_for(&prev, quad_at(150.0, 110.0, 48.0));
        let out = MotionTracker::new().propagate(&state, &curr.as_view(), 50);
        if let Some(out) = out {
            // If tracking survived, the result must still be inside.
            assert!(out.corners.in_bounds(200, 160));
        }
    }
}
