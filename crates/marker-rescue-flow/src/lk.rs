//! Iterative translational Lucas-Kanade over a pyramid.

use crate::Pyramid;
use marker_rescue_core::{sample_bilinear, GrayImageView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Outcome of tracking one point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Converged to an in-bounds position.
    Tracked,
    /// Solver diverged or the local gradient system was singular.
    Lost,
    /// Final position fell outside the current image.
    OutOfBounds,
}

/// A tracked point with its final position and residual.
#[derive(Clone, Copy, Debug)]
pub struct TrackedPoint {
    pub position: Point2<f32>,
    pub status: TrackStatus,
    /// Mean absolute intensity error over the window at the final position,
    /// in raw gray levels (0..255). Meaningful only when `Tracked`.
    pub residual: f32,
}

/// Tracking settings; the defaults mirror a 21x21 window, 3 pyramid levels
/// and 30 iterations per level.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FlowParams {
    /// Window half-size; the correlation window is `(2r+1) x (2r+1)`.
    pub window_radius: usize,
    pub max_levels: usize,
    /// Gauss-Newton iterations per pyramid level.
    pub max_iters: usize,
    /// Convergence threshold on one update step, in pixels.
    pub epsilon: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            window_radius: 10,
            max_levels: 3,
            max_iters: 30,
            epsilon: 0.01,
        }
    }
}

/// Tracks individual points between two frames.
pub struct PointTracker {
    params: FlowParams,
}

enum LevelResult {
    Converged(f32, f32),
    MaxIter(f32, f32),
    Singular,
}

impl PointTracker {
    pub fn new(params: FlowParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &FlowParams {
        &self.params
    }

    /// Track `points` from `prev` into `curr`.
    ///
    /// Both images must have identical dimensions. One result per input
    /// point, index-aligned.
    pub fn track_points(
        &self,
        prev: &GrayImageView<'_>,
        curr: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Vec<TrackedPoint> {
        if prev.width != curr.width || prev.height != curr.height {
            return points
                .iter()
                .map(|&p| TrackedPoint {
                    position: p,
                    status: TrackStatus::Lost,
                    residual: f32::INFINITY,
                })
                .collect();
        }

        let prev_pyr = Pyramid::build(prev, self.params.max_levels);
        let curr_pyr = Pyramid::build(curr, self.params.max_levels);
        let levels = prev_pyr.num_levels().min(curr_pyr.num_levels());

        points
            .iter()
            .map(|&p| self.track_single(&prev_pyr, &curr_pyr, p, levels))
            .collect()
    }

    fn track_single(
        &self,
        prev_pyr: &Pyramid,
        curr_pyr: &Pyramid,
        point: Point2<f32>,
        levels: usize,
    ) -> TrackedPoint {
        let mut dx = 0.0f32;
        let mut dy = 0.0f32;

        for level in (0..levels).rev() {
            let prev = prev_pyr.levels[level].as_view();
            let curr = curr_pyr.levels[level].as_view();
            let scale = 1.0 / (1u32 << level) as f32;
            let px = point.x * scale;
            let py = point.y * scale;

            match self.solve_level(&prev, &curr, px, py, dx, dy) {
                LevelResult::Converged(nx, ny) | LevelResult::MaxIter(nx, ny) => {
                    dx = nx;
                    dy = ny;
                }
                LevelResult::Singular => {
                    return TrackedPoint {
                        position: point,
                        status: TrackStatus::Lost,
                        residual: f32::INFINITY,
                    };
                }
            }

            if level > 0 {
                dx *= 2.0;
                dy *= 2.0;
            }
        }

        let full = prev_pyr.levels[0].as_view();
        let position = Point2::new(point.x + dx, point.y + dy);
        let in_bounds = position.x >= 0.0
            && position.y >= 0.0
            && position.x < full.width as f32
            && position.y < full.height as f32;

        if !in_bounds {
            return TrackedPoint {
                position,
                status: TrackStatus::OutOfBounds,
                residual: f32::INFINITY,
            };
        }

        let residual = self.window_residual(
            &full,
            &curr_pyr.levels[0].as_view(),
            point.x,
            point.y,
            dx,
            dy,
        );
        TrackedPoint {
            position,
            status: TrackStatus::Tracked,
            residual,
        }
    }

    /// Forward-additive LK at one pyramid level: gradients taken at the
    /// warped position in the current frame, 2x2 normal equations per step.
    fn solve_level(
        &self,
        prev: &GrayImageView<'_>,
        curr: &GrayImageView<'_>,
        px: f32,
        py: f32,
        mut dx: f32,
        mut dy: f32,
    ) -> LevelResult {
        let r = self.params.window_radius as i32;

        for _ in 0..self.params.max_iters {
            let mut h00 = 0.0f32;
            let mut h01 = 0.0f32;
            let mut h11 = 0.0f32;
            let mut b0 = 0.0f32;
            let mut b1 = 0.0f32;

            for oy in -r..=r {
                for ox in -r..=r {
                    let tx = px + ox as f32;
                    let ty = py + oy as f32;
                    let wx = tx + dx;
                    let wy = ty + dy;

                    let e = sample_bilinear(prev, tx, ty) - sample_bilinear(curr, wx, wy);

                    let gx = 0.5
                        * (sample_bilinear(curr, wx + 1.0, wy)
                            - sample_bilinear(curr, wx - 1.0, wy));
                    let gy = 0.5
                        * (sample_bilinear(curr, wx, wy + 1.0)
                            - sample_bilinear(curr, wx, wy - 1.0));

                    h00 += gx * gx;
                    h01 += gx * gy;
                    h11 += gy * gy;
                    b0 += gx * e;
                    b1 += gy * e;
                }
            }

            let det = h00 * h11 - h01 * h01;
            if det.abs() < 1e-6 {
                return LevelResult::Singular;
            }

            let step_x = (h11 * b0 - h01 * b1) / det;
            let step_y = (h00 * b1 - h01 * b0) / det;
            dx += step_x;
            dy += step_y;

            if step_x * step_x + step_y * step_y < self.params.epsilon * self.params.epsilon {
                return LevelResult::Converged(dx, dy);
            }
        }

        LevelResult::MaxIter(dx, dy)
    }

    fn window_residual(
        &self,
        prev: &GrayImageView<'_>,
        curr: &GrayImageView<'_>,
        px: f32,
        py: f32,
        dx: f32,
        dy: f32,
    ) -> f32 {
        let r = self.params.window_radius as i32;
        let mut sum = 0.0f32;
        let mut count = 0.0f32;
        for oy in -r..=r {
            for ox in -r..=r {
                let tx = px + ox as f32;
                let ty = py + oy as f32;
                sum += (sample_bilinear(prev, tx, ty) - sample_bilinear(curr, tx + dx, ty + dy))
                    .abs();
                count += 1.0;
            }
        }
        sum / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_rescue_core::GrayImage;

    fn blob_image(w: usize, h: usize, cx: f32, cy: f32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            (255.0 * (-0.004 * (dx * dx + dy * dy)).exp()) as u8
        })
    }

    #[test]
    fn zero_motion_stays_put() {
        let img = blob_image(96, 96, 48.0, 48.0);
        let tracker = PointTracker::new(FlowParams::default());
        let out = tracker.track_points(
            &img.as_view(),
            &img.as_view(),
            &[Point2::new(48.0, 48.0)],
        );
        assert_eq!(out[0].status, TrackStatus::Tracked);
        assert!((out[0].position.x - 48.0).abs() < 0.5);
        assert!((out[0].position.y - 48.0).abs() < 0.5);
        assert!(out[0].residual < 2.0);
    }

    #[test]
    fn recovers_known_shift() {
        let a = blob_image(96, 96, 44.0, 47.0);
        let b = blob_image(96, 96, 47.0, 45.0);
        let tracker = PointTracker::new(FlowParams::default());
        let out = tracker.track_points(&a.as_view(), &b.as_view(), &[Point2::new(44.0, 47.0)]);
        assert_eq!(out[0].status, TrackStatus::Tracked);
        assert!((out[0].position.x - 47.0).abs() < 0.7, "x = {}", out[0].position.x);
        assert!((out[0].position.y - 45.0).abs() < 0.7, "y = {}", out[0].position.y);
    }

    #[test]
    fn recovers_subpixel_shift() {
        let a = blob_image(96, 96, 48.0, 48.0);
        let b = blob_image(96, 96, 49.5, 48.5);
        let tracker = PointTracker::new(FlowParams::default());
        let out = tracker.track_points(&a.as_view(), &b.as_view(), &[Point2::new(48.0, 48.0)]);
        assert_eq!(out[0].status, TrackStatus::Tracked);
        assert!((out[0].position.x - 49.5).abs() < 0.5);
        assert!((out[0].position.y - 48.5).abs() < 0.5);
    }

    #[test]
    fn flat_region_is_lost() {
        let img = GrayImage::filled(96, 96, 128);
        let tracker = PointTracker::new(FlowParams::default());
        let out = tracker.track_points(
            &img.as_view(),
            &img.as_view(),
            &[Point2::new(48.0, 48.0)],
        );
        assert_eq!(out[0].status, TrackStatus::Lost);
    }

    #[test]
    fn mismatched_frames_fail_all_points() {
        let a = GrayImage::filled(64, 64, 10);
        let b = GrayImage::filled(32, 32, 10);
        let tracker = PointTracker::new(FlowParams::default());
        let out = tracker.track_points(
            &a.as_view(),
            &b.as_view(),
            &[Point2::new(5.0, 5.0), Point2::new(20.0, 20.0)],
        );
        assert!(out.iter().all(|t| t.status == TrackStatus::Lost));
    }

    #[test]
    fn results_align_with_inputs() {
        let a = blob_image(96, 96, 40.0, 40.0);
        let b = blob_image(96, 96, 42.0, 40.0);
        let tracker = PointTracker::new(FlowParams::default());
        let pts = [
            Point2::new(40.0, 40.0),
            Point2::new(41.0, 39.0),
            Point2::new(39.0, 41.0),
        ];
        let out = tracker.track_points(&a.as_view(), &b.as_view(), &pts);
        assert_eq!(out.len(), pts.len());
    }
}
