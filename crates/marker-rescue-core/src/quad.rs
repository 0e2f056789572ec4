//! Corner quadrilaterals and region-of-interest arithmetic.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four marker corners in image-pixel coordinates, in the upstream
/// detector's corner order (top-left, top-right, bottom-right, bottom-left).
///
/// The 4x2 shape is fixed by the type, so a malformed candidate can only
/// fail the finiteness or bounds checks, never the shape check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point2<f32>; 4]);

/// An axis-aligned pixel rectangle clipped to an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoiRect {
    pub x0: usize,
    pub y0: usize,
    pub width: usize,
    pub height: usize,
}

impl Quad {
    #[inline]
    pub fn points(&self) -> &[Point2<f32>; 4] {
        &self.0
    }

    /// All coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// All corners lie inside `[0, width) x [0, height)`.
    pub fn in_bounds(&self, width: usize, height: usize) -> bool {
        let (w, h) = (width as f32, height as f32);
        self.0
            .iter()
            .all(|p| p.x >= 0.0 && p.y >= 0.0 && p.x < w && p.y < h)
    }

    /// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)`.
    pub fn bounding_box(&self) -> (f32, f32, f32, f32) {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for p in &self.0 {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        (min_x, min_y, max_x, max_y)
    }

    /// Bounding box grown by `expand_px` on each side and clipped to the
    /// image. Returns `None` when the clipped rectangle is empty.
    pub fn expanded_roi(&self, expand_px: u32, width: usize, height: usize) -> Option<RoiRect> {
        let (min_x, min_y, max_x, max_y) = self.bounding_box();
        let e = expand_px as f32;

        let x0 = ((min_x - e).floor().max(0.0)) as usize;
        let y0 = ((min_y - e).floor().max(0.0)) as usize;
        let x1 = ((max_x + e).ceil() as i64).clamp(0, width as i64) as usize;
        let y1 = ((max_y + e).ceil() as i64).clamp(0, height as i64) as usize;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(RoiRect {
            x0,
            y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    /// Shift every corner by `(dx, dy)`.
    pub fn translated(&self, dx: f32, dy: f32) -> Quad {
        Quad(self.0.map(|p| Point2::new(p.x + dx, p.y + dy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad_at(x: f32, y: f32, side: f32) -> Quad {
        Quad([
            Point2::new(x, y),
            Point2::new(x + side, y),
            Point2::new(x + side, y + side),
            Point2::new(x, y + side),
        ])
    }

    #[test]
    fn bounds_check_rejects_edge_coordinates() {
        let q = unit_quad_at(10.0, 10.0, 30.0);
        assert!(q.in_bounds(41, 41));
        assert!(!q.in_bounds(40, 41)); // 40.0 == width is outside
    }

    #[test]
    fn nan_corner_is_not_finite() {
        let mut q = unit_quad_at(0.0, 0.0, 5.0);
        q.0[2].y = f32::NAN;
        assert!(!q.is_finite());
    }

    #[test]
    fn roi_is_clipped_to_image() {
        let q = unit_quad_at(5.0, 5.0, 10.0);
        let roi = q.expanded_roi(20, 100, 18).expect("roi");
        assert_eq!(roi.x0, 0);
        assert_eq!(roi.y0, 0);
        assert_eq!(roi.width, 35);
        assert_eq!(roi.height, 18);
    }

    #[test]
    fn roi_outside_image_is_none() {
        let q = unit_quad_at(200.0, 200.0, 10.0);
        assert!(q.expanded_roi(5, 100, 100).is_none());
    }

    #[test]
    fn translate_round_trips() {
        let q = unit_quad_at(3.0, 4.0, 7.0);
        let back = q.translated(11.0, -2.0).translated(-11.0, 2.0);
        assert_eq!(q, back);
    }
}
