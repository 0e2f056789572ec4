//! Sub-pixel corner refinement.
//!
//! Gradient normal-equation iteration: every pixel `q` in a window around
//! the current estimate contributes its gradient outer product, and the
//! stationary point of `sum g g^T (c - q) = 0` is solved for the new corner
//! `c`. Converges to saddle points (checker corners) and stays put on
//! featureless patches, where the system is singular.

use crate::{sample_bilinear, GrayImageView, Quad};
use nalgebra::Point2;

/// Settings for [`refine_corner`].
#[derive(Clone, Copy, Debug)]
pub struct SubpixParams {
    /// Window half-size in pixels; the window is `(2h+1) x (2h+1)`.
    pub half_win: usize,
    pub max_iters: usize,
    /// Stop when one update moves less than this many pixels.
    pub epsilon: f32,
}

impl Default for SubpixParams {
    fn default() -> Self {
        Self {
            half_win: 5,
            max_iters: 30,
            epsilon: 0.001,
        }
    }
}

/// Refine one corner estimate to sub-pixel accuracy.
///
/// Returns the input point unchanged when the local gradient system is
/// singular (flat patch) or the estimate would leave the image.
pub fn refine_corner(img: &GrayImageView<'_>, p: Point2<f32>, params: &SubpixParams) -> Point2<f32> {
    let h = params.half_win as i32;
    let (w, ht) = (img.width as f32, img.height as f32);
    let mut c = p;

    for _ in 0..params.max_iters {
        let mut a00 = 0.0f32;
        let mut a01 = 0.0f32;
        let mut a11 = 0.0f32;
        let mut b0 = 0.0f32;
        let mut b1 = 0.0f32;

        for dy in -h..=h {
            for dx in -h..=h {
                let qx = c.x + dx as f32;
                let qy = c.y + dy as f32;

                let gx = 0.5 * (sample_bilinear(img, qx + 1.0, qy) - sample_bilinear(img, qx - 1.0, qy));
                let gy = 0.5 * (sample_bilinear(img, qx, qy + 1.0) - sample_bilinear(img, qx, qy - 1.0));

                let gxx = gx * gx;
                let gxy = gx * gy;
                let gyy = gy * gy;

                a00 += gxx;
                a01 += gxy;
                a11 += gyy;
                b0 += gxx * qx + gxy * qy;
                b1 += gxy * qx + gyy * qy;
            }
        }

        let det = a00 * a11 - a01 * a01;
        if det.abs() < 1e-6 {
            return c;
        }
        let nx = (a11 * b0 - a01 * b1) / det;
        let ny = (a00 * b1 - a01 * b0) / det;

        if !nx.is_finite() || !ny.is_finite() || nx < 0.0 || ny < 0.0 || nx >= w || ny >= ht {
            return c;
        }

        let step = ((nx - c.x).powi(2) + (ny - c.y).powi(2)).sqrt();
        c = Point2::new(nx, ny);
        if step < params.epsilon {
            break;
        }
    }
    c
}

/// Refine all four corners of a quad.
pub fn refine_quad(img: &GrayImageView<'_>, quad: &Quad, params: &SubpixParams) -> Quad {
    Quad(quad.0.map(|p| refine_corner(img, p, params)))
}
