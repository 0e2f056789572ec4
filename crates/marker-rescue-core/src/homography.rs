//! Planar homography estimation and canonical-patch warping.

use crate::{sample_bilinear_u8, GrayImage, GrayImageView, Quad};
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Projective 2D transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub m: Matrix3<f64>,
}

impl Homography {
    pub fn new(m: Matrix3<f64>) -> Self {
        Self { m }
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        let mut out = [[0.0; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.m[(r, c)];
            }
        }
        out
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.m * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new((v[0] / v[2]) as f32, (v[1] / v[2]) as f32)
    }

    /// Project all four corners of a quad.
    pub fn map_quad(&self, q: &Quad) -> Quad {
        Quad(q.0.map(|p| self.apply(p)))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(Self::new)
    }
}

/// Hartley conditioning transform for a point set: translate the centroid to
/// the origin, scale so the mean distance becomes sqrt(2).
fn conditioning_transform(pts: &[Point2<f32>]) -> Matrix3<f64> {
    let n = pts.len() as f64;
    let (mut cx, mut cy) = (0.0f64, 0.0f64);
    for p in pts {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0f64;
    for p in pts {
        mean_dist += ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt();
    }
    mean_dist /= n;

    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn condition(pts: &[Point2<f32>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let t = conditioning_transform(pts);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// Undo the conditioning and fix the `h33 = 1` gauge.
fn decondition(h: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let full = t_dst.try_inverse()? * h * t_src;
    let s = full[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(full / s)
}

/// Exact homography from 4 point correspondences, `dst ~ H * src`.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// for degenerate configurations (e.g. three collinear points).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let (sn, t_src) = condition(src);
    let (dn, t_dst) = condition(dst);

    // With h33 fixed to 1 each correspondence (x,y) -> (u,v) contributes:
    //   h11 x + h12 y + h13 - u h31 x - u h32 y = u
    //   h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        let (x, y) = (sn[k].x, sn[k].y);
        let (u, v) = (dn[k].x, dn[k].y);

        let r = 2 * k;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;

        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }

    let h = a.lu().solve(&b)?;
    let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
    decondition(hn, t_src, t_dst).map(Homography::new)
}

/// Least-squares homography from `n >= 4` correspondences (DLT).
///
/// Falls back to the exact solver when exactly four pairs are given.
pub fn estimate_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if src.len() == 4 {
        let s: &[Point2<f32>; 4] = src.try_into().ok()?;
        let d: &[Point2<f32>; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (sn, t_src) = condition(src);
    let (dn, t_dst) = condition(dst);

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let (x, y) = (sn[k].x, sn[k].y);
        let (u, v) = (dn[k].x, dn[k].y);

        let r = 2 * k;
        a[(r, 0)] = -x;
        a[(r, 1)] = -y;
        a[(r, 2)] = -1.0;
        a[(r, 6)] = u * x;
        a[(r, 7)] = u * y;
        a[(r, 8)] = u;

        a[(r + 1, 3)] = -x;
        a[(r + 1, 4)] = -y;
        a[(r + 1, 5)] = -1.0;
        a[(r + 1, 6)] = v * x;
        a[(r + 1, 7)] = v * y;
        a[(r + 1, 8)] = v;
    }

    // Ah = 0: h is the right singular vector of the smallest singular value.
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let h = vt.row(vt.nrows().checked_sub(1)?);
    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    decondition(hn, t_src, t_dst).map(Homography::new)
}

/// Warp the image region under `quad` into a `side x side` canonical square.
///
/// Used for identity verification: the warped patch is what the external
/// decoder sees. Samples at pixel centers; taps outside the frame read 0.
pub fn warp_quad_to_square(src: &GrayImageView<'_>, quad: &Quad, side: usize) -> Option<GrayImage> {
    let s = side as f32;
    let square = [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ];
    let h_img_from_sq = homography_from_4pt(&square, quad.points())?;

    let mut out = GrayImage::filled(side, side, 0);
    for y in 0..side {
        for x in 0..side {
            let p = h_img_from_sq.apply(Point2::new(x as f32 + 0.5, y as f32 + 0.5));
            out.data[y * side + x] = sample_bilinear_u8(src, p.x, p.y);
        }
    }
    Some(out)
}
