//! Robust homography fitting from noisy point correspondences.

use crate::{estimate_homography, homography_from_4pt, Homography};
use nalgebra::Point2;

/// RANSAC settings for [`estimate_homography_ransac`].
#[derive(Clone, Copy, Debug)]
pub struct RansacParams {
    /// Number of minimal-sample hypotheses to score.
    pub max_iters: usize,
    /// Reprojection error (pixels) below which a pair counts as an inlier.
    pub inlier_threshold_px: f64,
    /// Reject models supported by fewer inliers than this.
    pub min_inliers: usize,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            inlier_threshold_px: 5.0,
            min_inliers: 4,
        }
    }
}

/// A robustly fitted homography with its consensus set.
#[derive(Clone, Debug)]
pub struct RansacFit {
    pub homography: Homography,
    pub inlier_mask: Vec<bool>,
    pub inlier_count: usize,
}

/// Fit `dst ~ H * src` while tolerating outlier correspondences.
///
/// Hypotheses are drawn with a deterministic multiplicative-congruential
/// sampler seeded by the iteration index, so identical inputs always produce
/// identical fits. The best consensus model is refit on its full inlier set
/// before the mask is recomputed.
pub fn estimate_homography_ransac(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> Option<RansacFit> {
    let n = src.len();
    if n != dst.len() || n < 4 {
        return None;
    }

    let thresh2 = (params.inlier_threshold_px * params.inlier_threshold_px) as f32;
    let mut best_mask = vec![false; n];
    let mut best_count = 0usize;
    let mut best_h: Option<Homography> = None;

    for iter in 0..params.max_iters.max(16) {
        let idx = sample_unique_indices(n, 4, iter as u64 + 1);
        let s = [src[idx[0]], src[idx[1]], src[idx[2]], src[idx[3]]];
        let d = [dst[idx[0]], dst[idx[1]], dst[idx[2]], dst[idx[3]]];
        if sample_is_degenerate(&s) {
            continue;
        }
        let Some(h) = homography_from_4pt(&s, &d) else {
            continue;
        };

        let mut mask = vec![false; n];
        let mut count = 0usize;
        for k in 0..n {
            if reprojection_error2(&h, src[k], dst[k]) <= thresh2 {
                mask[k] = true;
                count += 1;
            }
        }
        if count > best_count {
            best_count = count;
            best_mask = mask;
            best_h = Some(h);
            if best_count == n {
                break;
            }
        }
    }

    let coarse = best_h?;
    if best_count < params.min_inliers.max(4) {
        return None;
    }

    // Refit on the consensus set and rescore against the refined model.
    let in_src: Vec<Point2<f32>> = picked(src, &best_mask);
    let in_dst: Vec<Point2<f32>> = picked(dst, &best_mask);
    let refined = estimate_homography(&in_src, &in_dst).unwrap_or(coarse);

    let mut mask = vec![false; n];
    let mut count = 0usize;
    for k in 0..n {
        if reprojection_error2(&refined, src[k], dst[k]) <= thresh2 {
            mask[k] = true;
            count += 1;
        }
    }
    if count < params.min_inliers.max(4) {
        return None;
    }

    Some(RansacFit {
        homography: refined,
        inlier_mask: mask,
        inlier_count: count,
    })
}

#[inline]
fn reprojection_error2(h: &Homography, src: Point2<f32>, dst: Point2<f32>) -> f32 {
    let p = h.apply(src);
    let dx = p.x - dst.x;
    let dy = p.y - dst.y;
    dx * dx + dy * dy
}

fn picked(pts: &[Point2<f32>], mask: &[bool]) -> Vec<Point2<f32>> {
    pts.iter()
        .zip(mask)
        .filter_map(|(p, &m)| m.then_some(*p))
        .collect()
}

/// A minimal sample is useless when two of its points coincide.
fn sample_is_degenerate(pts: &[Point2<f32>; 4]) -> bool {
    for i in 0..4 {
        for j in (i + 1)..4 {
            let dx = pts[i].x - pts[j].x;
            let dy = pts[i].y - pts[j].y;
            if dx * dx + dy * dy < 1e-6 {
                return true;
            }
        }
    }
    false
}

fn sample_unique_indices(n: usize, k: usize, seed: u64) -> Vec<usize> {
    let mut out = Vec::with_capacity(k);
    let mut used = vec![false; n];
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    while out.len() < k {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let idx = ((state >> 33) as usize) % n;
        if !used[idx] {
            used[idx] = true;
            out.push(idx);
        }
    }
    out
}
