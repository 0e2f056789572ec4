//! Template re-acquisition: re-derive corners from scratch by matching
//! cached template features against the live frame.

use crate::{MarkerTemplate, RescueConfig, TrackerState};
use marker_rescue_core::{
    crop_gray, estimate_homography_ransac, GrayImage, GrayImageView, Homography, Quad,
    RansacParams,
};
use marker_rescue_features::{match_descriptors, FeatureExtractor};
use nalgebra::Point2;

/// Result of one successful re-acquisition.
#[derive(Clone, Debug)]
pub(crate) struct ReacquireOutcome {
    pub corners: Quad,
    pub inlier_count: usize,
    /// Geometric inliers over valid descriptor matches, in `[0, 1]`.
    pub match_quality: f32,
    /// Template-to-search-region transform, kept for diagnostics.
    pub homography: Homography,
}

/// Fixed RANSAC reprojection gate for the homography fit, in pixels.
const RANSAC_THRESHOLD_PX: f64 = 5.0;

/// Multiplier applied to `roi_expand_px` when searching a region instead of
/// tracking inside one.
const SEARCH_ROI_FACTOR: u32 = 3;

/// Try to re-acquire `template`'s marker in the current frame.
///
/// When `prefer_roi_matching` is set and the marker has a last known
/// position, only a region around it is searched; otherwise the full frame
/// is. Failures are reported as `None` and logged at debug level only.
pub(crate) fn reacquire(
    template: &MarkerTemplate,
    curr: &GrayImageView<'_>,
    last_state: Option<&TrackerState>,
    extractor: &FeatureExtractor,
    cfg: &RescueConfig,
) -> Option<ReacquireOutcome> {
    let marker_id = template.marker_id;

    // Search region: ROI around the last known position when allowed,
    // full frame otherwise.
    let mut region: Option<(GrayImage, f32, f32)> = None;
    if cfg.prefer_roi_matching {
        if let Some(state) = last_state {
            let expand = cfg.roi_expand_px * SEARCH_ROI_FACTOR;
            if let Some(roi) = state
                .last_corners
                .expanded_roi(expand, curr.width, curr.height)
            {
                log::debug!(
                    "marker {marker_id}: ROI search at ({}, {}) {}x{}",
                    roi.x0,
                    roi.y0,
                    roi.width,
                    roi.height
                );
                region = Some((
                    crop_gray(curr, roi.x0, roi.y0, roi.width, roi.height),
                    roi.x0 as f32,
                    roi.y0 as f32,
                ));
            }
        }
    }
    let (search, off_x, off_y) = match &region {
        Some((img, x, y)) => (img.as_view(), *x, *y),
        None => (*curr, 0.0, 0.0),
    };

    let frame_features = extractor.extract(&search);
    let matches = match_descriptors(
        &template.features.descriptors,
        &frame_features.descriptors,
        cfg.match_threshold,
    );
    if matches.len() < cfg.min_inliers {
        log::debug!(
            "marker {marker_id}: insufficient matches ({} < {})",
            matches.len(),
            cfg.min_inliers
        );
        return None;
    }

    let template_pts: Vec<Point2<f32>> = matches
        .iter()
        .map(|m| {
            let kp = template.features.keypoints[m.template_idx];
            Point2::new(kp.x, kp.y)
        })
        .collect();
    let frame_pts: Vec<Point2<f32>> = matches
        .iter()
        .map(|m| {
            let kp = frame_features.keypoints[m.frame_idx];
            Point2::new(kp.x, kp.y)
        })
        .collect();

    let ransac = RansacParams {
        inlier_threshold_px: RANSAC_THRESHOLD_PX,
        min_inliers: cfg.min_inliers,
        ..RansacParams::default()
    };
    let Some(fit) = estimate_homography_ransac(&template_pts, &frame_pts, &ransac) else {
        log::debug!("marker {marker_id}: homography fit failed");
        return None;
    };

    let corners = fit
        .homography
        .map_quad(&template.corners)
        .translated(off_x, off_y);
    if !corners.is_finite() || !corners.in_bounds(curr.width, curr.height) {
        log::debug!("marker {marker_id}: projected corners out of bounds");
        return None;
    }

    Some(ReacquireOutcome {
        corners,
        inlier_count: fit.inlier_count,
        match_quality: fit.inlier_count as f32 / matches.len() as f32,
        homography: fit.homography,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateStore;
    use marker_rescue_features::FeatureParams;
    use std::sync::Arc;

    fn texture(tx: usize, ty: usize) -> u8 {
        let v = (tx / 3).wrapping_mul(2654435761) ^ (ty / 3).wrapping_mul(2246822519);
        (v % 230) as u8
    }

    fn template_image(side: usize) -> GrayImage {
        GrayImage::from_fn(side, side, |x, y| texture(x, y))
    }

    /// Frame with the template content pasted at (x0, y0).
    fn frame_with_template(w: usize, h: usize, x0: usize, y0: usize, side: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                texture(x - x0, y - y0)
            } else {
                128
            }
        })
    }

    fn store_with_template(extractor: &FeatureExtractor, id: u32, side: usize) -> TemplateStore {
        let mut store = TemplateStore::new();
        store.insert_image(id, template_image(side), extractor);
        store
    }

    #[test]
    fn finds_template_in_full_frame() {
        let cfg = RescueConfig {
            enabled: true,
            ..RescueConfig::default()
        };
        let extractor = FeatureExtractor::new(FeatureParams::default());
        let store = store_with_template(&extractor, 9, 96);
        let template = store.get(9).expect("template");

        let frame = frame_with_template(320, 240, 100, 70, 96);
        let out = reacquire(template, &frame.as_view(), None, &extractor, &cfg)
            .expect("reacquired");

        assert!(out.inlier_count >= cfg.min_inliers);
        assert!(out.match_quality > 0.5);
        let tl = out.corners.points()[0];
        assert!((tl.x - 100.0).abs() < 3.0, "tl.x = {}", tl.x);
        assert!((tl.y - 70.0).abs() < 3.0, "tl.y = {}", tl.y);
    }

    #[test]
    fn roi_search_translates_back_to_frame_coordinates() {
        let cfg = RescueConfig {
            enabled: true,
            prefer_roi_matching: true,
            roi_expand_px: 40,
            ..RescueConfig::default()
        };
        let extractor = FeatureExtractor::new(FeatureParams::default());
        let store = store_with_template(&extractor, 9, 96);
        let template = store.get(9).expect("template");

        let frame = frame_with_template(400, 300, 180, 120, 96);
        let state = TrackerState {
            marker_id: 9,
            last_corners: Quad([
                Point2::new(170.0, 115.0),
                Point2::new(266.0, 115.0),
                Point2::new(266.0, 211.0),
                Point2::new(170.0, 211.0),
            ]),
            last_seen_frame_index: 1,
            last_gray: Arc::new(GrayImage::filled(400, 300, 128)),
        };

        let out = reacquire(template, &frame.as_view(), Some(&state), &extractor, &cfg)
            .expect("reacquired");
        let tl = out.corners.points()[0];
        assert!((tl.x - 180.0).abs() < 3.0, "tl.x = {}", tl.x);
        assert!((tl.y - 120.0).abs() < 3.0, "tl.y = {}", tl.y);
    }

    #[test]
    fn featureless_frame_fails_on_match_count() {
        let cfg = RescueConfig {
            enabled: true,
            ..RescueConfig::default()
        };
        let extractor = FeatureExtractor::new(FeatureParams::default());
        let store = store_with_template(&extractor, 9, 96);
        let template = store.get(9).expect("template");

        let frame = GrayImage::filled(320, 240, 128);
        assert!(reacquire(template, &frame.as_view(), None, &extractor, &cfg).is_none());
    }
}
