//! Extractor facade tying detection and description together.

use crate::descriptor::{build_test_pattern, TestPair, PATCH_RADIUS};
use crate::{describe_keypoints, detect_keypoints, Descriptor, Keypoint};
use marker_rescue_core::GrayImageView;
use serde::{Deserialize, Serialize};

/// Detection and description settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FeatureParams {
    /// FAST contrast threshold.
    pub threshold: u8,
    /// Non-max suppression radius in pixels.
    pub nms_radius: f32,
    /// Keep at most this many strongest keypoints per image.
    pub max_keypoints: usize,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            threshold: 20,
            nms_radius: 3.0,
            max_keypoints: 2048,
        }
    }
}

/// Keypoints and their index-aligned descriptors for one image.
#[derive(Clone, Debug, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Detector + descriptor with a fixed configuration and test pattern.
///
/// Built once per recovery instance: template features are extracted through
/// the same instance as every later frame extraction, so the two sides stay
/// comparable.
pub struct FeatureExtractor {
    params: FeatureParams,
    pattern: Vec<TestPair>,
}

impl FeatureExtractor {
    pub fn new(params: FeatureParams) -> Self {
        Self {
            params,
            pattern: build_test_pattern(),
        }
    }

    #[inline]
    pub fn params(&self) -> &FeatureParams {
        &self.params
    }

    /// Detect and describe features in one pass.
    pub fn extract(&self, img: &GrayImageView<'_>) -> FeatureSet {
        let margin = PATCH_RADIUS as usize + 1;
        let keypoints = detect_keypoints(
            img,
            self.params.threshold,
            margin,
            self.params.nms_radius,
            self.params.max_keypoints,
        );
        let descriptors = describe_keypoints(img, &keypoints, &self.pattern);
        log::debug!(
            "extracted {} keypoints from {}x{} region",
            keypoints.len(),
            img.width,
            img.height
        );
        FeatureSet {
            keypoints,
            descriptors,
        }
    }
}
