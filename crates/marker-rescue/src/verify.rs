//! Identity verification of recovered marker candidates.

use marker_rescue_core::{warp_quad_to_square, GrayImageView, Quad};
use marker_rescue_aruco::PatchVerifier;

/// Canonical verification patch side, in pixels.
const VERIFY_PATCH_SIZE: usize = 200;

/// Capability interface for the external decoding routine used to re-check
/// recovered quads.
///
/// Implementations answer one question: which marker ids does this canonical
/// (already warped, axis-aligned) patch contain? Decode trouble of any kind
/// is an empty answer, never an error.
pub trait MarkerIdDecoder {
    fn decode_ids(&self, patch: &GrayImageView<'_>) -> Vec<u32>;
}

impl MarkerIdDecoder for PatchVerifier {
    fn decode_ids(&self, patch: &GrayImageView<'_>) -> Vec<u32> {
        PatchVerifier::decode_ids(self, patch)
    }
}

/// Re-decodes candidate quads before they are accepted into the output.
///
/// Whether verification actually runs is decided once at construction: it
/// needs both the config toggle and an installed decoder. When inactive,
/// every candidate passes.
pub(crate) struct IdentityVerifier {
    decoder: Option<Box<dyn MarkerIdDecoder>>,
    active: bool,
}

impl IdentityVerifier {
    pub fn new(verify_id: bool, decoder: Option<Box<dyn MarkerIdDecoder>>) -> Self {
        let active = verify_id && decoder.is_some();
        if verify_id && decoder.is_none() {
            log::info!("identity verification requested but no decoder installed; skipping");
        }
        Self { decoder, active }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Accept or reject a candidate quad for `expected_id`.
    ///
    /// Rejection covers a failed warp, an empty decode and a decode that
    /// yields only other ids. All of these leave the marker missing for the
    /// frame; none of them is an error.
    pub fn accepts(&self, gray: &GrayImageView<'_>, quad: &Quad, expected_id: u32) -> bool {
        if !self.active {
            return true;
        }
        let decoder = self.decoder.as_ref().expect("active implies decoder");

        let Some(patch) = warp_quad_to_square(gray, quad, VERIFY_PATCH_SIZE) else {
            log::debug!("marker {expected_id}: verification warp failed");
            return false;
        };

        let ids = decoder.decode_ids(&patch.as_view());
        if ids.contains(&expected_id) {
            log::debug!("marker {expected_id}: identity verified");
            true
        } else if ids.is_empty() {
            log::warn!("marker {expected_id}: no marker decoded in warped patch");
            false
        } else {
            log::warn!("marker {expected_id}: verification decoded {ids:?} instead");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_rescue_core::GrayImage;
    use nalgebra::Point2;

    struct FixedDecoder(Vec<u32>);

    impl MarkerIdDecoder for FixedDecoder {
        fn decode_ids(&self, _patch: &GrayImageView<'_>) -> Vec<u32> {
            self.0.clone()
        }
    }

    fn any_quad() -> Quad {
        Quad([
            Point2::new(10.0, 10.0),
            Point2::new(50.0, 10.0),
            Point2::new(50.0, 50.0),
            Point2::new(10.0, 50.0),
        ])
    }

    #[test]
    fn inactive_verifier_accepts_everything() {
        let img = GrayImage::filled(64, 64, 100);
        let v = IdentityVerifier::new(false, Some(Box::new(FixedDecoder(vec![]))));
        assert!(!v.is_active());
        assert!(v.accepts(&img.as_view(), &any_quad(), 3));

        let v = IdentityVerifier::new(true, None);
        assert!(!v.is_active());
        assert!(v.accepts(&img.as_view(), &any_quad(), 3));
    }

    #[test]
    fn accepts_only_matching_ids() {
        let img = GrayImage::filled(64, 64, 100);
        let v = IdentityVerifier::new(true, Some(Box::new(FixedDecoder(vec![3, 7]))));
        assert!(v.accepts(&img.as_view(), &any_quad(), 3));
        assert!(!v.accepts(&img.as_view(), &any_quad(), 4));
    }

    #[test]
    fn empty_decode_rejects() {
        let img = GrayImage::filled(64, 64, 100);
        let v = IdentityVerifier::new(true, Some(Box::new(FixedDecoder(vec![]))));
        assert!(!v.accepts(&img.as_view(), &any_quad(), 3));
    }

    #[test]
    fn degenerate_quad_rejects() {
        let img = GrayImage::filled(64, 64, 100);
        let v = IdentityVerifier::new(true, Some(Box::new(FixedDecoder(vec![3]))));
        let degenerate = Quad([Point2::new(5.0, 5.0); 4]);
        assert!(!v.accepts(&img.as_view(), &degenerate, 3));
    }
}
