//! Orientation-steered 256-bit binary descriptors.

use crate::Keypoint;
use marker_rescue_core::{sample_bilinear, GrayImageView};

/// 256-bit binary descriptor, packed into 32 bytes.
pub type Descriptor = [u8; 32];

pub const DESCRIPTOR_BITS: u32 = 256;

/// Half-size of the square sampling patch; test offsets stay within it.
pub(crate) const PATCH_RADIUS: i32 = 15;

/// Offset range for the binary test pattern.
const PATTERN_SPREAD: i32 = 13;

/// One binary test: compare intensity at `a` against intensity at `b`.
#[derive(Clone, Copy)]
pub(crate) struct TestPair {
    pub a: (f32, f32),
    pub b: (f32, f32),
}

/// Deterministic test pattern shared by every extractor instance.
///
/// Offsets are drawn from a fixed multiplicative-congruential sequence so
/// that descriptors computed in different processes always agree.
pub(crate) fn build_test_pattern() -> Vec<TestPair> {
    let mut state: u64 = 0x6d61_726b_6572_7331;
    let mut next_offset = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let span = (2 * PATTERN_SPREAD + 1) as u64;
        let v = ((state >> 33) % span) as i32 - PATTERN_SPREAD;
        v as f32
    };

    let mut pattern = Vec::with_capacity(DESCRIPTOR_BITS as usize);
    for _ in 0..DESCRIPTOR_BITS {
        let pair = TestPair {
            a: (next_offset(), next_offset()),
            b: (next_offset(), next_offset()),
        };
        pattern.push(pair);
    }
    pattern
}

/// Intensity-centroid orientation of the patch around `(x, y)` in radians.
///
/// The angle rotates the test pattern so that descriptors stay comparable
/// under in-plane rotation of the marker.
fn patch_orientation(img: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let mut m10 = 0.0f32;
    let mut m01 = 0.0f32;
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > PATCH_RADIUS * PATCH_RADIUS {
                continue;
            }
            let v = sample_bilinear(img, x + dx as f32, y + dy as f32);
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

/// Compute descriptors for a keypoint list, index-aligned with the input.
///
/// Keypoints are expected to lie at least `PATCH_RADIUS + PATTERN_SPREAD`
/// pixels from the border (the detector margin guarantees this); stray taps
/// outside the image read 0 rather than failing.
pub fn describe_keypoints(
    img: &GrayImageView<'_>,
    keypoints: &[Keypoint],
    pattern: &[TestPair],
) -> Vec<Descriptor> {
    keypoints
        .iter()
        .map(|kp| {
            let angle = patch_orientation(img, kp.x, kp.y);
            let (sin, cos) = angle.sin_cos();

            let mut desc: Descriptor = [0u8; 32];
            for (bit, t) in pattern.iter().enumerate() {
                let rotate = |(ox, oy): (f32, f32)| {
                    (
                        kp.x + cos * ox - sin * oy,
                        kp.y + sin * ox + cos * oy,
                    )
                };
                let (ax, ay) = rotate(t.a);
                let (bx, by) = rotate(t.b);
                if sample_bilinear(img, ax, ay) < sample_bilinear(img, bx, by) {
                    desc[bit / 8] |= 1 << (bit % 8);
                }
            }
            desc
        })
        .collect()
}
