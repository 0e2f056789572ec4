//! FAST segment-test corner detection with radius non-max suppression.

use marker_rescue_core::GrayImageView;

/// A detected corner with its contrast score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Bresenham circle of radius 3, clockwise from 12 o'clock.
const RING: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Minimum contiguous arc length for the FAST-9 segment test.
const MIN_ARC: usize = 9;

/// Detect FAST-9 corners.
///
/// `margin` keeps detections at least that far from every border so that
/// downstream patch sampling (orientation, descriptor) never leaves the
/// image. Candidates within `nms_radius` of a stronger corner are dropped;
/// at most `max_keypoints` strongest survivors are returned.
pub fn detect_keypoints(
    img: &GrayImageView<'_>,
    threshold: u8,
    margin: usize,
    nms_radius: f32,
    max_keypoints: usize,
) -> Vec<Keypoint> {
    let margin = margin.max(3);
    if img.width <= 2 * margin || img.height <= 2 * margin {
        return Vec::new();
    }

    let t = threshold as i32;
    let mut candidates = Vec::new();

    for y in margin..(img.height - margin) {
        for x in margin..(img.width - margin) {
            let center = img.get(x as i32, y as i32) as i32;

            let mut ring = [0i32; 16];
            for (k, (dx, dy)) in RING.iter().enumerate() {
                ring[k] = img.get(x as i32 + dx, y as i32 + dy) as i32;
            }

            // Cheap pre-test on the 4 compass points. A 9-long arc covers
            // at least 2 of them, so anything with fewer cannot pass the
            // full segment test.
            let mut brighter = 0;
            let mut darker = 0;
            for &k in &[0usize, 4, 8, 12] {
                if ring[k] > center + t {
                    brighter += 1;
                } else if ring[k] < center - t {
                    darker += 1;
                }
            }
            if brighter < 2 && darker < 2 {
                continue;
            }

            if let Some(score) = segment_test(&ring, center, t) {
                candidates.push(Keypoint {
                    x: x as f32,
                    y: y as f32,
                    score,
                });
            }
        }
    }

    suppress_and_cap(candidates, nms_radius, max_keypoints)
}

/// Returns the corner score when a contiguous arc of at least [`MIN_ARC`]
/// ring pixels is uniformly brighter or darker than `center` by `t`.
fn segment_test(ring: &[i32; 16], center: i32, t: i32) -> Option<f32> {
    for sign in [1i32, -1] {
        let exceeds = |v: i32| sign * (v - center) > t;

        let mut best_run = 0usize;
        let mut run = 0usize;
        // Walk the ring twice to catch arcs wrapping the seam.
        for k in 0..32 {
            if exceeds(ring[k % 16]) {
                run += 1;
                best_run = best_run.max(run);
                if best_run >= 16 {
                    break;
                }
            } else {
                run = 0;
            }
        }

        if best_run >= MIN_ARC {
            let score: i32 = ring
                .iter()
                .filter(|&&v| exceeds(v))
                .map(|&v| (v - center).abs() - t)
                .sum();
            return Some(score as f32);
        }
    }
    None
}

fn suppress_and_cap(mut candidates: Vec<Keypoint>, radius: f32, cap: usize) -> Vec<Keypoint> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let r2 = radius * radius;
    let mut kept: Vec<Keypoint> = Vec::new();
    for c in candidates {
        if kept.len() >= cap {
            break;
        }
        let shadowed = kept.iter().any(|k| {
            let dx = k.x - c.x;
            let dy = k.y - c.y;
            dx * dx + dy * dy <= r2
        });
        if !shadowed {
            kept.push(c);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_rescue_core::GrayImage;

    fn square_image(w: usize, h: usize, x0: usize, y0: usize, side: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                20
            } else {
                200
            }
        })
    }

    #[test]
    fn finds_corners_of_dark_square() {
        let img = square_image(64, 64, 20, 20, 16);
        let kps = detect_keypoints(&img.as_view(), 20, 4, 3.0, 100);
        assert!(!kps.is_empty());

        // Every expected square corner has a detection within 3 px.
        for (cx, cy) in [(20.0, 20.0), (35.0, 20.0), (35.0, 35.0), (20.0, 35.0)] {
            let hit = kps
                .iter()
                .any(|k| (k.x - cx as f32).abs() <= 3.0 && (k.y - cy as f32).abs() <= 3.0);
            assert!(hit, "no keypoint near ({cx}, {cy}): {kps:?}");
        }
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = GrayImage::filled(48, 48, 127);
        assert!(detect_keypoints(&img.as_view(), 20, 4, 3.0, 100).is_empty());
    }

    #[test]
    fn nms_enforces_minimum_spacing() {
        let img = square_image(64, 64, 20, 20, 16);
        let kps = detect_keypoints(&img.as_view(), 20, 4, 5.0, 100);
        for i in 0..kps.len() {
            for j in (i + 1)..kps.len() {
                let dx = kps[i].x - kps[j].x;
                let dy = kps[i].y - kps[j].y;
                assert!(dx * dx + dy * dy > 25.0);
            }
        }
    }

    #[test]
    fn cap_limits_output() {
        let img = square_image(64, 64, 20, 20, 16);
        let kps = detect_keypoints(&img.as_view(), 10, 4, 0.5, 2);
        assert!(kps.len() <= 2);
    }

    #[test]
    fn margin_keeps_detections_inside() {
        let img = square_image(32, 32, 0, 0, 10);
        let kps = detect_keypoints(&img.as_view(), 20, 8, 3.0, 100);
        for k in kps {
            assert!(k.x >= 8.0 && k.y >= 8.0 && k.x < 24.0 && k.y < 24.0);
        }
    }
}
