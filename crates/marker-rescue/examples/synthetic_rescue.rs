//! Run the recovery pipeline on a synthetic sequence: a textured marker is
//! detected once, then "lost" for several frames and recovered by tracking.
//!
//! ```bash
//! cargo run --example synthetic_rescue
//! ```

use marker_rescue::core::{GrayImage, Quad};
use marker_rescue::{MarkerRescue, RescueConfig, RescueReport};
use nalgebra::Point2;
use std::collections::{BTreeSet, HashMap};

fn texture(tx: usize, ty: usize) -> u8 {
    let v = (tx / 3).wrapping_mul(2654435761) ^ (ty / 3).wrapping_mul(2246822519);
    (v % 230) as u8
}

fn frame_at(x0: usize, y0: usize) -> GrayImage {
    GrayImage::from_fn(640, 480, |x, y| {
        if (x0..x0 + 64).contains(&x) && (y0..y0 + 64).contains(&y) {
            texture(x - x0, y - y0)
        } else {
            128
        }
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = RescueConfig {
        enabled: true,
        verify_id: false,
        ..RescueConfig::default()
    };
    let mut rescue = MarkerRescue::new(cfg);
    let expected: BTreeSet<u32> = [3].into_iter().collect();

    // Frame 1: the detector sees the marker.
    let quad = Quad([
        Point2::new(200.0, 150.0),
        Point2::new(264.0, 150.0),
        Point2::new(264.0, 214.0),
        Point2::new(200.0, 214.0),
    ]);
    let detected: HashMap<u32, Quad> = [(3u32, quad)].into();
    let frame = frame_at(200, 150);
    rescue.recover_missing(&frame.as_view(), &detected, &expected);

    // Frames 2..=5: the detector loses it while it drifts.
    let empty = HashMap::new();
    for k in 1..=4usize {
        let frame = frame_at(200 + 4 * k, 150 + 3 * k);
        let (merged, attempts) = rescue.recover_missing(&frame.as_view(), &empty, &expected);

        let report = RescueReport::new(
            rescue.frame_index(),
            expected.iter().copied().collect(),
            attempts,
        );
        println!(
            "frame {}: {} markers in output, recovered {:?}",
            report.frame_index,
            merged.len(),
            report.recovered
        );
    }
}
