//! Per-frame JSON reports and the optional annotated debug frame.

use crate::{RecoveryAttempt, RecoverySource, RescueIoError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serializable record of one frame's recovery activity.
///
/// Intended for external persistence and offline inspection; correctness of
/// the pipeline never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescueReport {
    pub frame_index: u64,
    pub expected: Vec<u32>,
    /// Ids whose corners this frame came from a recovery path.
    pub recovered: Vec<u32>,
    pub attempts: Vec<RecoveryAttempt>,
}

impl RescueReport {
    pub fn new(frame_index: u64, expected: Vec<u32>, attempts: Vec<RecoveryAttempt>) -> Self {
        let recovered = attempts
            .iter()
            .filter(|a| a.source != RecoverySource::Direct && a.corners.is_some())
            .map(|a| a.marker_id)
            .collect();
        Self {
            frame_index,
            expected,
            recovered,
            attempts,
        }
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RescueIoError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RescueIoError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Draw each attempt's quad on `frame`, colour-coded by source:
/// green = direct, yellow = tracked, red = re-acquired.
#[cfg(feature = "image")]
pub fn annotate_frame(frame: &mut ::image::RgbImage, attempts: &[RecoveryAttempt]) {
    for attempt in attempts {
        let Some(quad) = &attempt.corners else {
            continue;
        };
        let color = match attempt.source {
            RecoverySource::Direct => ::image::Rgb([0, 200, 0]),
            RecoverySource::Tracked => ::image::Rgb([230, 210, 0]),
            RecoverySource::Reacquired => ::image::Rgb([220, 40, 40]),
        };
        let pts = quad.points();
        for k in 0..4 {
            let a = pts[k];
            let b = pts[(k + 1) % 4];
            draw_line(frame, a.x, a.y, b.x, b.y, color);
        }
    }
}

#[cfg(feature = "image")]
fn draw_line(frame: &mut ::image::RgbImage, x0: f32, y0: f32, x1: f32, y1: f32, color: ::image::Rgb<u8>) {
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let (mut x, mut y) = (x0.round() as i64, y0.round() as i64);
    let (ex, ey) = (x1.round() as i64, y1.round() as i64);

    let dx = (ex - x).abs();
    let dy = -(ey - y).abs();
    let sx = if x < ex { 1 } else { -1 };
    let sy = if y < ey { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            frame.put_pixel(x as u32, y as u32, color);
        }
        if x == ex && y == ey {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_rescue_core::Quad;
    use nalgebra::Point2;

    fn sample_attempts() -> Vec<RecoveryAttempt> {
        let quad = Quad([
            Point2::new(4.0, 4.0),
            Point2::new(20.0, 4.0),
            Point2::new(20.0, 20.0),
            Point2::new(4.0, 20.0),
        ]);
        vec![
            RecoveryAttempt {
                marker_id: 1,
                corners: Some(quad),
                source: RecoverySource::Direct,
                inlier_count: 0,
                match_quality: 1.0,
                homography: None,
            },
            RecoveryAttempt {
                marker_id: 2,
                corners: Some(quad),
                source: RecoverySource::Tracked,
                inlier_count: 4,
                match_quality: 0.9,
                homography: None,
            },
            RecoveryAttempt {
                marker_id: 3,
                corners: None,
                source: RecoverySource::Reacquired,
                inlier_count: 0,
                match_quality: 0.0,
                homography: None,
            },
        ]
    }

    #[test]
    fn report_collects_recovered_ids() {
        let report = RescueReport::new(12, vec![1, 2, 3], sample_attempts());
        assert_eq!(report.recovered, vec![2]);
        assert_eq!(report.attempts.len(), 3);
    }

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame_12.json");

        let report = RescueReport::new(12, vec![1, 2, 3], sample_attempts());
        report.write_json(&path).expect("write");
        let back = RescueReport::load_json(&path).expect("load");

        assert_eq!(back.frame_index, 12);
        assert_eq!(back.recovered, vec![2]);
        assert_eq!(back.attempts.len(), 3);
    }

    #[cfg(feature = "image")]
    #[test]
    fn annotation_draws_quads_with_source_colors() {
        let mut frame = ::image::RgbImage::from_pixel(32, 32, ::image::Rgb([0, 0, 0]));
        annotate_frame(&mut frame, &sample_attempts());

        // The direct quad's top edge is green, the tracked overdraw wins on
        // shared pixels, and the failed attempt drew nothing extra.
        let on_edge = frame.get_pixel(10, 4);
        assert_ne!(on_edge.0, [0, 0, 0]);
        let off_edge = frame.get_pixel(28, 28);
        assert_eq!(off_edge.0, [0, 0, 0]);
    }
}
