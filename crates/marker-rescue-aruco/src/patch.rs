//! Bit readout from a canonical (axis-aligned, square) marker patch.

use marker_rescue_core::GrayImageView;

/// Decode settings for the canonical patch.
#[derive(Clone, Copy, Debug)]
pub struct PatchDecodeConfig {
    /// Marker border width in cells (ArUco uses 1).
    pub border_bits: usize,
    /// Fraction of a cell ignored near its edges when sampling.
    pub inset_frac: f32,
    /// Required fraction of black border cells.
    pub min_border_score: f32,
}

impl Default for PatchDecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            inset_frac: 0.10,
            min_border_score: 0.85,
        }
    }
}

/// Raw decode of one patch, before dictionary matching.
#[derive(Clone, Copy, Debug)]
pub struct PatchObservation {
    /// Inner bits, row-major, black = 1.
    pub code: u64,
    /// Fraction of border cells read as black.
    pub border_score: f32,
    /// Whether polarity had to be inverted to satisfy the border.
    pub inverted: bool,
}

/// Smallest patch side worth decoding, in pixels.
const MIN_PATCH_SIDE: usize = 24;

/// Minimum spread between the darkest and brightest cell; flatter patches
/// carry no marker signal in either polarity.
const MIN_CELL_CONTRAST: u8 = 20;

/// Decode a `bits x bits` marker (plus border) from a canonical patch.
///
/// The patch is assumed to cover exactly the marker including its border
/// cells, which is what the verifier's quad-to-square warp produces. The
/// binarization threshold comes from Otsu over a dense sample grid; both
/// polarities are tried and the one with the better border wins.
pub fn decode_patch(
    patch: &GrayImageView<'_>,
    bits: usize,
    cfg: &PatchDecodeConfig,
) -> Option<PatchObservation> {
    let cells = bits + 2 * cfg.border_bits;
    if bits == 0 || bits * bits > 64 || cells == 0 {
        return None;
    }
    let side = patch.width.min(patch.height);
    if side < MIN_PATCH_SIDE {
        return None;
    }

    let cell_px = side as f32 / cells as f32;
    let inset = (cfg.inset_frac.clamp(0.0, 0.4)) * cell_px;

    // Mean intensity per cell, sampled away from cell edges.
    let mut cell_means = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let x0 = (cx as f32 * cell_px + inset).floor() as usize;
            let x1 = (((cx + 1) as f32 * cell_px - inset).ceil() as usize).min(side);
            let y0 = (cy as f32 * cell_px + inset).floor() as usize;
            let y1 = (((cy + 1) as f32 * cell_px - inset).ceil() as usize).min(side);
            if x1 <= x0 || y1 <= y0 {
                return None;
            }

            let mut sum = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += patch.data[y * patch.width + x] as u64;
                }
            }
            cell_means.push((sum / ((x1 - x0) as u64 * (y1 - y0) as u64)) as u8);
        }
    }

    let lo = cell_means.iter().copied().min().unwrap_or(0);
    let hi = cell_means.iter().copied().max().unwrap_or(0);
    if hi - lo < MIN_CELL_CONTRAST {
        return None;
    }

    let threshold = otsu_threshold(&cell_means);

    let mut best: Option<PatchObservation> = None;
    for inverted in [false, true] {
        let obs = read_bits(&cell_means, cells, bits, cfg.border_bits, threshold, inverted);
        if obs.border_score < cfg.min_border_score {
            continue;
        }
        if best.map(|b| obs.border_score > b.border_score).unwrap_or(true) {
            best = Some(obs);
        }
    }
    best
}

fn read_bits(
    cell_means: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    threshold: u8,
    inverted: bool,
) -> PatchObservation {
    let mut code = 0u64;
    let mut border_black = 0u32;
    let mut border_total = 0u32;

    for cy in 0..cells {
        for cx in 0..cells {
            let mean = cell_means[cy * cells + cx];
            // Inclusive: the Otsu sweep returns the last bin of the dark class.
            let is_black = (mean <= threshold) != inverted;

            let on_border = border > 0
                && (cx < border || cy < border || cx >= cells - border || cy >= cells - border);
            if on_border {
                border_total += 1;
                if is_black {
                    border_black += 1;
                }
            } else if is_black {
                code |= 1u64 << ((cy - border) * bits + (cx - border));
            }
        }
    }

    let border_score = if border_total > 0 {
        border_black as f32 / border_total as f32
    } else {
        1.0
    };
    PatchObservation {
        code,
        border_score,
        inverted,
    }
}

/// Otsu threshold over a sample set; midpoint fallback for tiny histograms.
fn otsu_threshold(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut min_v = u8::MAX;
    let mut max_v = u8::MIN;
    let mut hist = [0u32; 256];
    for &v in samples {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
        hist[v as usize] += 1;
    }
    if min_v == max_v {
        return min_v;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0.0f64;
    let mut w_b = 0.0f64;
    let mut best_var = -1.0f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }
        sum_b += t as f64 * h as f64;

        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var > best_var {
            best_var = var;
            best_t = t as u8;
        }
    }
    best_t
}
