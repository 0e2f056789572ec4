//! Mutual-nearest-neighbour Hamming matching.

use crate::{Descriptor, DESCRIPTOR_BITS};

/// One valid correspondence between a template and a frame descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchPair {
    /// Index into the template feature set.
    pub template_idx: usize,
    /// Index into the frame (search-region) feature set.
    pub frame_idx: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

#[inline]
fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

fn nearest(query: &Descriptor, set: &[Descriptor]) -> Option<(usize, u32)> {
    set.iter()
        .enumerate()
        .map(|(i, d)| (i, hamming(query, d)))
        .min_by_key(|&(_, dist)| dist)
}

/// Match template descriptors against frame descriptors.
///
/// A pair is kept only when it is the nearest neighbour in *both*
/// directions and its distance does not exceed
/// `match_threshold * DESCRIPTOR_BITS`. The threshold is the same
/// `match_threshold` knob the recovery configuration carries.
pub fn match_descriptors(
    template: &[Descriptor],
    frame: &[Descriptor],
    match_threshold: f32,
) -> Vec<MatchPair> {
    if template.is_empty() || frame.is_empty() {
        return Vec::new();
    }

    let max_dist = (match_threshold.clamp(0.0, 1.0) * DESCRIPTOR_BITS as f32) as u32;
    let mut out = Vec::new();

    for (ti, td) in template.iter().enumerate() {
        let Some((fi, dist)) = nearest(td, frame) else {
            continue;
        };
        if dist > max_dist {
            continue;
        }
        // Mutual check: the frame descriptor must point back at us.
        match nearest(&frame[fi], template) {
            Some((back, _)) if back == ti => out.push(MatchPair {
                template_idx: ti,
                frame_idx: fi,
                distance: dist,
            }),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with_bits(bits: &[usize]) -> Descriptor {
        let mut d = [0u8; 32];
        for &b in bits {
            d[b / 8] |= 1 << (b % 8);
        }
        d
    }

    #[test]
    fn identical_sets_match_one_to_one() {
        let set: Vec<Descriptor> = (0..5)
            .map(|k| descriptor_with_bits(&[k, k + 20, k + 100]))
            .collect();
        let pairs = match_descriptors(&set, &set, 0.2);
        assert_eq!(pairs.len(), 5);
        for p in pairs {
            assert_eq!(p.template_idx, p.frame_idx);
            assert_eq!(p.distance, 0);
        }
    }

    #[test]
    fn distance_gate_rejects_far_pairs() {
        // 52 differing bits > 0.2 * 256 = 51.
        let a = vec![descriptor_with_bits(&[])];
        let far: Vec<usize> = (0..52).collect();
        let b = vec![descriptor_with_bits(&far)];
        assert!(match_descriptors(&a, &b, 0.2).is_empty());

        let near: Vec<usize> = (0..51).collect();
        let c = vec![descriptor_with_bits(&near)];
        assert_eq!(match_descriptors(&a, &c, 0.2).len(), 1);
    }

    #[test]
    fn non_mutual_pairs_are_dropped() {
        // Both template descriptors are nearest to frame[0], but frame[0]
        // prefers template[0]; template[1] must stay unmatched.
        let template = vec![descriptor_with_bits(&[0]), descriptor_with_bits(&[0, 1])];
        let frame = vec![descriptor_with_bits(&[0])];
        let pairs = match_descriptors(&template, &frame, 0.2);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].template_idx, 0);
    }

    #[test]
    fn empty_inputs_match_nothing() {
        let set = vec![descriptor_with_bits(&[1])];
        assert!(match_descriptors(&set, &[], 0.2).is_empty());
        assert!(match_descriptors(&[], &set, 0.2).is_empty());
    }
}
