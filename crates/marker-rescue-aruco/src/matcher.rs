//! Rotation-aware code matching against a dictionary.

use crate::Dictionary;

/// A dictionary hit for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeMatch {
    /// Marker id (index into the dictionary).
    pub id: u32,
    /// Rotation `0..=3` with `observed == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance after rotation.
    pub hamming: u8,
}

/// Brute-force matcher with the four rotations of every code precomputed.
///
/// Dictionaries used for identity verification are small, so exhaustive
/// search stays cheap and avoids a lookup-table build step.
#[derive(Clone, Debug)]
pub struct CodeMatcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl CodeMatcher {
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        let rotated = dict
            .codes
            .iter()
            .map(|&code| {
                let mut rots = [code; 4];
                for (r, slot) in rots.iter_mut().enumerate().skip(1) {
                    *slot = rotate_code(code, n, r as u8);
                }
                rots
            })
            .collect();
        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Best match within the Hamming budget, if any.
    pub fn match_code(&self, observed: u64) -> Option<CodeMatch> {
        let mut best: Option<CodeMatch> = None;
        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.map(|b| h < b.hamming).unwrap_or(true) {
                    best = Some(CodeMatch {
                        id: id as u32,
                        rotation: rot as u8,
                        hamming: h,
                    });
                    if h == 0 {
                        return best;
                    }
                }
            }
        }
        best
    }
}

/// Rotate a row-major `n x n` bit code counter-clockwise `rot` quarter turns.
pub fn rotate_code(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let bit = (code >> (sy * n + sx)) & 1;
            out |= bit << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_dictionary() -> Dictionary {
        // Codes chosen pairwise far apart under every rotation.
        Dictionary::new("toy", 4, 1, vec![0x0000_00FF, 0x0000_F00F, 0x0000_3C3C])
            .expect("dictionary")
    }

    #[test]
    fn four_rotations_are_identity() {
        let code = 0x0123_4567_89AB_CDEF_u64;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code(r, 8, 1);
        }
        assert_eq!(r, code);
    }

    #[test]
    fn finds_rotated_codes() {
        let dict = toy_dictionary();
        let matcher = CodeMatcher::new(dict.clone(), 0);
        for (id, &code) in dict.codes.iter().enumerate() {
            for rot in 0..4u8 {
                let observed = rotate_code(code, dict.marker_size, rot);
                let m = matcher.match_code(observed).expect("match");
                assert_eq!(m.id as usize, id);
                assert_eq!(m.hamming, 0);
            }
        }
    }

    #[test]
    fn tolerates_single_bit_errors_within_budget() {
        let dict = toy_dictionary();
        let matcher = CodeMatcher::new(dict.clone(), 1);
        let corrupted = dict.codes[1] ^ (1 << 7);
        let m = matcher.match_code(corrupted).expect("match");
        assert_eq!(m.id, 1);
        assert_eq!(m.hamming, 1);
    }

    #[test]
    fn rejects_codes_beyond_budget() {
        let dict = toy_dictionary();
        let matcher = CodeMatcher::new(dict, 0);
        assert!(matcher.match_code(0xAAAA_AAAA).is_none());
    }
}
