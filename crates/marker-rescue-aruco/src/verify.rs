//! Patch-level identity decoding for recovered marker candidates.

use crate::{decode_patch, CodeMatcher, Dictionary, PatchDecodeConfig};
use marker_rescue_core::GrayImageView;

/// Decodes canonical marker patches into dictionary ids.
///
/// This is the verification detector handed to the recovery orchestrator:
/// it answers "which marker ids does this warped patch contain", nothing
/// more. A decode or match failure yields an empty id list.
#[derive(Clone, Debug)]
pub struct PatchVerifier {
    matcher: CodeMatcher,
    decode: PatchDecodeConfig,
}

impl PatchVerifier {
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let max_hamming = max_hamming.min(dict.max_correction_bits);
        Self {
            matcher: CodeMatcher::new(dict, max_hamming),
            decode: PatchDecodeConfig::default(),
        }
    }

    pub fn with_decode_config(mut self, decode: PatchDecodeConfig) -> Self {
        self.decode = decode;
        self
    }

    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        self.matcher.dictionary()
    }

    /// Ids decoded from a canonical patch; empty when nothing decodes.
    pub fn decode_ids(&self, patch: &GrayImageView<'_>) -> Vec<u32> {
        let bits = self.matcher.dictionary().marker_size;
        let Some(obs) = decode_patch(patch, bits, &self.decode) else {
            log::debug!("patch decode failed (no readable bit grid)");
            return Vec::new();
        };
        match self.matcher.match_code(obs.code) {
            Some(m) => vec![m.id],
            None => {
                log::debug!(
                    "decoded code {:#x} matches no dictionary entry (border {:.2})",
                    obs.code,
                    obs.border_score
                );
                Vec::new()
            }
        }
    }
}
