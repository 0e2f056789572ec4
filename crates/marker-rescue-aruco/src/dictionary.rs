//! Marker dictionaries: packed codes plus metadata.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors building or loading a dictionary.
#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error("marker_size {0} implies more than 64 bits per code (unsupported)")]
    TooManyBits(usize),
    #[error("dictionary contains no codes")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A fixed ArUco/AprilTag-style dictionary.
///
/// Codes pack the inner `marker_size x marker_size` bits in row-major order
/// with **black = 1**, matching the conventions of the upstream detector the
/// recovery subsystem verifies against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dictionary {
    pub name: String,
    /// Marker side length (inner bits per side).
    pub marker_size: usize,
    /// Maximum error-correcting Hamming distance the dictionary supports.
    pub max_correction_bits: u8,
    /// One `u64` per marker id; the index is the id.
    pub codes: Vec<u64>,
}

impl Dictionary {
    pub fn new(
        name: impl Into<String>,
        marker_size: usize,
        max_correction_bits: u8,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        if marker_size * marker_size > 64 {
            return Err(DictionaryError::TooManyBits(marker_size));
        }
        if codes.is_empty() {
            return Err(DictionaryError::Empty);
        }
        Ok(Self {
            name: name.into(),
            marker_size,
            max_correction_bits,
            codes,
        })
    }

    /// Load a dictionary from its JSON description on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let raw = std::fs::read_to_string(path)?;
        let dict: Dictionary = serde_json::from_str(&raw)?;
        Self::new(
            dict.name,
            dict.marker_size,
            dict.max_correction_bits,
            dict.codes,
        )
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
