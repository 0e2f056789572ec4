//! ArUco-style dictionaries and canonical-patch decoding.
//!
//! This crate is the identity-verification backend of marker recovery: given
//! a candidate quad warped to a canonical square, it reads the bit grid and
//! matches the observed code against a dictionary under all four rotations.
//!
//! It does **not** search images for marker quads. Primary detection stays
//! with the upstream fiducial detector; only the already-localized patch is
//! decoded here.

mod dictionary;
mod matcher;
mod patch;
mod verify;

pub use dictionary::{Dictionary, DictionaryError};
pub use matcher::{rotate_code, CodeMatch, CodeMatcher};
pub use patch::{decode_patch, PatchDecodeConfig, PatchObservation};
pub use verify::PatchVerifier;
