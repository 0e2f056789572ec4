//! Feature front-end for marker re-acquisition.
//!
//! FAST-style corner detection, orientation-steered 256-bit binary
//! descriptors and mutual-nearest-neighbour Hamming matching. One
//! [`FeatureExtractor`] is built per recovery instance and used both for the
//! cached template features (computed once at load) and for the per-frame
//! search-region features.

mod descriptor;
mod extractor;
mod keypoint;
mod matcher;

pub use descriptor::{describe_keypoints, Descriptor, DESCRIPTOR_BITS};
pub use extractor::{FeatureExtractor, FeatureParams, FeatureSet};
pub use keypoint::{detect_keypoints, Keypoint};
pub use matcher::{match_descriptors, MatchPair};
