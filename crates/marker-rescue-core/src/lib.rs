//! Core image and geometry primitives for fiducial marker recovery.
//!
//! This crate is intentionally small. It owns the grayscale image types,
//! the corner-quad type with its bounds arithmetic, homography estimation
//! (exact 4-point, overdetermined DLT and a robust RANSAC wrapper),
//! canonical-patch warping and sub-pixel corner refinement. It does *not*
//! know anything about markers, templates or tracking policy.

mod homography;
mod image;
mod logger;
mod quad;
mod ransac;
mod refine;

pub use homography::{
    estimate_homography, homography_from_4pt, warp_quad_to_square, Homography,
};
pub use image::{crop_gray, sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use quad::{Quad, RoiRect};
pub use ransac::{estimate_homography_ransac, RansacFit, RansacParams};
pub use refine::{refine_corner, refine_quad, SubpixParams};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
