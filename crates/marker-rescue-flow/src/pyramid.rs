//! Image pyramids for coarse-to-fine tracking.

use marker_rescue_core::{GrayImage, GrayImageView};

/// A stack of progressively half-sized images; level 0 is full resolution.
#[derive(Clone, Debug)]
pub struct Pyramid {
    pub levels: Vec<GrayImage>,
}

/// Smallest side length a pyramid level may have.
const MIN_LEVEL_SIDE: usize = 16;

impl Pyramid {
    /// Build up to `max_levels` levels; construction stops early once the
    /// next level would fall under [`MIN_LEVEL_SIDE`] on either side.
    pub fn build(src: &GrayImageView<'_>, max_levels: usize) -> Self {
        let mut levels = Vec::with_capacity(max_levels.max(1));
        levels.push(GrayImage {
            width: src.width,
            height: src.height,
            data: src.data.to_vec(),
        });

        while levels.len() < max_levels.max(1) {
            let prev = levels.last().expect("at least one level");
            if prev.width / 2 < MIN_LEVEL_SIDE || prev.height / 2 < MIN_LEVEL_SIDE {
                break;
            }
            levels.push(downsample_2x(prev));
        }

        Self { levels }
    }

    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

/// 2x2 box-filtered half-resolution copy.
fn downsample_2x(src: &GrayImage) -> GrayImage {
    let w = src.width / 2;
    let h = src.height / 2;
    let mut data = Vec::with_capacity(w * h);
    for y in 0..h {
        let r0 = 2 * y * src.width;
        let r1 = r0 + src.width;
        for x in 0..w {
            let c = 2 * x;
            let sum = src.data[r0 + c] as u16
                + src.data[r0 + c + 1] as u16
                + src.data[r1 + c] as u16
                + src.data[r1 + c + 1] as u16;
            data.push((sum / 4) as u8);
        }
    }
    GrayImage {
        width: w,
        height: h,
        data,
    }
}
