//! Three-channel to one-channel luma reduction.
//!
//! Fixed-point BT.601 weights scaled by 256: `77 R + 150 G + 29 B`, then a
//! truncating shift right by 8. The weights sum to exactly 256, so a white
//! input maps to the channel maximum and no saturation is needed.

use crate::kernel::PointKernel;
use crate::token::Token;

/// Red weight (x256).
pub const RED_WEIGHT: u32 = 77;
/// Green weight (x256).
pub const GREEN_WEIGHT: u32 = 150;
/// Blue weight (x256).
pub const BLUE_WEIGHT: u32 = 29;

const _: () = assert!(RED_WEIGHT + GREEN_WEIGHT + BLUE_WEIGHT == 256);

/// Packed RGB to luma. Depth 3: products, sum, shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorReduce {
    pixel_width: u32,
}

impl ColorReduce {
    /// Reduce channels of `pixel_width` bits each.
    #[must_use]
    pub const fn new(pixel_width: u32) -> Self {
        Self { pixel_width }
    }
}

/// Weighted luma of one RGB triple, truncated.
#[must_use]
pub const fn luma(r: u32, g: u32, b: u32) -> u32 {
    (RED_WEIGHT * r + GREEN_WEIGHT * g + BLUE_WEIGHT * b) >> 8
}

impl PointKernel for ColorReduce {
    const NAME: &'static str = "color_reduce";
    const DEPTH: usize = 3;

    fn apply(&self, value: u32) -> u32 {
        let (r, g, b) = Token::unpack_rgb(value, self.pixel_width);
        luma(r, g, b)
    }
}
