//! 3x3 gradient magnitude edge detection.
//!
//! Horizontal and vertical directional sums use the `{1, 2}` weighted
//! Sobel operator. The magnitude is `|Gx| + |Gy|` divided by 4 with a
//! truncating shift. `|Gx| + |Gy|` reaches `8 * max`, which needs three
//! bits more than a pixel. When either of its top two bits (`W + 1` and
//! `W + 2` for `W`-bit pixels) is set, the output saturates to the pixel
//! maximum instead of wrapping.

use crate::kernel::WindowKernel;
use crate::token::max_value;
use crate::window::Window;

/// Signed horizontal and vertical gradients of a 3x3 window.
///
/// `Gx` is right column minus left column, `Gy` is bottom row minus top
/// row, each with weights `1 2 1`.
#[must_use]
pub fn gradients(window: &Window) -> (i64, i64) {
    let p = |r: usize, c: usize| i64::from(window.get(r, c));
    let gx = (p(0, 2) + 2 * p(1, 2) + p(2, 2)) - (p(0, 0) + 2 * p(1, 0) + p(2, 0));
    let gy = (p(2, 0) + 2 * p(2, 1) + p(2, 2)) - (p(0, 0) + 2 * p(0, 1) + p(0, 2));
    (gx, gy)
}

/// Fold `|gx| + |gy|` into `pixel_width` bits: shift right by 2, clamp
/// to the pixel maximum when either of the top two bits of the
/// `pixel_width + 3` bit sum is set.
#[must_use]
pub fn magnitude(gx: i64, gy: i64, pixel_width: u32) -> u32 {
    let raw = gx.unsigned_abs() + gy.unsigned_abs();
    let max = max_value(pixel_width);
    if raw >> (pixel_width + 1) != 0 {
        max
    } else {
        u32::try_from(raw >> 2).unwrap_or(max)
    }
}

/// Gradient magnitude stage. Depth 3: directional sums, absolute values,
/// fold and saturate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gradient {
    pixel_width: u32,
}

impl Gradient {
    /// Create a detector for `pixel_width`-bit pixels.
    #[must_use]
    pub const fn new(pixel_width: u32) -> Self {
        Self { pixel_width }
    }
}

impl WindowKernel for Gradient {
    const NAME: &'static str = "edge";
    const DEPTH: usize = 3;
    const KERNEL_SIZE: usize = 3;

    fn apply(&self, window: &Window) -> u32 {
        let (gx, gy) = gradients(window);
        magnitude(gx, gy, self.pixel_width)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn window(cells: [u32; 9]) -> Window {
        Window::from_cells(3, cells.to_vec()).unwrap()
    }

    #[test]
    fn flat_window_has_no_gradient() {
        let w = window([90; 9]);
        assert_eq!(gradients(&w), (0, 0));
        assert_eq!(Gradient::new(8).apply(&w), 0);
    }

    #[test]
    fn vertical_edge() {
        let w = window([0, 0, 100, 0, 0, 100, 0, 0, 100]);
        assert_eq!(gradients(&w), (400, 0));
        assert_eq!(Gradient::new(8).apply(&w), 100);
    }

    #[test]
    fn horizontal_edge_is_signed() {
        let w = window([100, 100, 100, 0, 0, 0, 0, 0, 0]);
        assert_eq!(gradients(&w), (0, -400));
        assert_eq!(Gradient::new(8).apply(&w), 100);
    }

    #[test]
    fn full_step_fits_exactly() {
        // |Gx| = 4 * 255 = 1020 sets bit 9: saturates to 255.
        let w = window([0, 0, 255, 0, 0, 255, 0, 0, 255]);
        assert_eq!(Gradient::new(8).apply(&w), 255);
    }

    #[test]
    fn diagonal_extremes_saturate() {
        // Gx = Gy = 3 * 255; raw 1530 has a guard bit set.
        let w = window([0, 0, 255, 0, 0, 255, 255, 255, 255]);
        let (gx, gy) = gradients(&w);
        assert_eq!((gx, gy), (765, 765));
        assert_eq!(Gradient::new(8).apply(&w), 255);
    }

    #[test]
    fn saturation_instead_of_wrap() {
        // raw = 1024 -> 256 would wrap to 0 in 8 bits.
        assert_eq!(magnitude(1024, 0, 8), 255);
        assert_eq!(magnitude(-512, 512, 8), 255);
        assert_eq!(magnitude(1023, 0, 8), 255);
        assert_eq!(magnitude(1019, 0, 8), 255);
        assert_eq!(magnitude(3, 0, 8), 0);
    }

    #[test]
    fn lower_guard_bit_alone_saturates() {
        // 600 sets bit 9 only; an unguarded shift would give 150.
        assert_eq!(magnitude(600, 0, 8), 255);
        assert_eq!(magnitude(256, 256, 8), 255);
        assert_eq!(magnitude(300, 211, 8), 127);
        assert_eq!(magnitude(2048, 0, 10), max_value(10));
        assert_eq!(magnitude(2047, 0, 10), 511);
    }

    #[test]
    fn opposite_corners_saturate_at_wide_pixels() {
        let max = max_value(10);
        let w = window([max, max, max, max, 0, 0, max, 0, 0]);
        let (gx, gy) = gradients(&w);
        assert_eq!((gx, gy), (-3 * i64::from(max), -3 * i64::from(max)));
        assert_eq!(Gradient::new(10).apply(&w), max);
    }
}
