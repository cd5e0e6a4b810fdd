//! Fixed-weight binomial blurs over 3x3 and 5x5 windows.
//!
//! Both kernels are outer products of binomial rows (`1 2 1` and
//! `1 4 6 4 1`) whose weights sum to a power of two, so normalization is a
//! truncating shift: by 4 for the 3x3 kernel, by 8 for the 5x5 kernel.
//! Non-power-of-two weights in the 5x5 kernel are built from shifts and
//! adds/subtracts rather than multiplies.

use crate::kernel::WindowKernel;
use crate::window::Window;

/// 3x3 weights `{1, 2, 4}`, sum 16.
pub const BLUR3_WEIGHTS: [[u32; 3]; 3] = [[1, 2, 1], [2, 4, 2], [1, 2, 1]];

/// 5x5 weights `{1, 4, 6, 16, 24, 36}`, sum 256.
pub const BLUR5_WEIGHTS: [[u32; 5]; 5] = [
    [1, 4, 6, 4, 1],
    [4, 16, 24, 16, 4],
    [6, 24, 36, 24, 6],
    [4, 16, 24, 16, 4],
    [1, 4, 6, 4, 1],
];

const _: () = assert!(weight_sum(&BLUR5_WEIGHTS) == 256);

const fn weight_sum(weights: &[[u32; 5]; 5]) -> u32 {
    let mut sum = 0;
    let mut r = 0;
    while r < 5 {
        let mut c = 0;
        while c < 5 {
            sum += weights[r][c];
            c += 1;
        }
        r += 1;
    }
    sum
}

/// `x * 6` as `x * 8 - x * 2`.
const fn times6(x: u32) -> u32 {
    (x << 3) - (x << 1)
}

/// `x * 24` as `x * 32 - x * 8`.
const fn times24(x: u32) -> u32 {
    (x << 5) - (x << 3)
}

/// `x * 36` as `x * 32 + x * 4`.
const fn times36(x: u32) -> u32 {
    (x << 5) + (x << 2)
}

/// Multiply by a 5x5 binomial weight using only shifts and adds.
const fn weigh5(x: u32, weight: u32) -> u32 {
    match weight {
        1 => x,
        4 => x << 2,
        6 => times6(x),
        16 => x << 4,
        24 => times24(x),
        36 => times36(x),
        // Only the weights above appear in BLUR5_WEIGHTS.
        _ => x * weight,
    }
}

/// 3x3 binomial blur. Depth 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blur3;

impl WindowKernel for Blur3 {
    const NAME: &'static str = "blur3";
    const DEPTH: usize = 2;
    const KERNEL_SIZE: usize = 3;

    fn apply(&self, window: &Window) -> u32 {
        let mut sum = 0;
        for (r, row) in BLUR3_WEIGHTS.iter().enumerate() {
            for (c, &weight) in row.iter().enumerate() {
                // Weights are 1, 2 or 4: a shift by 0, 1 or 2.
                sum += window.get(r, c) << weight.trailing_zeros();
            }
        }
        sum >> 4
    }
}

/// 5x5 binomial blur. Depth 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blur5;

impl WindowKernel for Blur5 {
    const NAME: &'static str = "blur5";
    const DEPTH: usize = 2;
    const KERNEL_SIZE: usize = 5;

    fn apply(&self, window: &Window) -> u32 {
        let mut sum = 0;
        for (r, row) in BLUR5_WEIGHTS.iter().enumerate() {
            for (c, &weight) in row.iter().enumerate() {
                sum += weigh5(window.get(r, c), weight);
            }
        }
        sum >> 8
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn flat(size: usize, value: u32) -> Window {
        Window::from_cells(size, vec![value; size * size]).unwrap()
    }

    #[test]
    fn shift_add_weights_match_multiplication() {
        for x in [0, 1, 7, 255, 1023, 65535] {
            assert_eq!(times6(x), x * 6);
            assert_eq!(times24(x), x * 24);
            assert_eq!(times36(x), x * 36);
            for w in [1, 4, 6, 16, 24, 36] {
                assert_eq!(weigh5(x, w), x * w);
            }
        }
    }

    #[test]
    fn flat_fields_are_preserved() {
        for v in [0, 16, 128, 255, 65535] {
            assert_eq!(Blur3.apply(&flat(3, v)), v);
            assert_eq!(Blur5.apply(&flat(5, v)), v);
        }
    }

    #[test]
    fn blur3_single_impulse() {
        let mut cells = vec![0; 9];
        cells[4] = 160;
        let window = Window::from_cells(3, cells).unwrap();
        assert_eq!(Blur3.apply(&window), 40);

        let mut cells = vec![0; 9];
        cells[0] = 160;
        let window = Window::from_cells(3, cells).unwrap();
        assert_eq!(Blur3.apply(&window), 10);
    }

    #[test]
    fn blur3_truncates() {
        let mut cells = vec![0; 9];
        cells[0] = 15;
        let window = Window::from_cells(3, cells).unwrap();
        assert_eq!(Blur3.apply(&window), 0);
    }

    #[test]
    fn blur5_center_impulse() {
        let mut cells = vec![0; 25];
        cells[12] = 256;
        let window = Window::from_cells(5, cells).unwrap();
        assert_eq!(Blur5.apply(&window), 36);
    }

    #[test]
    fn blur5_max_sum_fits() {
        let max = u32::from(u16::MAX);
        assert_eq!(Blur5.apply(&flat(5, max)), max);
    }
}
