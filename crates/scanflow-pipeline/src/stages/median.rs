//! 3x3 median through a 19-comparator selection network.
//!
//! The network only orders as much as needed to isolate the 5th of 9
//! values; its output position holds the true median but the other
//! positions are not fully sorted.

use crate::kernel::WindowKernel;
use crate::window::Window;

/// Comparator pairs, applied in order. Each leaves the smaller value at
/// the first index.
const NETWORK: [(usize, usize); 19] = [
    (1, 2),
    (4, 5),
    (7, 8),
    (0, 1),
    (3, 4),
    (6, 7),
    (1, 2),
    (4, 5),
    (7, 8),
    (0, 3),
    (5, 8),
    (4, 7),
    (3, 6),
    (1, 4),
    (2, 5),
    (4, 7),
    (4, 2),
    (6, 4),
    (4, 2),
];

/// Median of nine values.
#[must_use]
pub fn median9(mut p: [u32; 9]) -> u32 {
    for (a, b) in NETWORK {
        if p[a] > p[b] {
            p.swap(a, b);
        }
    }
    p[4]
}

/// 3x3 median stage. Depth 3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Median3;

impl WindowKernel for Median3 {
    const NAME: &'static str = "median";
    const DEPTH: usize = 3;
    const KERNEL_SIZE: usize = 3;

    fn apply(&self, window: &Window) -> u32 {
        let mut cells = [0; 9];
        cells.copy_from_slice(window.cells());
        median9(cells)
    }
}
