//! Binary classification of single pixels.

use crate::kernel::PointKernel;

/// `value > threshold` maps to `max_value`, everything else to 0.
/// With `invert` the two outputs swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    threshold: u32,
    max_value: u32,
    invert: bool,
}

impl Threshold {
    /// Create a classifier.
    #[must_use]
    pub const fn new(threshold: u32, max_value: u32, invert: bool) -> Self {
        Self {
            threshold,
            max_value,
            invert,
        }
    }
}

impl PointKernel for Threshold {
    const NAME: &'static str = "threshold";
    const DEPTH: usize = 1;

    fn apply(&self, value: u32) -> u32 {
        if (value > self.threshold) != self.invert {
            self.max_value
        } else {
            0
        }
    }
}
