//! Pass-through stage that counts a 256-bin histogram per frame.
//!
//! Bins index the top 8 bits of each pixel. Counters clear when a
//! `start_of_frame` token is accepted. Each increment lands one accepted
//! pixel later (the read-modify-write of the previous pixel overlaps the
//! next acceptance), except for the last pixel of the frame, which is
//! committed immediately. Thus all bins read zero right after a frame
//! starts, and the histogram is complete and frozen from the tick after
//! the last pixel until the next frame starts.

use std::any::Any;

use log::debug;

use crate::kernel::{SlotPipeline, Stage};
use crate::token::{FrameSize, Token};

/// Number of histogram bins.
pub const BINS: usize = 256;

/// Histogram stage. Depth 1; pixels pass through unchanged.
#[derive(Debug, Clone)]
pub struct Histogram {
    pixel_width: u32,
    bins: Box<[u32; BINS]>,
    pending: Option<usize>,
    pending_size: FrameSize,
    height: usize,
    row: usize,
    active: bool,
    frame_done: bool,
    pipeline: SlotPipeline,
}

impl Histogram {
    /// Create a histogram for `pixel_width`-bit pixels. The frame height
    /// is taken from `initial` until another frame size is declared.
    #[must_use]
    pub fn new(pixel_width: u32, initial: FrameSize) -> Self {
        Self {
            pixel_width,
            bins: Box::new([0; BINS]),
            pending: None,
            pending_size: initial,
            height: initial.height,
            row: 0,
            active: false,
            frame_done: false,
            pipeline: SlotPipeline::new(1),
        }
    }

    /// Count in bin `bin`.
    #[must_use]
    pub fn read(&self, bin: u8) -> u32 {
        self.bins[usize::from(bin)]
    }

    /// All bins.
    #[must_use]
    pub fn bins(&self) -> &[u32; BINS] {
        &self.bins
    }

    /// Whether the last frame completed and the bins are frozen.
    #[must_use]
    pub const fn frame_done(&self) -> bool {
        self.frame_done
    }

    fn bin_of(&self, value: u32) -> usize {
        let top = if self.pixel_width > 8 {
            value >> (self.pixel_width - 8)
        } else {
            value
        };
        usize::try_from(top).map_or(BINS - 1, |bin| bin.min(BINS - 1))
    }

    fn commit(&mut self) {
        if let Some(bin) = self.pending.take() {
            self.bins[bin] = self.bins[bin].saturating_add(1);
        }
    }

    fn count(&mut self, token: Token) {
        if token.start_of_frame {
            self.bins.fill(0);
            self.pending = None;
            self.height = self.pending_size.height;
            self.row = 0;
            self.active = true;
            self.frame_done = false;
        }
        if !self.active {
            return;
        }

        self.commit();
        self.pending = Some(self.bin_of(token.value));
        if token.end_of_row {
            if self.row + 1 >= self.height {
                self.commit();
                self.active = false;
                self.frame_done = true;
                debug!(
                    "histogram frame done: {} pixels",
                    self.bins.iter().map(|&c| u64::from(c)).sum::<u64>()
                );
            }
            self.row += 1;
        }
    }
}

impl Stage for Histogram {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn depth(&self) -> usize {
        self.pipeline.depth()
    }

    fn output(&self) -> Token {
        self.pipeline.output()
    }

    fn tick(&mut self, input: Token, ready: bool) {
        if !ready {
            return;
        }
        if input.valid {
            self.count(input);
            self.pipeline.shift(input);
        } else {
            self.pipeline.shift(Token::BUBBLE);
        }
    }

    fn set_frame_size(&mut self, size: FrameSize) {
        self.pending_size = size;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(h: &mut Histogram, width: usize, height: usize, value: impl Fn(usize) -> u32) {
        for i in 0..width * height {
            let token = Token::pixel(value(i))
                .with_start_of_frame(i == 0)
                .with_end_of_row(i % width == width - 1);
            h.tick(token, true);
        }
    }

    #[test]
    fn counts_complete_frame() {
        let mut h = Histogram::new(8, FrameSize::new(4, 3));
        feed(&mut h, 4, 3, |i| u32::try_from(i % 3).unwrap_or(0));
        assert!(h.frame_done());
        assert_eq!(h.read(0), 4);
        assert_eq!(h.read(1), 4);
        assert_eq!(h.read(2), 4);
        assert_eq!(h.bins().iter().sum::<u32>(), 12);
    }

    #[test]
    fn bins_read_zero_after_frame_start() {
        let mut h = Histogram::new(8, FrameSize::new(2, 2));
        feed(&mut h, 2, 2, |_| 9);
        assert_eq!(h.read(9), 4);

        h.tick(Token::pixel(9).with_start_of_frame(true), true);
        assert!(h.bins().iter().all(|&c| c == 0));
        assert!(!h.frame_done());

        h.tick(Token::pixel(3).with_end_of_row(true), true);
        assert_eq!(h.read(9), 1);
        assert_eq!(h.read(3), 0);
    }

    #[test]
    fn frozen_after_frame_end() {
        let mut h = Histogram::new(8, FrameSize::new(2, 1));
        feed(&mut h, 2, 1, |_| 5);
        assert!(h.frame_done());
        // Stray pixels without a frame start are not counted.
        h.tick(Token::pixel(5), true);
        h.tick(Token::pixel(5), true);
        assert_eq!(h.read(5), 2);
        assert!(h.frame_done());
    }

    #[test]
    fn wide_pixels_use_top_bits() {
        let mut h = Histogram::new(10, FrameSize::new(2, 1));
        feed(&mut h, 2, 1, |i| if i == 0 { 1023 } else { 4 });
        assert_eq!(h.read(255), 1);
        assert_eq!(h.read(1), 1);
    }

    #[test]
    fn passes_pixels_through() {
        let mut h = Histogram::new(8, FrameSize::new(2, 1));
        h.tick(Token::pixel(77).with_start_of_frame(true), true);
        assert_eq!(h.output(), Token::pixel(77).with_start_of_frame(true));
        h.tick(Token::pixel(1), false);
        assert_eq!(h.output().value, 77);
        h.tick(Token::BUBBLE, true);
        assert!(!h.output().valid);
    }

    #[test]
    fn height_latches_at_frame_start() {
        let mut h = Histogram::new(8, FrameSize::new(1, 1));
        h.set_frame_size(FrameSize::new(1, 3));
        feed(&mut h, 1, 2, |_| 0);
        assert!(!h.frame_done());
        h.tick(Token::pixel(0).with_end_of_row(true), true);
        assert!(h.frame_done());
        assert_eq!(h.read(0), 3);
    }
}
