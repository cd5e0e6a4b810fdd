//! Streaming nearest-neighbor downscaler.
//!
//! Output pixel `(x, y)` takes source pixel
//! `(floor(x * in_w / out_w), floor(y * in_h / out_h))`. Because the output
//! is never larger than the input, every source pixel is selected at most
//! once and selection can happen as the stream passes. Unselected pixels
//! become bubbles. Upscaling needs buffering and is not supported: an
//! output axis larger than the input is clamped to the input size.

use std::any::Any;

use crate::kernel::{SlotPipeline, Stage};
use crate::token::{FrameSize, Token};

/// Nearest-neighbor scaler. Depth 1.
#[derive(Debug, Clone)]
pub struct Scaler {
    target: FrameSize,
    pending_input: FrameSize,
    input: FrameSize,
    out: FrameSize,
    column: usize,
    row: usize,
    out_x: usize,
    out_y: usize,
    pipeline: SlotPipeline,
}

/// Source index feeding output index `o` along an axis.
const fn source_index(o: usize, input: usize, output: usize) -> usize {
    o * input / output
}

const fn clamp_size(target: FrameSize, input: FrameSize) -> FrameSize {
    FrameSize {
        width: if target.width < input.width {
            target.width
        } else {
            input.width
        },
        height: if target.height < input.height {
            target.height
        } else {
            input.height
        },
    }
}

impl Scaler {
    /// Scale frames of `input` size down to `target`.
    #[must_use]
    pub fn new(target: FrameSize, input: FrameSize) -> Self {
        Self {
            target,
            pending_input: input,
            input,
            out: clamp_size(target, input),
            column: 0,
            row: 0,
            out_x: 0,
            out_y: 0,
            pipeline: SlotPipeline::new(1),
        }
    }

    /// Requested output size.
    #[must_use]
    pub const fn target(&self) -> FrameSize {
        self.target
    }

    fn select(&mut self, token: Token) -> Token {
        if token.start_of_frame {
            self.input = self.pending_input;
            self.out = clamp_size(self.target, self.input);
            self.column = 0;
            self.row = 0;
            self.out_x = 0;
            self.out_y = 0;
        }

        let row_selected = self.out.width > 0
            && self.out_y < self.out.height
            && self.row == source_index(self.out_y, self.input.height, self.out.height);
        let selected = row_selected
            && self.out_x < self.out.width
            && self.column == source_index(self.out_x, self.input.width, self.out.width);

        let emitted = if selected {
            let out = Token {
                value: token.value,
                valid: true,
                end_of_row: self.out_x + 1 == self.out.width,
                start_of_frame: self.out_x == 0 && self.out_y == 0,
            };
            self.out_x += 1;
            out
        } else {
            Token::BUBBLE
        };

        if token.end_of_row {
            self.column = 0;
            self.row += 1;
            self.out_x = 0;
            if row_selected {
                self.out_y += 1;
            }
        } else {
            self.column += 1;
        }
        emitted
    }
}

impl Stage for Scaler {
    fn name(&self) -> &'static str {
        "scale"
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
        let slot0 = if input.valid {
            self.select(input)
        } else {
            Token::BUBBLE
        };
        self.pipeline.shift(slot0);
    }

    fn set_frame_size(&mut self, size: FrameSize) {
        self.pending_input = size;
    }

    fn output_size(&self, input: FrameSize) -> FrameSize {
        clamp_size(self.target, input)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
