//! Fixed-depth lock-step pipelines and the contract every stage exposes.
//!
//! A stage of depth `D` owns a [`SlotPipeline`]: `D` token slots that shift
//! together on every accepted tick. The stage computes its result into slot
//! 0 and presents the last slot downstream, so a token's data and control
//! bits reach the output exactly `D` accepted ticks after it entered,
//! whatever the arithmetic did.

use std::any::Any;

use crate::token::{FrameSize, Token};
use crate::window::{Window, WindowConfig, WindowEngine};

/// Ring of `D` token slots advanced once per accepted tick.
///
/// Slot order is kept by a head index instead of moving data: the slot at
/// `head` is the oldest (the stage output) and is overwritten by the
/// newest token on each shift.
#[derive(Debug, Clone)]
pub struct SlotPipeline {
    slots: Vec<Token>,
    head: usize,
}

impl SlotPipeline {
    /// Create a pipeline of `depth` slots filled with bubbles.
    ///
    /// A depth of zero is raised to one: every stage registers its output.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            slots: vec![Token::BUBBLE; depth.max(1)],
            head: 0,
        }
    }

    /// Number of slots.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Contents of the last slot.
    #[must_use]
    pub fn output(&self) -> Token {
        self.slots[self.head]
    }

    /// Shift every slot forward, loading `token` into slot 0.
    pub fn shift(&mut self, token: Token) {
        self.slots[self.head] = token;
        self.head = (self.head + 1) % self.slots.len();
    }
}

/// The handshake-facing contract of a streaming stage.
///
/// Stages are driven by a single synchronous tick. On each tick the caller
/// reads [`output`](Self::output), decides downstream readiness, then calls
/// [`tick`](Self::tick) with the upstream token and that readiness. When
/// `ready` is false the stage must not change any state.
pub trait Stage: std::fmt::Debug + Send + 'static {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Ticks between accepting a token and presenting its result.
    fn depth(&self) -> usize;

    /// Token presented downstream on the current tick.
    fn output(&self) -> Token;

    /// Advance one tick. `input` is the upstream token on this tick;
    /// `ready` is the downstream readiness.
    fn tick(&mut self, input: Token, ready: bool);

    /// Readiness presented upstream. Stages in this crate never stall
    /// internally, so this mirrors the consumer.
    fn ready(&self, downstream_ready: bool) -> bool {
        downstream_ready
    }

    /// Declare the size of the next frame. Latched at the next accepted
    /// `start_of_frame`.
    fn set_frame_size(&mut self, _size: FrameSize) {}

    /// Size of the frame this stage emits for an input frame of `input`.
    fn output_size(&self, input: FrameSize) -> FrameSize {
        input
    }

    /// Accepted input tokens from frame start until this stage can emit
    /// its first valid token, excluding [`depth`](Self::depth).
    fn fill_latency(&self, _input: FrameSize) -> usize {
        0
    }

    /// Access the concrete stage, e.g. to read a histogram port.
    fn as_any(&self) -> &dyn Any;
}

/// Per-pixel arithmetic with no neighborhood dependency.
pub trait PointKernel: std::fmt::Debug + Send + 'static {
    /// Stage name.
    const NAME: &'static str;
    /// Pipeline depth.
    const DEPTH: usize;

    /// Map one input value to one output value.
    fn apply(&self, value: u32) -> u32;
}

/// Arithmetic over a `K x K` neighborhood.
pub trait WindowKernel: std::fmt::Debug + Send + 'static {
    /// Stage name.
    const NAME: &'static str;
    /// Pipeline depth.
    const DEPTH: usize;
    /// Window edge length `K`.
    const KERNEL_SIZE: usize;

    /// Reduce a fully populated window to one output value.
    fn apply(&self, window: &Window) -> u32;
}

/// A [`PointKernel`] wrapped in a lock-step slot pipeline.
///
/// Control bits of each input token travel with its result.
#[derive(Debug)]
pub struct PointStage<K: PointKernel> {
    kernel: K,
    pipeline: SlotPipeline,
}

impl<K: PointKernel> PointStage<K> {
    /// Wrap a kernel.
    #[must_use]
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            pipeline: SlotPipeline::new(K::DEPTH),
        }
    }

    /// The wrapped kernel.
    #[must_use]
    pub const fn kernel(&self) -> &K {
        &self.kernel
    }
}

impl<K: PointKernel> Stage for PointStage<K> {
    fn name(&self) -> &'static str {
        K::NAME
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
            input.with_value(self.kernel.apply(input.value))
        } else {
            Token::BUBBLE
        };
        self.pipeline.shift(slot0);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A [`WindowKernel`] fed by a [`WindowEngine`] through a lock-step slot
/// pipeline.
///
/// Only valid windows produce valid tokens, so the emitted frame is the
/// input frame minus a `K / 2` border on every side. The first valid window
/// carries `start_of_frame` and the last valid window of each row carries
/// `end_of_row`, so the output is itself a well-formed frame.
#[derive(Debug)]
pub struct WindowStage<K: WindowKernel> {
    kernel: K,
    engine: WindowEngine,
    pipeline: SlotPipeline,
}

impl<K: WindowKernel> WindowStage<K> {
    /// Wrap a kernel with a row store sized for `max_image_width`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`](crate::StreamError::InvalidConfig)
    /// if `max_image_width` cannot hold a `K`-wide window.
    pub fn new(kernel: K, max_image_width: usize) -> Result<Self, crate::StreamError> {
        let config = WindowConfig::new(K::KERNEL_SIZE, max_image_width)?;
        Ok(Self {
            kernel,
            engine: WindowEngine::new(config),
            pipeline: SlotPipeline::new(K::DEPTH),
        })
    }

    /// The windowing engine feeding this stage.
    #[must_use]
    pub const fn engine(&self) -> &WindowEngine {
        &self.engine
    }
}

impl<K: WindowKernel> Stage for WindowStage<K> {
    fn name(&self) -> &'static str {
        K::NAME
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
        let status = self.engine.advance(input);
        let slot0 = if status.valid {
            Token {
                value: self.kernel.apply(self.engine.window()),
                valid: true,
                end_of_row: status.end_of_row,
                start_of_frame: status.first,
            }
        } else {
            Token::BUBBLE
        };
        self.pipeline.shift(slot0);
    }

    fn set_frame_size(&mut self, size: FrameSize) {
        self.engine.set_image_width(size.width);
    }

    fn output_size(&self, input: FrameSize) -> FrameSize {
        input.shrink(K::KERNEL_SIZE)
    }

    fn fill_latency(&self, input: FrameSize) -> usize {
        self.engine.config().fill_latency(input.width)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct AddOne;

    impl PointKernel for AddOne {
        const NAME: &'static str = "add_one";
        const DEPTH: usize = 2;

        fn apply(&self, value: u32) -> u32 {
            value + 1
        }
    }

    /// Sum of all cells.
    #[derive(Debug)]
    struct BoxSum;

    impl WindowKernel for BoxSum {
        const NAME: &'static str = "box_sum";
        const DEPTH: usize = 1;
        const KERNEL_SIZE: usize = 3;

        fn apply(&self, window: &Window) -> u32 {
            window.cells().iter().sum()
        }
    }

    fn frame(width: usize, height: usize, value: u32) -> Vec<Token> {
        (0..width * height)
            .map(|i| {
                Token::pixel(value)
                    .with_start_of_frame(i == 0)
                    .with_end_of_row(i % width == width - 1)
            })
            .collect()
    }

    #[test]
    fn point_stage_carries_control_bits() {
        let mut stage = PointStage::new(AddOne);
        stage.tick(Token::pixel(1).with_start_of_frame(true), true);
        stage.tick(Token::pixel(2).with_end_of_row(true), true);
        let out = stage.output();
        assert_eq!(out.value, 2);
        assert!(out.start_of_frame && !out.end_of_row);
        stage.tick(Token::BUBBLE, true);
        let out = stage.output();
        assert_eq!(out.value, 3);
        assert!(out.end_of_row && !out.start_of_frame);
        assert_eq!(stage.name(), "add_one");
    }

    #[test]
    fn point_stage_holds_when_not_ready() {
        let mut stage = PointStage::new(AddOne);
        stage.tick(Token::pixel(1), true);
        stage.tick(Token::pixel(5), false);
        stage.tick(Token::pixel(6), false);
        stage.tick(Token::BUBBLE, true);
        assert_eq!(stage.output().value, 2);
        stage.tick(Token::BUBBLE, true);
        assert!(!stage.output().valid);
    }

    #[test]
    fn window_stage_emits_interior_frame() {
        let mut stage = WindowStage::new(BoxSum, 8).unwrap();
        stage.set_frame_size(FrameSize::new(5, 4));
        let mut out = Vec::new();
        for token in frame(5, 4, 2) {
            stage.tick(token, true);
            if stage.output().valid {
                out.push(stage.output());
            }
        }
        stage.tick(Token::BUBBLE, true);
        if stage.output().valid {
            out.push(stage.output());
        }

        assert_eq!(
            out.len(),
            stage.output_size(FrameSize::new(5, 4)).pixel_count()
        );
        assert!(out.iter().all(|t| t.value == 18));
        assert!(out[0].start_of_frame);
        assert_eq!(out.iter().filter(|t| t.start_of_frame).count(), 1);
        let rows_ended: Vec<usize> = out
            .iter()
            .enumerate()
            .filter(|(_, t)| t.end_of_row)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(rows_ended, vec![2, 5]);
    }

    #[test]
    fn window_stage_reports_fill_latency() {
        let stage = WindowStage::new(BoxSum, 8).unwrap();
        assert_eq!(stage.fill_latency(FrameSize::new(6, 6)), 14);
        assert_eq!(stage.output_size(FrameSize::new(6, 6)), FrameSize::new(4, 4));
    }

    #[test]
    fn window_stage_rejects_narrow_store() {
        assert!(WindowStage::new(BoxSum, 2).is_err());
    }

    #[test]
    fn depth_one_is_a_register() {
        let mut p = SlotPipeline::new(1);
        assert!(!p.output().valid);
        p.shift(Token::pixel(4));
        assert_eq!(p.output(), Token::pixel(4));
    }

    #[test]
    fn zero_depth_is_raised_to_one() {
        assert_eq!(SlotPipeline::new(0).depth(), 1);
    }

    #[test]
    fn token_emerges_after_depth_shifts() {
        for depth in 1..=4 {
            let mut p = SlotPipeline::new(depth);
            p.shift(Token::pixel(9).with_end_of_row(true));
            for _ in 1..depth {
                assert!(!p.output().valid, "depth {depth} emitted early");
                p.shift(Token::BUBBLE);
            }
            let out = p.output();
            assert_eq!(out.value, 9);
            assert!(out.end_of_row);
        }
    }

    #[test]
    fn order_is_preserved() {
        let mut p = SlotPipeline::new(3);
        let mut seen = Vec::new();
        for v in 0..10 {
            p.shift(Token::pixel(v));
            if p.output().valid {
                seen.push(p.output().value);
            }
        }
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
