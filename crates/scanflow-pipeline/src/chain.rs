//! Pipeline composer: stages connected end-to-end by the handshake.
//!
//! A [`Chain`] is itself a [`Stage`], so chains nest. On every tick all
//! stages advance together: each stage sees the output its upstream
//! neighbor presented *before* the tick, which is why stages are ticked
//! from last to first.

use std::any::Any;

use log::debug;

use crate::diagnostics::StageReport;
use crate::handshake::transfers;
use crate::kernel::Stage;
use crate::token::{FrameSize, Token};
use crate::types::{ChainConfig, StreamError};

/// Per-stage transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    accepted: u64,
    emitted: u64,
}

/// An ordered sequence of stages.
#[derive(Debug)]
pub struct Chain {
    stages: Vec<Box<dyn Stage>>,
    counters: Vec<Counters>,
    readiness: Vec<bool>,
}

impl Chain {
    /// Build a chain from configuration, assuming frames of `initial`
    /// size until [`Stage::set_frame_size`] declares another.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if the configuration is
    /// invalid, names no stages, or `initial` is wider than
    /// `max_image_width`.
    pub fn from_config(config: &ChainConfig, initial: FrameSize) -> Result<Self, StreamError> {
        config.validate()?;
        config.check_frame_size(initial)?;
        let mut size = initial;
        let mut stages = Vec::with_capacity(config.stages.len());
        for stage_config in &config.stages {
            let stage = crate::stages::build(stage_config, config, size)?;
            size = stage.output_size(size);
            stages.push(stage);
        }
        let mut chain = Self::new(stages)?;
        chain.set_frame_size(initial);
        Ok(chain)
    }

    /// Compose already-built stages in stream order.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if `stages` is empty.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, StreamError> {
        if stages.is_empty() {
            return Err(StreamError::InvalidConfig(
                "a chain needs at least one stage".to_string(),
            ));
        }
        debug!(
            "chain built: {} (depth {})",
            stages
                .iter()
                .map(|s| format!("{}[{}]", s.name(), s.depth()))
                .collect::<Vec<_>>()
                .join(" -> "),
            stages.iter().map(|s| s.depth()).sum::<usize>()
        );
        let n = stages.len();
        Ok(Self {
            stages,
            counters: vec![Counters::default(); n],
            readiness: vec![true; n],
        })
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false`: chains hold at least one stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The stages, in stream order.
    pub fn stages(&self) -> impl Iterator<Item = &dyn Stage> {
        self.stages.iter().map(|stage| &**stage)
    }

    /// First stage of concrete type `T`, e.g. a
    /// [`Histogram`](crate::stages::Histogram) to read its port.
    #[must_use]
    pub fn find<T: Stage>(&self) -> Option<&T> {
        self.stages
            .iter()
            .find_map(|stage| stage.as_any().downcast_ref::<T>())
    }

    /// Ticks from accepting the first pixel of a frame until the first
    /// output pixel is presented: the sum of stage depths plus the fill
    /// latency of every windowed stage, each measured in the tokens that
    /// stage accepts.
    #[must_use]
    pub fn latency(&self, input: FrameSize) -> usize {
        let mut size = input;
        let mut total = 0;
        for stage in &self.stages {
            total += stage.depth() + stage.fill_latency(size);
            size = stage.output_size(size);
        }
        total
    }

    /// Transfer counts per stage since construction.
    #[must_use]
    pub fn stage_reports(&self) -> Vec<StageReport> {
        self.stages
            .iter()
            .zip(&self.counters)
            .map(|(stage, counters)| StageReport {
                name: stage.name().to_string(),
                depth: stage.depth(),
                accepted: counters.accepted,
                emitted: counters.emitted,
            })
            .collect()
    }
}

impl Stage for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn depth(&self) -> usize {
        self.stages.iter().map(|s| s.depth()).sum()
    }

    fn output(&self) -> Token {
        self.stages
            .last()
            .map_or(Token::BUBBLE, |stage| stage.output())
    }

    fn ready(&self, downstream_ready: bool) -> bool {
        self.stages
            .iter()
            .rev()
            .fold(downstream_ready, |ready, stage| stage.ready(ready))
    }

    fn tick(&mut self, input: Token, ready: bool) {
        // Readiness each stage sees from its consumer.
        let mut downstream = ready;
        for (stage, slot) in self.stages.iter().zip(&mut self.readiness).rev() {
            *slot = downstream;
            downstream = stage.ready(downstream);
        }

        for i in (0..self.stages.len()).rev() {
            let upstream = if i == 0 {
                input
            } else {
                self.stages[i - 1].output()
            };
            let ready = self.readiness[i];
            if transfers(upstream, ready) {
                self.counters[i].accepted += 1;
            }
            if transfers(self.stages[i].output(), ready) {
                self.counters[i].emitted += 1;
            }
            self.stages[i].tick(upstream, ready);
        }
    }

    fn set_frame_size(&mut self, size: FrameSize) {
        let mut size = size;
        for stage in &mut self.stages {
            stage.set_frame_size(size);
            size = stage.output_size(size);
        }
    }

    fn output_size(&self, input: FrameSize) -> FrameSize {
        self.stages
            .iter()
            .fold(input, |size, stage| stage.output_size(size))
    }

    fn fill_latency(&self, input: FrameSize) -> usize {
        self.latency(input) - self.depth()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
