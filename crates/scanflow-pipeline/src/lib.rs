//! scanflow-pipeline: streaming pixel pipelines driven tick by tick.
//!
//! Pixels travel as [`Token`]s through a [`Chain`] of fixed-depth
//! [`Stage`]s connected by a valid/ready handshake. Windowed stages see a
//! K×K neighborhood assembled from K−1 row buffers, so the whole chain
//! processes one pixel per tick without ever holding a frame.
//!
//! The crate has **no I/O**: [`raster`] converts between in-memory images
//! and token streams, and [`sim`] drives a chain from a source to a sink
//! under a chosen [`Backpressure`] pattern.

pub mod chain;
pub mod diagnostics;
pub mod handshake;
pub mod kernel;
pub mod raster;
pub mod sim;
pub mod stages;
pub mod token;
pub mod types;
pub mod window;

pub use chain::Chain;
pub use diagnostics::{RunReport, StageReport};
pub use handshake::Backpressure;
pub use kernel::Stage;
pub use sim::{RunOutput, run};
pub use token::{FramePosition, FrameSize, Token};
pub use types::{ChainConfig, StageConfig, StreamError};

/// Build a chain from `config` and stream one image-sized frame of
/// `tokens` through it without backpressure.
///
/// # Errors
///
/// Returns [`StreamError::InvalidConfig`] if the configuration is invalid.
pub fn process(
    config: &ChainConfig,
    size: FrameSize,
    tokens: Vec<Token>,
) -> Result<RunOutput, StreamError> {
    let mut chain = Chain::from_config(config, size)?;
    run(&mut chain, tokens, &Backpressure::Always)
}
