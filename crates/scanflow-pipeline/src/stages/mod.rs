//! Concrete stages built on [`PointStage`](crate::kernel::PointStage),
//! [`WindowStage`](crate::kernel::WindowStage) and the [`Stage`] contract.

pub mod blur;
pub mod color;
pub mod edge;
pub mod histogram;
pub mod median;
pub mod resample;
pub mod threshold;

pub use blur::{Blur3, Blur5};
pub use color::ColorReduce;
pub use edge::Gradient;
pub use histogram::Histogram;
pub use median::Median3;
pub use resample::Scaler;
pub use threshold::Threshold;

use crate::kernel::{PointStage, Stage, WindowStage};
use crate::token::FrameSize;
use crate::types::{ChainConfig, StageConfig, StreamError};

/// Build one stage from its configuration.
///
/// `initial` is the frame size assumed until
/// [`Stage::set_frame_size`] declares another one.
///
/// # Errors
///
/// Returns [`StreamError::InvalidConfig`] if a windowed stage cannot fit
/// its kernel in `config.max_image_width`.
pub fn build(
    stage: &StageConfig,
    config: &ChainConfig,
    initial: FrameSize,
) -> Result<Box<dyn Stage>, StreamError> {
    let max_width = config.max_image_width;
    Ok(match *stage {
        StageConfig::ColorReduce => Box::new(PointStage::new(ColorReduce::new(config.pixel_width))),
        StageConfig::Threshold {
            threshold,
            max_value,
            invert,
        } => Box::new(PointStage::new(Threshold::new(threshold, max_value, invert))),
        StageConfig::Blur3 => Box::new(WindowStage::new(Blur3, max_width)?),
        StageConfig::Blur5 => Box::new(WindowStage::new(Blur5, max_width)?),
        StageConfig::Edge => Box::new(WindowStage::new(
            Gradient::new(config.pixel_width),
            max_width,
        )?),
        StageConfig::Median => Box::new(WindowStage::new(Median3, max_width)?),
        StageConfig::Histogram => Box::new(Histogram::new(config.pixel_width, initial)),
        StageConfig::Scale { width, height } => {
            Box::new(Scaler::new(FrameSize::new(width, height), initial))
        }
    })
}
