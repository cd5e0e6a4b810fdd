//! Shared configuration and error types for scanflow chains.

use serde::{Deserialize, Serialize};

use crate::token::{FrameSize, MAX_PIXEL_WIDTH, max_value};

/// Configuration of one stage in a chain.
///
/// Serialized with an internal `kind` tag, e.g.
/// `{"kind": "threshold", "threshold": 100, "max_value": 255, "invert": false}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    /// Packed three-channel input reduced to one luma channel.
    ColorReduce,
    /// Binary classification against a fixed threshold.
    Threshold {
        /// Values strictly above this classify as foreground.
        threshold: u32,
        /// Output value for foreground pixels.
        max_value: u32,
        /// Swap foreground and background outputs.
        #[serde(default)]
        invert: bool,
    },
    /// 3x3 weighted-sum blur.
    Blur3,
    /// 5x5 weighted-sum blur.
    Blur5,
    /// 3x3 gradient magnitude edge detector.
    Edge,
    /// 3x3 median filter.
    Median,
    /// Pass-through stage accumulating a 256-bin histogram per frame.
    Histogram,
    /// Nearest-neighbor downscaler to a fixed output size.
    Scale {
        /// Output width in pixels.
        width: usize,
        /// Output height in pixels.
        height: usize,
    },
}

impl StageConfig {
    /// Short stage name used in logs and diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ColorReduce => "color_reduce",
            Self::Threshold { .. } => "threshold",
            Self::Blur3 => "blur3",
            Self::Blur5 => "blur5",
            Self::Edge => "edge",
            Self::Median => "median",
            Self::Histogram => "histogram",
            Self::Scale { .. } => "scale",
        }
    }
}

/// Configuration for a whole chain of stages.
///
/// All values are fixed for the lifetime of the chain; only the frame
/// size may change, and only between frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Bits per pixel channel.
    #[serde(default = "ChainConfig::default_pixel_width")]
    pub pixel_width: u32,

    /// Widest frame any windowed stage must buffer.
    #[serde(default = "ChainConfig::default_max_image_width")]
    pub max_image_width: usize,

    /// Stages in stream order.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl ChainConfig {
    /// Default bits per channel.
    pub const DEFAULT_PIXEL_WIDTH: u32 = 8;

    /// Default row store width.
    pub const DEFAULT_MAX_IMAGE_WIDTH: usize = 4096;

    /// Widest channel a packed RGB stream can carry in a 32-bit token.
    pub const MAX_RGB_PIXEL_WIDTH: u32 = 10;

    const fn default_pixel_width() -> u32 {
        Self::DEFAULT_PIXEL_WIDTH
    }

    const fn default_max_image_width() -> usize {
        Self::DEFAULT_MAX_IMAGE_WIDTH
    }

    /// Check the configuration without building anything.
    ///
    /// Kernel-size checks happen when the windowed stages are built; this
    /// covers everything that only depends on the config values.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] describing the first
    /// violated rule.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.pixel_width == 0 || self.pixel_width > MAX_PIXEL_WIDTH {
            return Err(StreamError::InvalidConfig(format!(
                "pixel width must be in 1..={MAX_PIXEL_WIDTH}, got {}",
                self.pixel_width
            )));
        }
        if self.max_image_width == 0 {
            return Err(StreamError::InvalidConfig(
                "max image width must be at least 1".to_string(),
            ));
        }
        let max = max_value(self.pixel_width);
        for stage in &self.stages {
            match *stage {
                StageConfig::ColorReduce if self.pixel_width > Self::MAX_RGB_PIXEL_WIDTH => {
                    return Err(StreamError::InvalidConfig(format!(
                        "color reduction packs three channels; pixel width {} exceeds {}",
                        self.pixel_width,
                        Self::MAX_RGB_PIXEL_WIDTH
                    )));
                }
                StageConfig::Threshold {
                    threshold,
                    max_value,
                    ..
                } if threshold > max || max_value > max => {
                    return Err(StreamError::InvalidConfig(format!(
                        "threshold {threshold} / max value {max_value} do not fit in {} bits",
                        self.pixel_width
                    )));
                }
                StageConfig::Scale { width, height } if width == 0 || height == 0 => {
                    return Err(StreamError::InvalidConfig(format!(
                        "scaler output size must be non-zero, got {width}x{height}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check that frames of `size` fit the row buffers.
    ///
    /// Streaming a frame wider than `max_image_width` is a caller contract
    /// violation the engines do not guard against; callers that take the
    /// size from outside input check it here first.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if `size.width` exceeds
    /// `max_image_width`.
    pub fn check_frame_size(&self, size: FrameSize) -> Result<(), StreamError> {
        if size.width > self.max_image_width {
            return Err(StreamError::InvalidConfig(format!(
                "frame width {} exceeds max image width {}",
                size.width, self.max_image_width
            )));
        }
        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            pixel_width: Self::DEFAULT_PIXEL_WIDTH,
            max_image_width: Self::DEFAULT_MAX_IMAGE_WIDTH,
            stages: Vec::new(),
        }
    }
}

/// Errors raised while building chains or crossing the raster boundary.
///
/// Streaming itself has no error path; these only come from construction
/// and image conversion.
///
/// Serialization goes through a proxy because `image::ImageError` does not
/// implement serde. A serialized `ImageDecode` deserializes as
/// `DecodeMessage`, which keeps the decode category and display text but
/// not the typed source error.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// A configuration value is out of range.
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A decode failure known only by its message.
    #[error("failed to decode image: {0}")]
    DecodeMessage(String),

    /// Collected output does not fill the declared frame.
    #[error("frame holds {actual} pixels, expected {expected}")]
    FrameShape {
        /// Pixels the declared frame size requires.
        expected: usize,
        /// Pixels actually collected.
        actual: usize,
    },
}

/// Serde-compatible proxy for `StreamError`.
///
/// `image::ImageError` does not implement serde, so `ImageDecode` is
/// carried as its display string.
#[derive(Serialize, Deserialize)]
enum StreamErrorProxy {
    InvalidConfig(String),
    EmptyInput,
    ImageDecode(String),
    FrameShape { expected: usize, actual: usize },
}

impl Serialize for StreamError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidConfig(s) => StreamErrorProxy::InvalidConfig(s.clone()),
            Self::EmptyInput => StreamErrorProxy::EmptyInput,
            Self::ImageDecode(e) => StreamErrorProxy::ImageDecode(e.to_string()),
            Self::DecodeMessage(msg) => StreamErrorProxy::ImageDecode(msg.clone()),
            Self::FrameShape { expected, actual } => StreamErrorProxy::FrameShape {
                expected: *expected,
                actual: *actual,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StreamError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match StreamErrorProxy::deserialize(deserializer)? {
            StreamErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            StreamErrorProxy::EmptyInput => Self::EmptyInput,
            StreamErrorProxy::ImageDecode(msg) => Self::DecodeMessage(msg),
            StreamErrorProxy::FrameShape { expected, actual } => {
                Self::FrameShape { expected, actual }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.pixel_width, 8);
        assert_eq!(config.max_image_width, 4096);
        assert!(config.stages.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stage_config_json_uses_kind_tag() {
        let json = r#"{
            "stages": [
                {"kind": "color_reduce"},
                {"kind": "blur3"},
                {"kind": "threshold", "threshold": 100, "max_value": 255}
            ]
        }"#;
        let config: ChainConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pixel_width, ChainConfig::DEFAULT_PIXEL_WIDTH);
        assert_eq!(
            config.stages,
            vec![
                StageConfig::ColorReduce,
                StageConfig::Blur3,
                StageConfig::Threshold {
                    threshold: 100,
                    max_value: 255,
                    invert: false
                },
            ]
        );
    }

    #[test]
    fn chain_config_serde_round_trip() {
        let config = ChainConfig {
            pixel_width: 10,
            max_image_width: 640,
            stages: vec![
                StageConfig::Median,
                StageConfig::Scale {
                    width: 320,
                    height: 240,
                },
                StageConfig::Histogram,
            ],
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ChainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn rejects_pixel_width_out_of_range() {
        for pixel_width in [0, 17] {
            let config = ChainConfig {
                pixel_width,
                ..ChainConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(StreamError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn rejects_wide_color_reduce() {
        let config = ChainConfig {
            pixel_width: 12,
            stages: vec![StageConfig::ColorReduce],
            ..ChainConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_threshold_wider_than_pixel() {
        let config = ChainConfig {
            stages: vec![StageConfig::Threshold {
                threshold: 300,
                max_value: 255,
                invert: false,
            }],
            ..ChainConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_scale() {
        let config = ChainConfig {
            stages: vec![StageConfig::Scale {
                width: 0,
                height: 4,
            }],
            ..ChainConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            StreamError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            StreamError::FrameShape {
                expected: 16,
                actual: 12
            }
            .to_string(),
            "frame holds 12 pixels, expected 16"
        );
        assert_eq!(
            StreamError::InvalidConfig("bad".to_string()).to_string(),
            "invalid stream configuration: bad"
        );
    }

    #[test]
    fn error_serde_round_trip() {
        let err = StreamError::FrameShape {
            expected: 4,
            actual: 3,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: StreamError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            StreamError::FrameShape {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn decode_error_keeps_category_through_serde() {
        let err = crate::raster::decode(&[0xFF, 0xFE, 0x00, 0x01]).unwrap_err();
        let text = err.to_string();
        let json = serde_json::to_string(&err).unwrap();
        let back: StreamError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, StreamError::DecodeMessage(_)));
        assert_eq!(back.to_string(), text);

        let again: StreamError =
            serde_json::from_str(&serde_json::to_string(&back).unwrap()).unwrap();
        assert_eq!(again.to_string(), text);
    }

    #[test]
    fn frame_wider_than_row_store_is_rejected() {
        let config = ChainConfig {
            max_image_width: 16,
            ..ChainConfig::default()
        };
        assert!(config.check_frame_size(FrameSize::new(16, 4)).is_ok());
        assert!(matches!(
            config.check_frame_size(FrameSize::new(20, 4)),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn stage_names() {
        assert_eq!(StageConfig::Blur5.name(), "blur5");
        assert_eq!(StageConfig::Scale { width: 1, height: 1 }.name(), "scale");
    }
}
