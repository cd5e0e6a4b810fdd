//! The atomic unit of every pixel stream.
//!
//! A [`Token`] is one pixel value plus three control bits. Frames are sent
//! in raster order: the first pixel of a frame carries `start_of_frame`,
//! the last pixel of each row carries `end_of_row`.

use serde::{Deserialize, Serialize};

/// One pixel of a raster-scanned stream plus its control bits.
///
/// `value` holds at most [`MAX_PIXEL_WIDTH`] significant bits for single
/// channel streams; three-channel streams pack channels with
/// [`Token::rgb`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Pixel value (unsigned, `pixel_width` bits per channel).
    pub value: u32,
    /// Producer-side valid flag.
    pub valid: bool,
    /// Set on the last pixel of a row.
    pub end_of_row: bool,
    /// Set on the first pixel of a frame.
    pub start_of_frame: bool,
}

/// Largest supported per-channel pixel width in bits.
///
/// Three packed 16-bit channels need 48 bits, so packed RGB streams are
/// limited to `pixel_width <= 10`. See [`Token::rgb`].
pub const MAX_PIXEL_WIDTH: u32 = 16;

impl Token {
    /// An invalid token (a bubble). Carries no data and no control bits.
    pub const BUBBLE: Self = Self {
        value: 0,
        valid: false,
        end_of_row: false,
        start_of_frame: false,
    };

    /// A valid token with no control bits set.
    #[must_use]
    pub const fn pixel(value: u32) -> Self {
        Self {
            value,
            valid: true,
            end_of_row: false,
            start_of_frame: false,
        }
    }

    /// Set `end_of_row` on this token.
    #[must_use]
    pub const fn with_end_of_row(mut self, end_of_row: bool) -> Self {
        self.end_of_row = end_of_row;
        self
    }

    /// Set `start_of_frame` on this token.
    #[must_use]
    pub const fn with_start_of_frame(mut self, start_of_frame: bool) -> Self {
        self.start_of_frame = start_of_frame;
        self
    }

    /// Replace the value, keeping the control bits.
    #[must_use]
    pub const fn with_value(mut self, value: u32) -> Self {
        self.value = value;
        self
    }

    /// Pack three channels of `pixel_width` bits as `R | G | B`, red in the
    /// most significant position.
    #[must_use]
    pub const fn pack_rgb(r: u32, g: u32, b: u32, pixel_width: u32) -> u32 {
        (r << (2 * pixel_width)) | (g << pixel_width) | b
    }

    /// A valid token carrying a packed RGB triple.
    #[must_use]
    pub const fn rgb(r: u32, g: u32, b: u32, pixel_width: u32) -> Self {
        Self::pixel(Self::pack_rgb(r, g, b, pixel_width))
    }

    /// Split a packed value back into `(r, g, b)`.
    #[must_use]
    pub const fn unpack_rgb(value: u32, pixel_width: u32) -> (u32, u32, u32) {
        let mask = max_value(pixel_width);
        (
            (value >> (2 * pixel_width)) & mask,
            (value >> pixel_width) & mask,
            value & mask,
        )
    }
}

/// Largest value representable in `pixel_width` bits.
#[must_use]
pub const fn max_value(pixel_width: u32) -> u32 {
    if pixel_width >= 32 {
        u32::MAX
    } else {
        (1 << pixel_width) - 1
    }
}

/// Declared dimensions of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    /// Pixels per row.
    pub width: usize,
    /// Rows per frame.
    pub height: usize,
}

impl FrameSize {
    /// Create a new frame size.
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width * self.height
    }

    /// Frame size after a `kernel_size` x `kernel_size` neighborhood stage
    /// has dropped its border.
    #[must_use]
    pub const fn shrink(self, kernel_size: usize) -> Self {
        let border = kernel_size - 1;
        Self {
            width: self.width.saturating_sub(border),
            height: self.height.saturating_sub(border),
        }
    }
}

/// Raster position of the most recently accepted pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramePosition {
    /// Column within the row.
    pub column: usize,
    /// Row within the frame.
    pub row: usize,
}

impl FramePosition {
    /// Create a new position.
    #[must_use]
    pub const fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }
}
