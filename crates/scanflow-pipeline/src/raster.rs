//! Bridge between in-memory images and token streams.
//!
//! Images enter as raster-order tokens with `start_of_frame` on the first
//! pixel and `end_of_row` on the last pixel of each row, and leave as
//! `GrayImage`s rebuilt from the collected values.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::token::{FrameSize, Token, max_value};
use crate::types::StreamError;

/// Tokens for one frame of `values` in raster order.
///
/// Values beyond `size.pixel_count()` are ignored; a short `values` yields
/// a truncated frame.
#[must_use]
pub fn frame_tokens(size: FrameSize, values: &[u32]) -> Vec<Token> {
    values
        .iter()
        .take(size.pixel_count())
        .enumerate()
        .map(|(i, &value)| {
            Token::pixel(value)
                .with_start_of_frame(i == 0)
                .with_end_of_row(size.width > 0 && i % size.width == size.width - 1)
        })
        .collect()
}

/// Size of an image as a [`FrameSize`].
#[must_use]
pub const fn image_size(width: u32, height: u32) -> FrameSize {
    FrameSize::new(width as usize, height as usize)
}

/// Widen or narrow an 8-bit sample to `pixel_width` bits by shifting.
#[must_use]
pub fn from_u8(sample: u8, pixel_width: u32) -> u32 {
    let v = u32::from(sample);
    if pixel_width >= 8 {
        v << (pixel_width - 8)
    } else {
        v >> (8 - pixel_width)
    }
}

/// Tokens for an 8-bit grayscale image at `pixel_width` bits per pixel.
#[must_use]
pub fn gray_tokens(image: &GrayImage, pixel_width: u32) -> Vec<Token> {
    let values: Vec<u32> = image
        .pixels()
        .map(|p| from_u8(p.0[0], pixel_width))
        .collect();
    frame_tokens(image_size(image.width(), image.height()), &values)
}

/// Tokens for an RGB image, each channel at `pixel_width` bits, packed red
/// high.
#[must_use]
pub fn rgb_tokens(image: &RgbImage, pixel_width: u32) -> Vec<Token> {
    let values: Vec<u32> = image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0.map(|c| from_u8(c, pixel_width));
            Token::pack_rgb(r, g, b, pixel_width)
        })
        .collect();
    frame_tokens(image_size(image.width(), image.height()), &values)
}

/// Split a token stream into frames at each `start_of_frame`, keeping only
/// the values. Tokens before the first frame start are dropped.
#[must_use]
pub fn split_frames(tokens: &[Token]) -> Vec<Vec<u32>> {
    let mut frames: Vec<Vec<u32>> = Vec::new();
    for token in tokens.iter().filter(|t| t.valid) {
        if token.start_of_frame {
            frames.push(Vec::new());
        }
        if let Some(frame) = frames.last_mut() {
            frame.push(token.value);
        }
    }
    frames
}

/// Rebuild an 8-bit grayscale image from `pixel_width`-bit values.
///
/// Values are rescaled linearly so that the largest `pixel_width`-bit
/// value maps to 255.
///
/// # Errors
///
/// Returns [`StreamError::FrameShape`] if `values` does not hold exactly
/// `size.pixel_count()` pixels, or if the size does not fit an image.
pub fn frame_to_gray(
    size: FrameSize,
    values: &[u32],
    pixel_width: u32,
) -> Result<GrayImage, StreamError> {
    let shape_error = || StreamError::FrameShape {
        expected: size.pixel_count(),
        actual: values.len(),
    };
    if values.len() != size.pixel_count() {
        return Err(shape_error());
    }
    let width = u32::try_from(size.width).map_err(|_| shape_error())?;
    let height = u32::try_from(size.height).map_err(|_| shape_error())?;

    let max = u64::from(max_value(pixel_width)).max(1);
    let raw: Vec<u8> = values
        .iter()
        .map(|&v| {
            let v = u64::from(v).min(max);
            u8::try_from(v * 255 / max).unwrap_or(u8::MAX)
        })
        .collect();
    GrayImage::from_raw(width, height, raw).ok_or_else(shape_error)
}

/// Decode image bytes (any format the `image` crate reads).
///
/// # Errors
///
/// Returns [`StreamError::EmptyInput`] if `bytes` is empty, or
/// [`StreamError::ImageDecode`] if decoding fails.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, StreamError> {
    if bytes.is_empty() {
        return Err(StreamError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}
