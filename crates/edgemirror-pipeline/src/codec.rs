//! Pixel buffer decoding and encoding.
//!
//! Converts a channel-interleaved RGBA byte buffer into a [`PixelGrid`]
//! and back. The buffer is row-major in image space, the same layout
//! as `ImageData` and [`RgbaImage`]: quadruplet `k` is the pixel at
//! `x = k % width`, `y = k / width`. It lands at grid position
//! `(x, y)`, so neighbours in the image are neighbours in the grid for
//! any width and height, and `encode(decode(b)) == b` for every valid
//! buffer.
//!
//! This is the first and last step in the pipeline. [`encode`] is the
//! only place where channel values are clamped to `[0, 255]`.

use crate::types::{CHANNELS, Dimensions, Pixel, PipelineError, PixelGrid, RgbaImage};

/// Decode a channel-interleaved RGBA buffer into a pixel grid.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedBuffer`] if `buffer.len()` is not
/// `width * height * 4`. Returns [`PipelineError::InvalidConfig`] if
/// that length overflows `usize`.
pub fn decode(buffer: &[u8], dimensions: Dimensions) -> Result<PixelGrid, PipelineError> {
    let expected = dimensions.buffer_len().ok_or_else(|| {
        PipelineError::InvalidConfig(format!("{dimensions} buffer length overflows"))
    })?;
    if buffer.len() != expected {
        return Err(PipelineError::MalformedBuffer {
            expected,
            actual: buffer.len(),
        });
    }

    let width = dimensions.width as usize;
    PixelGrid::from_fn(dimensions, |x, y| {
        let offset = (y * width + x) * CHANNELS;
        let px = &buffer[offset..offset + CHANNELS];
        Pixel::new(
            f64::from(px[0]),
            f64::from(px[1]),
            f64::from(px[2]),
            f64::from(px[3]),
        )
    })
}

/// Encode a pixel grid into a channel-interleaved RGBA buffer.
///
/// Emits pixels row by row in image space (`y` outer, `x` inner), the
/// inverse of [`decode`]. Every channel is clamped to `[0, 255]` and rounded (ties to even); `NaN`
/// encodes as 0.
#[must_use = "returns the encoded pixel buffer"]
pub fn encode(grid: &PixelGrid) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(grid.pixels().len() * CHANNELS);
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let px = grid[(x, y)];
            buffer.extend_from_slice(&[
                encode_channel(px.red),
                encode_channel(px.green),
                encode_channel(px.blue),
                encode_channel(px.alpha),
            ]);
        }
    }
    buffer
}

/// Decode an [`RgbaImage`] using its raw buffer and dimensions.
///
/// # Errors
///
/// Propagates the errors of [`decode`].
pub fn decode_image(image: &RgbaImage) -> Result<PixelGrid, PipelineError> {
    decode(
        image.as_raw(),
        Dimensions::new(image.width(), image.height()),
    )
}

/// Encode a pixel grid as an [`RgbaImage`] with the grid's dimensions.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the encoded buffer does
/// not fit the grid dimensions.
pub fn encode_image(grid: &PixelGrid) -> Result<RgbaImage, PipelineError> {
    let Dimensions { width, height } = grid.dimensions();
    RgbaImage::from_raw(width, height, encode(grid)).ok_or_else(|| {
        PipelineError::InvalidConfig(format!(
            "encoded buffer does not fit {}",
            grid.dimensions()
        ))
    })
}

/// Clamp and round a single channel to a byte.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0).round_ties_even() as u8
}

/// Count channels that [`encode`] will clamp (outside `[0, 255]` or `NaN`).
pub(crate) fn count_clamped_channels(grid: &PixelGrid) -> u64 {
    grid.pixels()
        .iter()
        .flat_map(|p| [p.red, p.green, p.blue, p.alpha])
        .map(|v| u64::from(!(0.0..=255.0).contains(&v)))
        .sum()
}
