//! Shared types for the edgemirror image processing pipeline.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hand decoded images to
/// the codec without depending on `image` directly.
pub use image::RgbaImage;

/// Number of interleaved channels per pixel in every pixel buffer.
pub const CHANNELS: usize = 4;

/// Alpha value written by every convolution and merge step.
pub const OPAQUE: f64 = 255.0;

/// A single pixel with unbounded real-valued channels.
///
/// Channels only get clamped to `[0, 255]` when the grid is encoded
/// back into a byte buffer; intermediate stages may hold negative
/// values (convolution) or values above 255 (gradient magnitude).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pixel {
    /// Red channel.
    pub red: f64,
    /// Green channel.
    pub green: f64,
    /// Blue channel.
    pub blue: f64,
    /// Alpha channel.
    pub alpha: f64,
}

impl Pixel {
    /// All four channels zero.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a pixel from explicit channel values.
    #[must_use]
    pub const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Create a fully opaque pixel.
    #[must_use]
    pub const fn opaque(red: f64, green: f64, blue: f64) -> Self {
        Self::new(red, green, blue, OPAQUE)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels (extent of the grid's first axis).
    pub width: u32,
    /// Height in pixels (extent of the grid's second axis).
    pub height: u32,
}

impl Dimensions {
    /// Create a new set of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels, or `None` if it does not fit in `usize`.
    #[must_use]
    pub fn pixel_count(self) -> Option<usize> {
        let w = usize::try_from(self.width).ok()?;
        let h = usize::try_from(self.height).ok()?;
        w.checked_mul(h)
    }

    /// Byte length of an interleaved RGBA buffer with these dimensions.
    #[must_use]
    pub fn buffer_len(self) -> Option<usize> {
        self.pixel_count()?.checked_mul(CHANNELS)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A fixed-size two-dimensional grid of [`Pixel`]s.
///
/// The first axis indexes width positions (`x`), the second axis
/// indexes height positions (`y`). Pixels are stored first-axis-major:
/// `(x, y)` lives at linear index `x * height + y`, so each
/// [`column`](Self::column) is one image column, top to bottom. The
/// codec maps row-major pixel buffers onto this layout.
///
/// Dimensions are fixed at construction; there is no way to resize a
/// grid after it has been created.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    dimensions: Dimensions,
    pixels: Vec<Pixel>,
}

impl PixelGrid {
    /// Create a grid with every pixel set to [`Pixel::ZERO`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the pixel count
    /// overflows `usize`.
    pub fn new(dimensions: Dimensions) -> Result<Self, PipelineError> {
        Self::from_fn(dimensions, |_, _| Pixel::ZERO)
    }

    /// Create a grid by evaluating `f(x, y)` for every position.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the pixel count
    /// overflows `usize`.
    pub fn from_fn(
        dimensions: Dimensions,
        mut f: impl FnMut(usize, usize) -> Pixel,
    ) -> Result<Self, PipelineError> {
        let count = dimensions.pixel_count().ok_or_else(|| {
            PipelineError::InvalidConfig(format!("{dimensions} grid is too large"))
        })?;
        let mut pixels = Vec::with_capacity(count);
        for x in 0..dimensions.width as usize {
            for y in 0..dimensions.height as usize {
                pixels.push(f(x, y));
            }
        }
        Ok(Self { dimensions, pixels })
    }

    /// Build a grid from pixels already laid out first-axis-major.
    ///
    /// Callers guarantee `pixels.len()` matches `dimensions`.
    pub(crate) fn from_parts(dimensions: Dimensions, pixels: Vec<Pixel>) -> Self {
        debug_assert_eq!(Some(pixels.len()), dimensions.pixel_count());
        Self { dimensions, pixels }
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Extent of the first axis.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.dimensions.width as usize
    }

    /// Extent of the second axis.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.dimensions.height as usize
    }

    /// All pixels in first-axis-major order.
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// The pixel at `(x, y)`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<&Pixel> {
        if x < self.width() && y < self.height() {
            self.pixels.get(x * self.height() + y)
        } else {
            None
        }
    }

    /// All pixels sharing first-axis index `x`, ordered by `y`.
    #[must_use]
    pub fn column(&self, x: usize) -> &[Pixel] {
        let h = self.height();
        &self.pixels[x * h..(x + 1) * h]
    }

    /// Mutable view of the pixels sharing first-axis index `x`.
    pub fn column_mut(&mut self, x: usize) -> &mut [Pixel] {
        let h = self.height();
        &mut self.pixels[x * h..(x + 1) * h]
    }

    /// Consume the grid and return its pixels in first-axis-major order.
    #[must_use]
    pub fn into_pixels(self) -> Vec<Pixel> {
        self.pixels
    }
}

impl Index<(usize, usize)> for PixelGrid {
    type Output = Pixel;

    fn index(&self, (x, y): (usize, usize)) -> &Pixel {
        &self.column(x)[y]
    }
}

impl IndexMut<(usize, usize)> for PixelGrid {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Pixel {
        &mut self.column_mut(x)[y]
    }
}

/// How the two gradient convolutions are scheduled.
///
/// Both convolutions read the same immutable source and write
/// disjoint outputs, so either schedule produces identical grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvolutionSchedule {
    /// Run the horizontal convolution, then the vertical one, on the
    /// calling thread.
    Sequential,

    /// Fork both convolutions with [`rayon::join`] and wait for both.
    ///
    /// On targets without threads rayon falls back to running the two
    /// halves on the current thread.
    #[default]
    Parallel,
}

impl fmt::Display for ConvolutionSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("Sequential"),
            Self::Parallel => f.write_str("Parallel"),
        }
    }
}

/// Configuration for the image processing pipeline.
///
/// Passed in once at construction time; nothing in the pipeline reads
/// global dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Expected dimensions of the input buffer. The output buffer has
    /// the same dimensions.
    pub dimensions: Dimensions,

    /// How the two gradient convolutions are scheduled.
    pub schedule: ConvolutionSchedule,
}

impl PipelineConfig {
    /// Default input width, matching the reference canvas.
    pub const DEFAULT_WIDTH: u32 = 300;

    /// Default input height, matching the reference canvas.
    pub const DEFAULT_HEIGHT: u32 = 300;

    /// Default convolution schedule.
    pub const DEFAULT_SCHEDULE: ConvolutionSchedule = ConvolutionSchedule::Parallel;

    /// Config for the given dimensions with the default schedule.
    #[must_use]
    pub const fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            dimensions: Dimensions::new(width, height),
            schedule: Self::DEFAULT_SCHEDULE,
        }
    }

    /// Byte length of the input and output buffers.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if either dimension is
    /// zero or the buffer length overflows `usize`.
    pub fn buffer_len(&self) -> Result<usize, PipelineError> {
        self.validate()?;
        self.dimensions
            .buffer_len()
            .ok_or_else(|| PipelineError::InvalidConfig(format!("{} is too large", self.dimensions)))
    }

    /// Check the config before any stage runs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if either dimension is
    /// zero or the buffer length overflows `usize`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let Dimensions { width, height } = self.dimensions;
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "dimensions must be non-zero, got {}",
                self.dimensions,
            )));
        }
        if self.dimensions.buffer_len().is_none() {
            return Err(PipelineError::InvalidConfig(format!(
                "{} is too large",
                self.dimensions,
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_dimensions(Self::DEFAULT_WIDTH, Self::DEFAULT_HEIGHT)
    }
}

/// Result of running the full image processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Channel-interleaved RGBA output, every channel clamped to
    /// `[0, 255]`.
    pub pixels: Vec<u8>,

    /// Dimensions of the output buffer (always equal to the input's).
    pub dimensions: Dimensions,
}

impl ProcessResult {
    /// Wrap the output buffer as an [`RgbaImage`].
    ///
    /// Returns `None` only if the buffer length disagrees with the
    /// dimensions, which the pipeline never produces.
    #[must_use]
    pub fn into_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.dimensions.width, self.dimensions.height, self.pixels)
    }
}

/// Errors that can occur during pipeline processing.
///
/// Every variant carries plain data, so the error serializes directly
/// for transport across the worker boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The input buffer length does not match `width * height * 4`.
    #[error("malformed pixel buffer: expected {expected} bytes, got {actual}")]
    MalformedBuffer {
        /// Byte length implied by the configured dimensions.
        expected: usize,
        /// Byte length actually supplied.
        actual: usize,
    },

    /// Two grids that must share dimensions do not.
    #[error("gradient shape mismatch: horizontal is {horizontal}, vertical is {vertical}")]
    ShapeMismatch {
        /// Dimensions of the horizontal gradient grid.
        horizontal: Dimensions,
        /// Dimensions of the vertical gradient grid.
        vertical: Dimensions,
    },

    /// A convolution kernel is empty, not square, or has an even side.
    #[error("invalid convolution kernel: {rows}x{columns} (must be square with an odd side)")]
    InvalidKernel {
        /// Number of kernel rows.
        rows: usize,
        /// Length of the first row that breaks squareness (or of the
        /// first row when the kernel is square but even).
        columns: usize,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
