//! edgemirror-pipeline: Prewitt edge detection and mirror (sans-IO).
//!
//! Turns a channel-interleaved RGBA buffer into an edge-magnitude image
//! through:
//! decode -> Prewitt convolutions (fork-join) -> magnitude merge ->
//! in-place mirror -> clamp and encode.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! byte slices and returns owned buffers. Image files, terminals and
//! browser workers live in `edgemirror-bench` and `edgemirror-worker`.

pub mod codec;
pub mod convolve;
pub mod diagnostics;
pub mod gradient;
pub mod kernel;
pub mod mirror;
pub mod pipeline;
pub mod types;

pub use diagnostics::{
    Clock, NoopObserver, PipelineDiagnostics, StageEvent, StageObserver, process_with_diagnostics,
};
pub use gradient::GradientPair;
pub use kernel::ConvolutionKernel;
pub use pipeline::Pipeline;
pub use types::{
    ConvolutionSchedule, Dimensions, Pixel, PipelineConfig, PipelineError, PixelGrid,
    ProcessResult,
};

/// Run the full edge-detection pipeline.
///
/// Takes a channel-interleaved RGBA buffer of exactly
/// `width * height * 4` bytes (dimensions from `config`) and produces a
/// fresh buffer of the same length. The input is never modified.
///
/// # Pipeline steps
///
/// 1. Decode bytes into a grid of floating-point pixels
/// 2. Convolve with the horizontal and vertical Prewitt kernels
/// 3. Merge the two gradients into a per-channel magnitude
/// 4. Mirror the magnitude grid in place
/// 5. Clamp to `[0, 255]` and encode back to bytes
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configured dimensions
/// are zero or overflow.
/// Returns [`PipelineError::MalformedBuffer`] if `rgba` has the wrong
/// length.
pub fn process(rgba: &[u8], config: &PipelineConfig) -> Result<ProcessResult, PipelineError> {
    let result = Pipeline::new(rgba.to_vec(), config.clone())
        .decode()?
        .convolve()
        .merge()?
        .mirror()
        .encode()
        .into_result();
    log::debug!(
        "processed {} image ({} bytes)",
        result.dimensions,
        result.pixels.len()
    );
    Ok(result)
}
