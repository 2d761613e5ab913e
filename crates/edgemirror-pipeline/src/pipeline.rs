//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use edgemirror_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(rgba: Vec<u8>) -> Result<(), PipelineError> {
//! let result = Pipeline::new(rgba, PipelineConfig::default())
//!     .decode()?
//!     .convolve()
//!     .merge()?
//!     .mirror()
//!     .encode()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline
//! state (or `Result` for fallible stages). The previous stage's grid
//! is moved or dropped on every transition; no stage keeps a reference
//! to an earlier intermediate. The mirror stage is the only one that
//! reuses its input grid, flipping it in place.

use crate::diagnostics::StageMetrics;
use crate::gradient::GradientPair;
use crate::types::{Dimensions, PipelineConfig, PipelineError, PixelGrid, ProcessResult};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source buffer and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source buffer.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source buffer and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configured
    /// dimensions are invalid, and [`PipelineError::MalformedBuffer`]
    /// if the buffer length does not match them.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let source_len = self.source.len();
        let grid = crate::codec::decode(&self.source, self.config.dimensions)?;
        Ok(Decoded {
            config: self.config,
            grid,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source buffer into a grid.
#[must_use = "pipeline stages are consumed by advancing; call .convolve() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    grid: PixelGrid,
    source_len: usize,
}

impl Decoded {
    /// The decoded source grid.
    #[must_use]
    pub const fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Convolve the source with both Prewitt kernels.
    ///
    /// The two convolutions are forked or run back to back according to
    /// `config.schedule`. Either way this returns only after both are
    /// done, and the source grid is dropped afterwards.
    pub fn convolve(self) -> Convolved {
        let gradients = crate::convolve::convolve_pair(&self.grid, self.config.schedule);
        Convolved {
            config: self.config,
            gradients,
        }
    }
}

// ───────────────────────── Stage 2: Convolved ────────────────────────

/// Pipeline state holding the horizontal and vertical gradient grids.
#[must_use = "pipeline stages are consumed by advancing; call .merge() to continue"]
pub struct Convolved {
    config: PipelineConfig,
    gradients: GradientPair,
}

impl Convolved {
    /// The gradient grids.
    #[must_use]
    pub const fn gradients(&self) -> &GradientPair {
        &self.gradients
    }

    /// Merge the gradient pair into a magnitude grid.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShapeMismatch`] if the gradient grids
    /// differ in dimensions.
    pub fn merge(self) -> Result<Merged, PipelineError> {
        let magnitude = self.gradients.magnitude()?;
        Ok(Merged {
            config: self.config,
            magnitude,
        })
    }
}

// ───────────────────────── Stage 3: Merged ───────────────────────────

/// Pipeline state holding the unclamped gradient magnitude grid.
#[must_use = "pipeline stages are consumed by advancing; call .mirror() to continue"]
pub struct Merged {
    config: PipelineConfig,
    magnitude: PixelGrid,
}

impl Merged {
    /// The gradient magnitude grid.
    #[must_use]
    pub const fn magnitude(&self) -> &PixelGrid {
        &self.magnitude
    }

    /// Mirror the magnitude grid in place.
    pub fn mirror(mut self) -> Mirrored {
        crate::mirror::mirror(&mut self.magnitude);
        Mirrored {
            config: self.config,
            grid: self.magnitude,
        }
    }
}

// ───────────────────────── Stage 4: Mirrored ─────────────────────────

/// Pipeline state after the in-place mirror.
#[must_use = "pipeline stages are consumed by advancing; call .encode() to continue"]
pub struct Mirrored {
    config: PipelineConfig,
    grid: PixelGrid,
}

impl Mirrored {
    /// The mirrored grid.
    #[must_use]
    pub const fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Clamp and encode the grid into an RGBA buffer. This is the final step.
    pub fn encode(self) -> Encoded {
        Encoded {
            dimensions: self.config.dimensions,
            pixels: crate::codec::encode(&self.grid),
        }
    }
}

// ───────────────────────── Stage 5: Encoded ──────────────────────────

/// Pipeline state after encoding, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`ProcessResult`].
#[must_use = "call .into_result() to extract the ProcessResult"]
pub struct Encoded {
    dimensions: Dimensions,
    pixels: Vec<u8>,
}

impl Encoded {
    /// The encoded RGBA buffer.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Output dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Consume the pipeline and return the output buffer.
    #[must_use]
    pub fn into_result(self) -> ProcessResult {
        ProcessResult {
            pixels: self.pixels,
            dimensions: self.dimensions,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline, including [`Pending`].
pub const STAGE_COUNT: usize = 6;

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"merge"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `5` for
    /// Encoded).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage, or `Err` if the stage transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when a fallible transition fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<ProcessResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Source {
            input_bytes: self.source.len(),
        }
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        let Dimensions { width, height } = self.grid.dimensions();
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        }
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Convolved(self.convolve())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.convolve().complete()
    }
}

impl PipelineStage for Convolved {
    const NAME: &str = "convolve";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Convolve {
            kernel_size: crate::kernel::PREWITT_X.len(),
            schedule: self.config.schedule.to_string(),
            horizontal_peak: crate::gradient::peak_channel(&self.gradients.horizontal),
            vertical_peak: crate::gradient::peak_channel(&self.gradients.vertical),
        }
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Merged(self.merge()?)))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.merge()?.complete()
    }
}

impl PipelineStage for Merged {
    const NAME: &str = "merge";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Merge {
            peak_magnitude: crate::gradient::peak_channel(&self.magnitude),
            saturated_channels: crate::codec::count_clamped_channels(&self.magnitude),
        }
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Mirrored(self.mirror())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.mirror().complete()
    }
}

impl PipelineStage for Mirrored {
    const NAME: &str = "mirror";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Mirror {
            swapped_pairs: crate::mirror::swap_count(&self.grid),
        }
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Encoded(self.encode())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        Ok(self.encode().into_result())
    }
}

impl PipelineStage for Encoded {
    const NAME: &str = "encode";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Encode {
            output_bytes: self.pixels.len(),
        }
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use edgemirror_pipeline::{Pipeline, PipelineConfig, PipelineError};
/// # use edgemirror_pipeline::pipeline::{Stage, Advance};
/// # fn run(rgba: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(rgba, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Convolved`].
    Convolved(Convolved),
    /// See [`Merged`].
    Merged(Merged),
    /// See [`Mirrored`].
    Mirrored(Mirrored),
    /// See [`Encoded`].
    Encoded(Encoded),
}

/// Compile-time guard: adding a [`Stage`] variant makes this match
/// non-exhaustive until [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Convolved(_)
        | Stage::Merged(_)
        | Stage::Mirrored(_)
        | Stage::Encoded(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Convolved(s) => s.$method($($arg),*),
            Self::Merged(s) => s.$method($($arg),*),
            Self::Mirrored(s) => s.$method($($arg),*),
            Self::Encoded(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Encoded(_))
    }

    /// Advance to the next stage; `Ok(None)` consumes the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // Only the final stage returns `None`, and it was handled above.
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<ProcessResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Lets the macro call `.name()` and `.index()` on `&self`; associated
// constants aren't reachable via `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

macro_rules! stage_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

stage_from!(Pending, Decoded, Convolved, Merged, Mirrored, Encoded);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental image processing pipeline.
///
/// Created via [`Pipeline::new`], which stores the source buffer and
/// config without doing any processing. Each stage method consumes the
/// current state and returns the next, so skipping or reordering stages
/// is a compile-time error.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a source RGBA buffer and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(rgba: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: rgba,
        }
    }
}
