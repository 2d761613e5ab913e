//! Gradient magnitude: merge horizontal and vertical gradient grids.

use crate::types::{Pixel, PipelineError, PixelGrid};

/// The horizontal and vertical gradient grids computed from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientPair {
    /// Source convolved with the horizontal Prewitt kernel.
    pub horizontal: PixelGrid,
    /// Source convolved with the vertical Prewitt kernel.
    pub vertical: PixelGrid,
}

impl GradientPair {
    /// Merge the pair into a magnitude grid. See [`merge`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShapeMismatch`] if the two grids differ
    /// in dimensions.
    pub fn magnitude(&self) -> Result<PixelGrid, PipelineError> {
        merge(&self.horizontal, &self.vertical)
    }
}

/// Combine two gradient component grids into a magnitude grid.
///
/// Per pixel and per color channel: `sqrt(gx² + gy²)`. Alpha is set to
/// 255. No clamping happens here; values above 255 are left for the
/// encoder.
///
/// # Errors
///
/// Returns [`PipelineError::ShapeMismatch`] if `horizontal` and
/// `vertical` have different dimensions.
pub fn merge(horizontal: &PixelGrid, vertical: &PixelGrid) -> Result<PixelGrid, PipelineError> {
    if horizontal.dimensions() != vertical.dimensions() {
        return Err(PipelineError::ShapeMismatch {
            horizontal: horizontal.dimensions(),
            vertical: vertical.dimensions(),
        });
    }

    let pixels = horizontal
        .pixels()
        .iter()
        .zip(vertical.pixels())
        .map(|(gx, gy)| {
            Pixel::opaque(
                gx.red.hypot(gy.red),
                gx.green.hypot(gy.green),
                gx.blue.hypot(gy.blue),
            )
        })
        .collect();
    Ok(PixelGrid::from_parts(horizontal.dimensions(), pixels))
}

/// Largest absolute color-channel value in a grid, or 0 when empty.
pub(crate) fn peak_channel(grid: &PixelGrid) -> f64 {
    grid.pixels()
        .iter()
        .flat_map(|p| [p.red, p.green, p.blue])
        .fold(0.0, |peak, v| peak.max(v.abs()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    fn constant(dimensions: Dimensions, pixel: Pixel) -> PixelGrid {
        PixelGrid::from_fn(dimensions, |_, _| pixel).unwrap()
    }

    #[test]
    fn three_four_five() {
        let dims = Dimensions::new(5, 4);
        let gx = constant(dims, Pixel::new(3.0, 0.0, 0.0, 0.0));
        let gy = constant(dims, Pixel::new(4.0, 0.0, 0.0, 0.0));
        let g = merge(&gx, &gy).unwrap();
        assert_eq!(g.dimensions(), dims);
        for px in g.pixels() {
            assert_eq!(*px, Pixel::opaque(5.0, 0.0, 0.0));
        }
    }

    #[test]
    fn channels_are_independent_and_sign_free() {
        let dims = Dimensions::new(1, 1);
        let gx = constant(dims, Pixel::new(-6.0, 5.0, 0.0, 12.0));
        let gy = constant(dims, Pixel::new(8.0, -12.0, -7.0, 99.0));
        let g = merge(&gx, &gy).unwrap();
        assert_eq!(g[(0, 0)], Pixel::opaque(10.0, 13.0, 7.0));
    }

    #[test]
    fn magnitude_is_not_clamped() {
        let dims = Dimensions::new(2, 2);
        let gx = constant(dims, Pixel::new(300.0, 0.0, 0.0, 0.0));
        let gy = constant(dims, Pixel::new(400.0, 0.0, 0.0, 0.0));
        let g = merge(&gx, &gy).unwrap();
        assert!((g[(1, 1)].red - 500.0).abs() < f64::EPSILON);
        assert!((peak_channel(&g) - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let gx = PixelGrid::new(Dimensions::new(2, 3)).unwrap();
        let gy = PixelGrid::new(Dimensions::new(3, 2)).unwrap();
        assert_eq!(
            merge(&gx, &gy),
            Err(PipelineError::ShapeMismatch {
                horizontal: Dimensions::new(2, 3),
                vertical: Dimensions::new(3, 2),
            })
        );
    }

    #[test]
    fn pair_magnitude_delegates_to_merge() {
        let dims = Dimensions::new(3, 3);
        let pair = GradientPair {
            horizontal: constant(dims, Pixel::new(0.0, 3.0, 0.0, 0.0)),
            vertical: constant(dims, Pixel::new(0.0, 4.0, 0.0, 0.0)),
        };
        let g = pair.magnitude().unwrap();
        assert!((g[(2, 0)].green - 5.0).abs() < f64::EPSILON);
    }
}
