//! Square convolution kernels and the fixed Prewitt operator pair.

use crate::types::PipelineError;

/// Prewitt kernel approximating the horizontal intensity gradient.
pub const PREWITT_X: [[f64; 3]; 3] = [[1.0, 0.0, -1.0], [1.0, 0.0, -1.0], [1.0, 0.0, -1.0]];

/// Prewitt kernel approximating the vertical intensity gradient.
pub const PREWITT_Y: [[f64; 3]; 3] = [[1.0, 1.0, 1.0], [0.0, 0.0, 0.0], [-1.0, -1.0, -1.0]];

/// A square matrix of weights with an odd side length.
///
/// The odd side guarantees a center cell, so the kernel can be
/// anchored on the output pixel. Weights are stored row-major and are
/// never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionKernel {
    size: usize,
    weights: Vec<f64>,
}

impl ConvolutionKernel {
    /// Build a kernel from its rows.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidKernel`] if the kernel is empty,
    /// any row length differs from the row count, or the side is even.
    pub fn try_from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, PipelineError> {
        let size = rows.len();
        if let Some(ragged) = rows.iter().find(|r| r.as_ref().len() != size) {
            return Err(PipelineError::InvalidKernel {
                rows: size,
                columns: ragged.as_ref().len(),
            });
        }
        if size % 2 == 0 {
            return Err(PipelineError::InvalidKernel {
                rows: size,
                columns: size,
            });
        }
        let weights = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Ok(Self { size, weights })
    }

    /// The horizontal Prewitt kernel ([`PREWITT_X`]).
    #[must_use]
    pub fn prewitt_x() -> Self {
        Self::from_fixed(&PREWITT_X)
    }

    /// The vertical Prewitt kernel ([`PREWITT_Y`]).
    #[must_use]
    pub fn prewitt_y() -> Self {
        Self::from_fixed(&PREWITT_Y)
    }

    fn from_fixed(rows: &[[f64; 3]; 3]) -> Self {
        Self {
            size: 3,
            weights: rows.iter().flatten().copied().collect(),
        }
    }

    /// Side length of the kernel.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Offset from the kernel's first cell to its center cell.
    #[must_use]
    pub const fn radius(&self) -> usize {
        self.size / 2
    }

    /// Row `k` of the kernel.
    ///
    /// # Panics
    ///
    /// Panics if `k` is not below [`size`](Self::size).
    #[must_use]
    pub fn row(&self, k: usize) -> &[f64] {
        &self.weights[k * self.size..(k + 1) * self.size]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn prewitt_kernels_match_constants() {
        let gx = ConvolutionKernel::prewitt_x();
        let gy = ConvolutionKernel::prewitt_y();
        assert_eq!(gx.size(), 3);
        assert_eq!(gx.radius(), 1);
        for k in 0..3 {
            assert_eq!(gx.row(k), PREWITT_X[k].as_slice());
            assert_eq!(gy.row(k), PREWITT_Y[k].as_slice());
        }
        assert_eq!(gx, ConvolutionKernel::try_from_rows(&PREWITT_X).unwrap());
    }

    #[test]
    fn single_cell_kernel_is_valid() {
        let k = ConvolutionKernel::try_from_rows(&[[2.0]]).unwrap();
        assert_eq!(k.size(), 1);
        assert_eq!(k.radius(), 0);
        assert_eq!(k.row(0), [2.0]);
    }

    #[test]
    fn five_by_five_kernel_is_valid() {
        let k = ConvolutionKernel::try_from_rows(&[[1.0; 5]; 5]).unwrap();
        assert_eq!(k.radius(), 2);
    }

    #[test]
    fn empty_kernel_is_invalid() {
        let rows: [[f64; 0]; 0] = [];
        assert_eq!(
            ConvolutionKernel::try_from_rows(&rows),
            Err(PipelineError::InvalidKernel {
                rows: 0,
                columns: 0,
            })
        );
    }

    #[test]
    fn even_kernel_is_invalid() {
        assert_eq!(
            ConvolutionKernel::try_from_rows(&[[1.0, 0.0], [0.0, 1.0]]),
            Err(PipelineError::InvalidKernel {
                rows: 2,
                columns: 2,
            })
        );
    }

    #[test]
    fn non_square_kernel_is_invalid() {
        let rows = vec![vec![1.0, 0.0, -1.0], vec![1.0, 0.0], vec![1.0, 0.0, -1.0]];
        assert_eq!(
            ConvolutionKernel::try_from_rows(&rows),
            Err(PipelineError::InvalidKernel {
                rows: 3,
                columns: 2,
            })
        );
    }

    #[test]
    fn wide_kernel_is_invalid() {
        let result = ConvolutionKernel::try_from_rows(&[[1.0, 0.0, -1.0]]);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidKernel {
                rows: 1,
                columns: 3,
            })
        ));
    }
}
