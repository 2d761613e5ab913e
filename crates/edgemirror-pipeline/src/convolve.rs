//! Same-mode 2D convolution over RGBA pixel grids.
//!
//! The output grid always has the source's dimensions. Kernel cells
//! that would land outside the source are omitted from the sum rather
//! than multiplied against an injected zero pixel; the numeric result is
//! the same as zero padding.
//!
//! Red, green and blue are convolved independently. The source alpha
//! is ignored and every output pixel is fully opaque.

use crate::gradient::GradientPair;
use crate::kernel::ConvolutionKernel;
use crate::types::{ConvolutionSchedule, Pixel, PixelGrid};

/// Convolve `source` with `kernel`, producing a grid of the same shape.
///
/// For each output position `(i, j)` the sum runs over kernel cells
/// `(k, l)` reading `source[i - r + k][j - r + l]`, where `r` is the
/// kernel radius. Neither the kernel nor the source is modified.
#[must_use = "returns the convolved grid"]
pub fn convolve(kernel: &ConvolutionKernel, source: &PixelGrid) -> PixelGrid {
    let (m, n) = (source.width(), source.height());
    let radius = kernel.radius();
    let mut pixels = Vec::with_capacity(source.pixels().len());

    for i in 0..m {
        for j in 0..n {
            let mut sum = Pixel::opaque(0.0, 0.0, 0.0);

            for k in 0..kernel.size() {
                let Some(row) = (i + k).checked_sub(radius).filter(|&r| r < m) else {
                    continue;
                };
                let column = source.column(row);

                for (l, &w) in kernel.row(k).iter().enumerate() {
                    let Some(col) = (j + l).checked_sub(radius).filter(|&c| c < n) else {
                        continue;
                    };
                    let px = column[col];
                    sum.red = px.red.mul_add(w, sum.red);
                    sum.green = px.green.mul_add(w, sum.green);
                    sum.blue = px.blue.mul_add(w, sum.blue);
                }
            }

            pixels.push(sum);
        }
    }

    PixelGrid::from_parts(source.dimensions(), pixels)
}

/// Convolve `source` with both Prewitt kernels.
///
/// The two convolutions share the read-only source and write separate
/// outputs. With [`ConvolutionSchedule::Parallel`] they are forked via
/// [`rayon::join`]; this returns only once both have finished.
#[must_use = "returns the horizontal and vertical gradient grids"]
pub fn convolve_pair(source: &PixelGrid, schedule: ConvolutionSchedule) -> GradientPair {
    let gx = ConvolutionKernel::prewitt_x();
    let gy = ConvolutionKernel::prewitt_y();

    log::trace!(
        "convolving {} grid with {schedule} schedule",
        source.dimensions()
    );

    let (horizontal, vertical) = match schedule {
        ConvolutionSchedule::Sequential => (convolve(&gx, source), convolve(&gy, source)),
        ConvolutionSchedule::Parallel => {
            rayon::join(|| convolve(&gx, source), || convolve(&gy, source))
        }
    };
    GradientPair {
        horizontal,
        vertical,
    }
}
