//! In-place mirror along the grid's second axis.
//!
//! For every first-axis index `i`, the pixels at `(i, j)` and
//! `(i, height - 1 - j)` are swapped for `j` in `[0, height / 2)`.
//! Both the loop bound and the reflected index use the second-axis
//! extent, so the flip stays in bounds for non-square grids and applying
//! it twice restores the original grid.
//!
//! In image space this is a vertical flip: image row `y` trades places
//! with row `height - 1 - y`.

use crate::types::PixelGrid;

/// Mirror `grid` in place along its second axis.
pub fn mirror(grid: &mut PixelGrid) {
    for i in 0..grid.width() {
        grid.column_mut(i).reverse();
    }
}

/// Number of pixel swaps [`mirror`] performs on a grid of this shape.
pub(crate) const fn swap_count(grid: &PixelGrid) -> usize {
    grid.width() * (grid.height() / 2)
}
