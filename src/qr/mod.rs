//! QR code encoding and decoding
//!
//! Encoding produces a [`ModuleMatrix`], the raw dark/light grid the
//! compositor paints from. Decoding is used to check that a composited
//! image still scans, and reads the same grid back out of the image.

mod decoder;
mod encoder;

pub use decoder::QrDecoder;
pub use encoder::QrEncoder;

use crate::error::{Error, Result};

/// Side length, in modules, of each finder pattern.
pub const FINDER_SIZE: usize = 7;

/// Square grid of QR modules, `true` meaning dark.
///
/// The matrix is ephemeral: it is a pure function of the payload and the
/// error-correction level, so it is rebuilt for every render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMatrix {
    width: usize,
    version: i16,
    modules: Vec<bool>,
}

impl ModuleMatrix {
    /// Build a matrix from row-major module colors.
    pub fn from_modules(width: usize, version: i16, modules: Vec<bool>) -> Result<Self> {
        if width < 2 * FINDER_SIZE + 1 || width % 2 == 0 {
            return Err(Error::QrEncode(format!(
                "Matrix width {width} is not a valid QR side length"
            )));
        }
        if modules.len() != width * width {
            return Err(Error::QrEncode(format!(
                "Expected {} modules for width {width}, got {}",
                width * width,
                modules.len()
            )));
        }

        Ok(Self {
            width,
            version,
            modules,
        })
    }

    /// Number of modules along one side.
    pub fn width(&self) -> usize {
        self.width
    }

    /// QR version the encoder selected for the payload.
    pub fn version(&self) -> i16 {
        self.version
    }

    /// Whether the module at `(row, col)` is dark.
    pub fn is_dark(&self, row: usize, col: usize) -> bool {
        self.modules[row * self.width + col]
    }

    /// Top-left `(row, col)` of the three finder patterns: top-left,
    /// top-right, bottom-left.
    pub fn finder_origins(&self) -> [(usize, usize); 3] {
        let far = self.width - FINDER_SIZE;
        [(0, 0), (0, far), (far, 0)]
    }

    /// Whether `(row, col)` lies inside one of the three finder patterns.
    pub fn is_finder(&self, row: usize, col: usize) -> bool {
        self.finder_origins().iter().any(|&(r0, c0)| {
            (r0..r0 + FINDER_SIZE).contains(&row) && (c0..c0 + FINDER_SIZE).contains(&col)
        })
    }

    /// Iterate over every cell as `(row, col, dark)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, bool)> + '_ {
        self.modules
            .iter()
            .enumerate()
            .map(move |(i, &dark)| (i / self.width, i % self.width, dark))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: usize) -> ModuleMatrix {
        ModuleMatrix::from_modules(width, 1, vec![false; width * width]).unwrap()
    }

    #[test]
    fn rejects_even_or_tiny_widths() {
        assert!(ModuleMatrix::from_modules(22, 1, vec![false; 22 * 22]).is_err());
        assert!(ModuleMatrix::from_modules(13, 1, vec![false; 13 * 13]).is_err());
    }

    #[test]
    fn rejects_mismatched_module_count() {
        assert!(ModuleMatrix::from_modules(21, 1, vec![false; 20]).is_err());
    }

    #[test]
    fn finder_regions_cover_three_corners() {
        let matrix = blank(21);
        assert!(matrix.is_finder(0, 0));
        assert!(matrix.is_finder(6, 6));
        assert!(matrix.is_finder(0, 20));
        assert!(matrix.is_finder(20, 0));
        assert!(!matrix.is_finder(7, 7));
        assert!(!matrix.is_finder(20, 20));
        assert!(!matrix.is_finder(10, 10));

        let finder_cells = matrix
            .cells()
            .filter(|&(r, c, _)| matrix.is_finder(r, c))
            .count();
        assert_eq!(finder_cells, 3 * FINDER_SIZE * FINDER_SIZE);
    }

    #[test]
    fn cells_are_row_major() {
        let mut modules = vec![false; 21 * 21];
        modules[21 + 3] = true;
        let matrix = ModuleMatrix::from_modules(21, 1, modules).unwrap();
        assert!(matrix.is_dark(1, 3));
        let dark: Vec<_> = matrix.cells().filter(|c| c.2).collect();
        assert_eq!(dark, vec![(1, 3, true)]);
    }
}
