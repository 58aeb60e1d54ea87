//! QR code decoder using rqrr

use super::{FINDER_SIZE, ModuleMatrix};
use crate::error::{Error, Result};
use image::{DynamicImage, GrayImage, Luma, imageops};

/// Fraction of the image side added as a white border before decoding.
const MARGIN_RATIO: f32 = 0.0625;

/// Luma below which a sample counts as dark.
const DARK_THRESHOLD: u8 = 128;

/// Pixels per module when re-rendering a sampled grid.
const MODULE_PIXELS: u32 = 8;

/// Quiet zone, in modules, around a re-rendered grid.
const QUIET_MODULES: u32 = 4;

/// QR code decoder
///
/// Composited images have no quiet zone and carry their modules as small
/// dots over arbitrary artwork, which `rqrr`'s finder and timing scans do not
/// cope with. For an image whose code runs edge to edge the decoder therefore
/// measures the module size from the top-left finder, samples every cell
/// centre into a [`ModuleMatrix`] and decodes a clean rendering of that grid.
/// Anything else goes straight to `rqrr` after padding with a white border.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    /// Create a new QR decoder with default settings
    pub fn new() -> Self {
        Self
    }

    /// Decode the first QR code in an image into its text payload
    pub fn decode(&self, img: &DynamicImage) -> Result<String> {
        self.decode_gray(&img.to_luma8())
    }

    /// Decode the first QR code in a grayscale image
    pub fn decode_gray(&self, img: &GrayImage) -> Result<String> {
        if let Some(content) = self.decode_module_grid(img) {
            return Ok(content);
        }
        detect(pad(img))
    }

    /// Read an edge-to-edge code cell by cell.
    fn decode_module_grid(&self, img: &GrayImage) -> Option<String> {
        let unit = finder_unit(img)?;
        let estimate = img.width() as f32 / unit;

        for width in candidate_widths(estimate) {
            let Ok(matrix) = sample_modules(img, width) else {
                continue;
            };
            match detect(render_modules(&matrix)) {
                Ok(content) => {
                    tracing::debug!(modules = width, "Decoded QR from sampled module grid");
                    return Some(content);
                }
                Err(err) => tracing::trace!(modules = width, error = %err, "Module grid rejected"),
            }
        }
        None
    }
}

fn detect(img: GrayImage) -> Result<String> {
    let mut prepared = rqrr::PreparedImage::prepare(img);
    let grids = prepared.detect_grids();

    let Some(grid) = grids.first() else {
        return Err(Error::NoQrCodeFound);
    };

    match grid.decode() {
        Ok((meta, content)) => {
            tracing::debug!(
                "Decoded QR: version={:?}, ecc_level={:?}, length={}",
                meta.version,
                meta.ecc_level,
                content.len()
            );
            Ok(content)
        }
        Err(e) => Err(Error::QrDecode(format!("Decode failed: {:?}", e))),
    }
}

fn pad(img: &GrayImage) -> GrayImage {
    let margin = (img.width().max(img.height()) as f32 * MARGIN_RATIO).round() as u32;
    let mut padded = GrayImage::from_pixel(
        img.width() + 2 * margin,
        img.height() + 2 * margin,
        Luma([255u8]),
    );
    imageops::replace(&mut padded, img, i64::from(margin), i64::from(margin));
    padded
}

fn is_dark(img: &GrayImage, x: u32, y: u32) -> bool {
    img.get_pixel(x, y).0[0] < DARK_THRESHOLD
}

/// Module size in pixels, measured along the diagonal of a finder pattern
/// anchored at the top-left corner.
///
/// The diagonal crosses dark, light, dark (three modules), light, dark, so
/// the light runs start at 1 and 5 modules and end at 2 and 6 modules.
fn finder_unit(img: &GrayImage) -> Option<f32> {
    let side = img.width().min(img.height());
    if img.width().abs_diff(img.height()) > 1 || side < 21 || !is_dark(img, 0, 0) {
        return None;
    }

    let mut edges = Vec::with_capacity(4);
    let mut dark = true;
    for t in 1..side {
        if is_dark(img, t, t) != dark {
            dark = !dark;
            edges.push(t);
            if edges.len() == 4 {
                break;
            }
        }
    }
    let &[e1, e2, e5, e6] = edges.as_slice() else {
        return None;
    };

    let unit = e6 as f32 / (FINDER_SIZE - 1) as f32;
    let consistent = [(e1, 1.0), (e2, 2.0), (e5, 5.0)]
        .iter()
        .all(|&(edge, modules)| (edge as f32 - modules * unit).abs() <= unit * 0.5 + 1.0);
    consistent.then_some(unit)
}

/// Valid QR side lengths closest to `estimate`, nearest first.
fn candidate_widths(estimate: f32) -> Vec<usize> {
    let version = ((estimate - 17.0) / 4.0).round() as i32;
    [version, version - 1, version + 1]
        .into_iter()
        .filter(|v| (1..=40).contains(v))
        .map(|v| 17 + 4 * v as usize)
        .collect()
}

fn sample_modules(img: &GrayImage, width: usize) -> Result<ModuleMatrix> {
    let scale = img.width() as f32 / width as f32;
    let center = |index: usize, limit: u32| {
        (((index as f32 + 0.5) * scale).round() as u32).min(limit - 1)
    };

    let mut modules = Vec::with_capacity(width * width);
    for row in 0..width {
        let y = center(row, img.height());
        for col in 0..width {
            modules.push(is_dark(img, center(col, img.width()), y));
        }
    }

    let version = ((width - 17) / 4) as i16;
    ModuleMatrix::from_modules(width, version, modules)
}

fn render_modules(matrix: &ModuleMatrix) -> GrayImage {
    let side = (matrix.width() as u32 + 2 * QUIET_MODULES) * MODULE_PIXELS;
    GrayImage::from_fn(side, side, |x, y| {
        let col = (x / MODULE_PIXELS).checked_sub(QUIET_MODULES);
        let row = (y / MODULE_PIXELS).checked_sub(QUIET_MODULES);
        match (row, col) {
            (Some(row), Some(col))
                if (row as usize) < matrix.width() && (col as usize) < matrix.width() =>
            {
                if matrix.is_dark(row as usize, col as usize) {
                    Luma([0u8])
                } else {
                    Luma([255u8])
                }
            }
            _ => Luma([255u8]),
        }
    })
}
