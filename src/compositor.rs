//! Artistic QR compositing
//!
//! Paints a QR code over an illustration as a field of round dots. Every
//! non-finder module becomes a translucent dot centred on its cell, letting
//! the background show through between and beneath the dots. The three
//! finder patterns are drawn last as crisp, fully opaque nested squares so
//! scanners can still lock onto the code.

use crate::error::{Error, Result};
use crate::qr::{FINDER_SIZE, ModuleMatrix, QrDecoder, QrEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{Blend, draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Smallest canvas the compositor will render.
pub const MIN_OUTPUT_SIZE: u32 = 64;

/// Rendering parameters for the compositor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Output canvas side length in pixels
    pub output_size: u32,
    /// Dot radius as a fraction of the module cell size
    pub dot_radius_ratio: f32,
    /// Dot opacity in `(0, 1]`
    pub dot_opacity: f32,
    /// Decode the result and fail if it does not round-trip
    pub verify: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_size: 1024,
            dot_radius_ratio: 0.18,
            dot_opacity: 0.9,
            verify: false,
        }
    }
}

impl RenderConfig {
    /// Check that every parameter is within its usable range.
    pub fn validate(&self) -> Result<()> {
        if self.output_size < MIN_OUTPUT_SIZE {
            return Err(Error::Config(format!(
                "output_size must be at least {MIN_OUTPUT_SIZE}, got {}",
                self.output_size
            )));
        }
        if !(self.dot_radius_ratio > 0.0 && self.dot_radius_ratio <= 0.5) {
            return Err(Error::Config(format!(
                "dot_radius_ratio must be in (0, 0.5], got {}",
                self.dot_radius_ratio
            )));
        }
        if !(self.dot_opacity > 0.0 && self.dot_opacity <= 1.0) {
            return Err(Error::Config(format!(
                "dot_opacity must be in (0, 1], got {}",
                self.dot_opacity
            )));
        }
        Ok(())
    }
}

/// Composites scannable QR codes onto background illustrations.
///
/// Holds no mutable state; one instance can serve concurrent renders.
#[derive(Debug, Clone)]
pub struct Compositor {
    config: RenderConfig,
    encoder: QrEncoder,
    decoder: QrDecoder,
}

impl Compositor {
    /// Create a compositor, rejecting out-of-range parameters
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: QrEncoder::new(),
            decoder: QrDecoder::new(),
        })
    }

    /// Active rendering parameters
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Decode encoded background bytes (PNG, JPEG, ...) and composite onto them.
    pub fn compose_bytes(&self, background: &[u8], payload: &str) -> Result<RgbaImage> {
        let background =
            image::load_from_memory(background).map_err(|e| Error::ImageDecode(e.to_string()))?;
        self.compose(&background, payload)
    }

    /// Encode `payload` at level H and composite it onto `background`.
    pub fn compose(&self, background: &DynamicImage, payload: &str) -> Result<RgbaImage> {
        if payload.is_empty() {
            return Err(Error::InvalidInput("payload must not be empty".to_string()));
        }

        let matrix = self.encoder.encode(payload)?;
        let canvas = self.compose_matrix(background, &matrix)?;

        if self.config.verify {
            self.verify(&canvas, payload)?;
        }

        tracing::debug!(
            modules = matrix.width(),
            version = matrix.version(),
            size = self.config.output_size,
            "Composited QR image"
        );

        Ok(canvas)
    }

    /// Paint an already-encoded matrix onto `background`.
    pub fn compose_matrix(
        &self,
        background: &DynamicImage,
        matrix: &ModuleMatrix,
    ) -> Result<RgbaImage> {
        let size = self.config.output_size;
        let scale = size as f32 / matrix.width() as f32;

        let canvas = prepare_background(background, size)?;
        let mut canvas = self.draw_dots(canvas, matrix, scale);
        for (row, col) in matrix.finder_origins() {
            draw_finder(&mut canvas, row, col, scale);
        }

        Ok(canvas)
    }

    fn draw_dots(&self, canvas: RgbaImage, matrix: &ModuleMatrix, scale: f32) -> RgbaImage {
        let radius = ((self.config.dot_radius_ratio * scale).round() as i32).max(1);
        let alpha = (self.config.dot_opacity * 255.0).round() as u8;
        let dark = Rgba([0, 0, 0, alpha]);
        let light = Rgba([255, 255, 255, alpha]);

        let mut canvas = Blend(canvas);
        for (row, col, is_dark) in matrix.cells() {
            if matrix.is_finder(row, col) {
                continue;
            }
            let center = (cell_center(col, scale), cell_center(row, scale));
            draw_filled_circle_mut(&mut canvas, center, radius, if is_dark { dark } else { light });
        }
        canvas.0
    }

    fn verify(&self, canvas: &RgbaImage, payload: &str) -> Result<()> {
        let decoded = self
            .decoder
            .decode(&DynamicImage::ImageRgba8(canvas.clone()))
            .map_err(|e| Error::Unscannable(e.to_string()))?;

        if decoded != payload {
            return Err(Error::Unscannable(format!(
                "decoded '{decoded}' instead of the payload"
            )));
        }
        Ok(())
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            config: RenderConfig::default(),
            encoder: QrEncoder::new(),
            decoder: QrDecoder::new(),
        }
    }
}

/// Serialize a composited image as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Centre-crop to a square, scale to `size` and flatten onto opaque white.
fn prepare_background(background: &DynamicImage, size: u32) -> Result<RgbaImage> {
    let side = background.width().min(background.height());
    if side == 0 {
        return Err(Error::ImageDecode("background image is empty".to_string()));
    }

    let x = (background.width() - side) / 2;
    let y = (background.height() - side) / 2;
    let scaled = background
        .crop_imm(x, y, side, side)
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgba8();

    let mut canvas = RgbaImage::from_pixel(size, size, WHITE);
    imageops::overlay(&mut canvas, &scaled, 0, 0);
    Ok(canvas)
}

fn draw_finder(canvas: &mut RgbaImage, row: usize, col: usize, scale: f32) {
    for (inset, color) in [(0, BLACK), (1, WHITE), (2, BLACK)] {
        let span = FINDER_SIZE - 2 * inset;
        draw_filled_rect_mut(canvas, cell_rect(row + inset, col + inset, span, scale), color);
    }
}

fn cell_center(index: usize, scale: f32) -> i32 {
    ((index as f32 + 0.5) * scale).round() as i32
}

fn cell_edge(index: usize, scale: f32) -> i32 {
    (index as f32 * scale).round() as i32
}

fn cell_rect(row: usize, col: usize, span: usize, scale: f32) -> Rect {
    let (x0, x1) = (cell_edge(col, scale), cell_edge(col + span, scale));
    let (y0, y1) = (cell_edge(row, scale), cell_edge(row + span, scale));
    Rect::at(x0, y0).of_size((x1 - x0).max(1) as u32, (y1 - y0).max(1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const PAYLOAD: &str = "http://x.test/s/abc123";

    fn solid(size: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(size, size, Rgb([value; 3])))
    }

    fn noisy(size: u32) -> DynamicImage {
        let mut state: u32 = 0x2545_f491;
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(size, size, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        }))
    }

    fn luma_at(image: &RgbaImage, x: f32, y: f32) -> u8 {
        let Rgba([r, g, b, _]) = *image.get_pixel(x as u32, y as u32);
        ((r as u32 + g as u32 + b as u32) / 3) as u8
    }

    #[test]
    fn output_is_square_and_opaque() {
        let compositor = Compositor::default();
        let out = compositor.compose(&solid(300, 90), PAYLOAD).unwrap();
        assert_eq!(out.dimensions(), (1024, 1024));
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn finder_patterns_are_nested_squares_on_any_background() {
        let compositor = Compositor::default();
        let matrix = QrEncoder::new().encode(PAYLOAD).unwrap();
        let scale = 1024.0 / matrix.width() as f32;

        for background in [noisy(512), solid(400, 0), solid(400, 255)] {
            let out = compositor.compose(&background, PAYLOAD).unwrap();
            for (row, col) in matrix.finder_origins() {
                let cx = (col as f32 + 3.5) * scale;
                let cy = (row as f32 + 3.5) * scale;
                // core, inner light ring, outer dark ring along both axes
                assert_eq!(luma_at(&out, cx, cy), 0);
                assert_eq!(luma_at(&out, cx - 2.0 * scale, cy), 255);
                assert_eq!(luma_at(&out, cx, cy + 2.0 * scale), 255);
                assert_eq!(luma_at(&out, cx + 3.0 * scale, cy), 0);
                assert_eq!(luma_at(&out, cx, cy - 3.0 * scale), 0);
            }
        }
    }

    #[test]
    fn dots_carry_module_color_at_cell_centers() {
        let compositor = Compositor::default();
        let matrix = QrEncoder::new().encode(PAYLOAD).unwrap();
        let scale = 1024.0 / matrix.width() as f32;
        let out = compositor.compose(&solid(256, 128), PAYLOAD).unwrap();

        for (row, col, dark) in matrix.cells().filter(|&(r, c, _)| !matrix.is_finder(r, c)) {
            let value = luma_at(
                &out,
                (col as f32 + 0.5) * scale,
                (row as f32 + 0.5) * scale,
            );
            if dark {
                assert!(value < 40, "dark module ({row},{col}) sampled {value}");
            } else {
                assert!(value > 215, "light module ({row},{col}) sampled {value}");
            }
        }
    }

    #[test]
    fn background_shows_between_dots() {
        let compositor = Compositor::default();
        let matrix = QrEncoder::new().encode(PAYLOAD).unwrap();
        let scale = 1024.0 / matrix.width() as f32;
        let out = compositor.compose(&solid(256, 128), PAYLOAD).unwrap();

        let x = 10.0 * scale + 2.0;
        let y = 10.0 * scale + 2.0;
        let value = luma_at(&out, x, y);
        assert!((126..=130).contains(&value), "cell corner sampled {value}");
    }

    #[test]
    fn non_square_backgrounds_are_center_cropped() {
        let mut img = image::RgbImage::from_pixel(300, 200, Rgb([0, 200, 0]));
        for y in 0..200 {
            for x in 0..40 {
                img.put_pixel(x, y, Rgb([200, 0, 0]));
            }
        }
        let canvas = prepare_background(&DynamicImage::ImageRgb8(img), 128).unwrap();
        assert_eq!(canvas.dimensions(), (128, 128));
        assert_eq!(canvas.get_pixel(0, 64), &Rgba([0, 200, 0, 255]));
    }

    #[test]
    fn verified_render_round_trips() {
        let compositor = Compositor::new(RenderConfig {
            verify: true,
            ..RenderConfig::default()
        })
        .unwrap();
        assert!(compositor.compose(&solid(512, 235), PAYLOAD).is_ok());
    }

    #[test]
    fn undecodable_background_fails() {
        let result = Compositor::default().compose_bytes(b"definitely not a png", PAYLOAD);
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[test]
    fn oversized_payload_is_propagated() {
        let result = Compositor::default().compose(&solid(256, 200), &"y".repeat(2000));
        assert!(matches!(result, Err(Error::PayloadTooLong { length: 2000 })));
    }

    #[test]
    fn empty_payload_is_invalid() {
        let result = Compositor::default().compose(&solid(256, 200), "");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_out_of_range_config() {
        for config in [
            RenderConfig {
                output_size: 10,
                ..RenderConfig::default()
            },
            RenderConfig {
                dot_radius_ratio: 0.0,
                ..RenderConfig::default()
            },
            RenderConfig {
                dot_opacity: 1.5,
                ..RenderConfig::default()
            },
        ] {
            assert!(matches!(Compositor::new(config), Err(Error::Config(_))));
        }
    }

    #[test]
    fn png_encoding_produces_signature() {
        let out = Compositor::default().compose(&solid(256, 200), PAYLOAD).unwrap();
        let bytes = encode_png(&out).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
