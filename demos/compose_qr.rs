//! Create a short link and composite its QR code onto a generated background
//!
//! Usage: cargo run --example compose_qr [BACKGROUND]

use image::{DynamicImage, Rgb, RgbImage};
use qrtist::{Compositor, QrDecoder, Registry, RegistryOptions, RenderConfig, encode_png};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let registry = Registry::open_in_memory()?;
    let link = registry.create_link("https://example.com/spring-menu")?;
    let short_url = RegistryOptions::default().short_url(&link.id);

    // Use the given artwork, or a soft gradient when none is supplied
    let background = match std::env::args().nth(1) {
        Some(path) => image::open(path)?,
        None => DynamicImage::ImageRgb8(RgbImage::from_fn(800, 800, |x, y| {
            Rgb([
                230 + (x * 25 / 800) as u8,
                215 + (y * 30 / 800) as u8,
                240,
            ])
        })),
    };

    let compositor = Compositor::new(RenderConfig {
        verify: true,
        ..RenderConfig::default()
    })?;
    let image = compositor.compose(&background, &short_url)?;
    std::fs::write("qrtist_output.png", encode_png(&image)?)?;

    println!("✓ Composited QR saved to qrtist_output.png");
    println!("  Encodes: {short_url}");

    // Simulate a scan of the printed code
    let decoded = QrDecoder::new().decode(&DynamicImage::ImageRgba8(image))?;
    let id = decoded.rsplit('/').next().unwrap_or_default();
    let target = registry.resolve_link(id, Some("demo-scanner"))?;
    println!("✓ Scanned and redirected to {target}");

    let detail = registry.get_detail(&link.id)?;
    println!("  Scans recorded: {}", detail.scans.len());

    Ok(())
}
