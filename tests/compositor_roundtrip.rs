use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use qrtist::{Compositor, QrDecoder, QrEncoder, RenderConfig};

const PAYLOAD: &str = "http://x.test/s/abc123";

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t.clamp(0.0, 1.0)).round() as u8
}

fn mix(a: [u8; 3], b: [u8; 3], t: f32) -> Rgb<u8> {
    Rgb([lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)])
}

fn horizontal(w: u32, h: u32, a: [u8; 3], b: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, _| mix(a, b, x as f32 / w as f32)))
}

fn vertical(w: u32, h: u32, a: [u8; 3], b: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |_, y| mix(a, b, y as f32 / h as f32)))
}

fn diagonal(size: u32, a: [u8; 3], b: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
        mix(a, b, (x + y) as f32 / (2 * size) as f32)
    }))
}

fn radial(size: u32, inner: [u8; 3], outer: [u8; 3]) -> DynamicImage {
    let c = size as f32 / 2.0;
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
        let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt() / c;
        mix(inner, outer, d)
    }))
}

fn solid(size: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(size, size, Rgb(color)))
}

fn translucent(size: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, _| {
        Rgba([200, 220, 240, (x * 255 / size) as u8])
    }))
}

fn illustrations() -> Vec<(&'static str, DynamicImage)> {
    vec![
        ("solid cream", solid(256, [250, 243, 224])),
        ("solid mint", solid(320, [200, 235, 215])),
        ("solid grey", solid(512, [190, 190, 190])),
        ("sunset horizontal", horizontal(512, 512, [255, 214, 170], [250, 190, 210])),
        ("sky vertical", vertical(384, 384, [205, 230, 255], [240, 248, 255])),
        ("lavender diagonal", diagonal(300, [225, 210, 245], [250, 245, 255])),
        ("peach radial", radial(400, [255, 240, 225], [235, 200, 180])),
        ("sage radial", radial(256, [230, 240, 220], [185, 205, 180])),
        ("landscape crop", horizontal(640, 360, [210, 225, 200], [250, 230, 190])),
        ("portrait crop", vertical(300, 500, [240, 220, 230], [200, 215, 240])),
        ("translucent", translucent(256)),
        ("pale yellow", solid(1024, [255, 250, 205])),
        ("white", solid(256, [255, 255, 255])),
        ("rose vertical", vertical(512, 512, [250, 225, 230], [225, 195, 205])),
        ("aqua diagonal", diagonal(480, [200, 240, 240], [240, 255, 250])),
        ("sand horizontal", horizontal(256, 256, [235, 220, 190], [250, 240, 215])),
        ("ice radial", radial(600, [250, 252, 255], [200, 220, 235])),
        ("wide banner", horizontal(900, 300, [245, 235, 255], [215, 235, 255])),
        ("tall poster", vertical(300, 900, [255, 245, 230], [230, 240, 220])),
        ("stone", solid(300, [175, 180, 185])),
    ]
}

fn random_color(rng: &mut StdRng) -> [u8; 3] {
    [rng.random(), rng.random(), rng.random()]
}

fn random_side(rng: &mut StdRng) -> u32 {
    rng.random_range(256..=640)
}

fn random_solid(rng: &mut StdRng) -> DynamicImage {
    let side = random_side(rng);
    solid(side, random_color(rng))
}

fn random_noise(rng: &mut StdRng) -> DynamicImage {
    let side = random_side(rng);
    let mut img = RgbImage::new(side, side);
    for pixel in img.pixels_mut() {
        *pixel = Rgb(random_color(rng));
    }
    DynamicImage::ImageRgb8(img)
}

/// Random rectangles of random colour over a random base.
fn random_blocks(rng: &mut StdRng) -> DynamicImage {
    let side = random_side(rng);
    let mut img = RgbImage::from_pixel(side, side, Rgb(random_color(rng)));
    for _ in 0..rng.random_range(8..40) {
        let color = Rgb(random_color(rng));
        let (x0, y0) = (rng.random_range(0..side), rng.random_range(0..side));
        let (w, h) = (rng.random_range(8..=side / 2), rng.random_range(8..=side / 2));
        for y in y0..(y0 + h).min(side) {
            for x in x0..(x0 + w).min(side) {
                img.put_pixel(x, y, color);
            }
        }
    }
    DynamicImage::ImageRgb8(img)
}

fn assert_mostly_decodes(family: &str, backgrounds: &[DynamicImage]) {
    let compositor = Compositor::default();
    let decoder = QrDecoder::new();

    let mut failures = Vec::new();
    for (i, background) in backgrounds.iter().enumerate() {
        let image = compositor.compose(background, PAYLOAD).expect("compose");
        assert_eq!(image.width(), RenderConfig::default().output_size);
        match decoder.decode(&DynamicImage::ImageRgba8(image)) {
            Ok(decoded) if decoded == PAYLOAD => {}
            Ok(other) => failures.push(format!("#{i}: decoded {other:?}")),
            Err(err) => failures.push(format!("#{i}: {err}")),
        }
    }

    let successes = backgrounds.len() - failures.len();
    assert!(
        successes * 100 >= backgrounds.len() * 95,
        "{family}: only {successes}/{} decoded: {failures:?}",
        backgrounds.len()
    );
}

fn seeded(seed: u64, make: fn(&mut StdRng) -> DynamicImage) -> Vec<DynamicImage> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..20).map(|_| make(&mut rng)).collect()
}

#[test]
fn composited_codes_decode_on_illustrations() {
    let backgrounds: Vec<DynamicImage> = illustrations().into_iter().map(|(_, bg)| bg).collect();
    assert_mostly_decodes("illustrations", &backgrounds);
}

#[test]
fn composited_codes_decode_on_random_solid_colors() {
    let mut backgrounds = seeded(0x5EED_0001, random_solid);
    backgrounds.push(solid(300, [0, 0, 0]));
    backgrounds.push(solid(300, [20, 30, 90]));
    assert_mostly_decodes("solid", &backgrounds);
}

#[test]
fn composited_codes_decode_on_random_noise() {
    assert_mostly_decodes("noise", &seeded(0x5EED_0002, random_noise));
}

#[test]
fn composited_codes_decode_on_random_blocks() {
    assert_mostly_decodes("blocks", &seeded(0x5EED_0003, random_blocks));
}

#[test]
fn finder_patterns_survive_dark_and_busy_backgrounds() {
    let compositor = Compositor::default();
    let size = compositor.config().output_size;
    let matrix = QrEncoder::new().encode(PAYLOAD).unwrap();
    let scale = size as f32 / matrix.width() as f32;

    let checker = DynamicImage::ImageRgb8(RgbImage::from_fn(700, 700, |x, y| {
        if (x / 9 + y / 9) % 2 == 0 {
            Rgb([10, 10, 10])
        } else {
            Rgb([245, 245, 245])
        }
    }));

    for background in [solid(256, [0, 0, 0]), solid(256, [255, 255, 255]), checker] {
        let image = compositor.compose(&background, PAYLOAD).unwrap();
        assert_eq!(image.dimensions(), (size, size));

        for (row, col) in matrix.finder_origins() {
            let cx = (col as f32 + 3.5) * scale;
            let cy = (row as f32 + 3.5) * scale;
            // Centre, white ring and black ring along the horizontal axis.
            let rings = [(0.0, 0), (2.0, 255), (3.0, 0)];
            for (offset, expected) in rings {
                let Rgba([r, g, b, a]) = *image.get_pixel((cx + offset * scale) as u32, cy as u32);
                assert_eq!((r, g, b, a), (expected, expected, expected, 255));
            }
        }
    }
}

#[test]
fn encoded_background_bytes_are_accepted() {
    let mut png = std::io::Cursor::new(Vec::new());
    horizontal(300, 300, [230, 240, 250], [250, 235, 220])
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let compositor = Compositor::new(RenderConfig {
        output_size: 400,
        verify: true,
        ..RenderConfig::default()
    })
    .unwrap();
    let image = compositor.compose_bytes(png.get_ref(), PAYLOAD).unwrap();
    assert_eq!(image.dimensions(), (400, 400));
}
