use glam::Vec2;

use crate::color::Color;
use crate::image::Image;

/// Fills unpainted pixels with the background color attenuated towards the
/// frame edges by `(height − distance_from_center) / height`.
pub fn vignette(image: &mut Image, background: Color) {
    let width = image.width();
    let height = image.height();
    let has_alpha = image.format().has_alpha();
    let center = Vec2::new(width as f32 / 2.0, height as f32 / 2.0);

    for y in 0..height as i32 {
        for x in 0..width as i32 {
            if has_alpha && image.get(x, y).a() != 0 {
                continue;
            }
            let distance = Vec2::new(x as f32, y as f32).distance(center);
            let factor = (height as f32 - distance) / height as f32;
            image.set(x, y, background * factor);
        }
    }
}

/// Box-filters `k × k` blocks of the supersampled buffer down to the target
/// size. Channel means go into RGB; alpha is forced opaque.
pub fn ssaa_downscale(source: &Image, kernel_size: u8) -> Image {
    let k = kernel_size.max(1) as u32;
    let samples = (k * k) as f32;
    let mut output = Image::new(source.width() / k, source.height() / k, source.format());

    for y in 0..output.height() {
        for x in 0..output.width() {
            let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
            for j in 0..k {
                for i in 0..k {
                    let sample = source.get((x * k + i) as i32, (y * k + j) as i32);
                    r += sample.r() as u32;
                    g += sample.g() as u32;
                    b += sample.b() as u32;
                }
            }
            let color = Color::new(
                (r as f32 / samples) as u8,
                (g as f32 / samples) as u8,
                (b as f32 / samples) as u8,
                255,
            );
            output.set(x as i32, y as i32, color);
        }
    }

    output
}
