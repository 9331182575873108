use std::path::Path;

use anyhow::Context as _;

use crate::error::SumiResult;
use crate::image::{Format, Image};

/// Writes the framebuffer to disk as a PNG.
pub fn save_png(path: &Path, framebuffer: &Image) -> SumiResult<()> {
    let color_type = match framebuffer.format() {
        Format::Grayscale => image::ExtendedColorType::L8,
        Format::GrayscaleAlpha => image::ExtendedColorType::La8,
        Format::Rgb => image::ExtendedColorType::Rgb8,
        Format::Rgba => image::ExtendedColorType::Rgba8,
    };
    image::save_buffer_with_format(
        path,
        framebuffer.buffer(),
        framebuffer.width(),
        framebuffer.height(),
        color_type,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}
