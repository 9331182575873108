use crate::color::Color;
use crate::error::{SumiError, SumiResult};

/// Pixel layout of an [`Image`]. The discriminant is the channel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Grayscale = 1,
    GrayscaleAlpha = 2,
    Rgb = 3,
    Rgba = 4,
}

impl Format {
    pub fn channels(self) -> usize {
        self as usize
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Format::GrayscaleAlpha | Format::Rgba)
    }

    pub fn from_channels(channels: usize) -> Option<Format> {
        match channels {
            1 => Some(Format::Grayscale),
            2 => Some(Format::GrayscaleAlpha),
            3 => Some(Format::Rgb),
            4 => Some(Format::Rgba),
            _ => None,
        }
    }
}

/// A tightly packed, row-major pixel buffer.
///
/// The buffer length is always `width · height · channels`. Out-of-bounds
/// reads return [`Color::ZERO`]; out-of-bounds writes are no-ops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    format: Format,
    data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, format: Format) -> Image {
        Image {
            width,
            height,
            format,
            data: vec![0; width as usize * height as usize * format.channels()],
        }
    }

    /// Wraps an already decoded pixel buffer, validating its length.
    pub fn from_raw(width: u32, height: u32, format: Format, data: Vec<u8>) -> SumiResult<Image> {
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(SumiError::asset(format!(
                "image buffer length {} does not match {}x{}x{}",
                data.len(),
                width,
                height,
                format.channels()
            )));
        }
        Ok(Image {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.data
    }

    /// Resizes the buffer and clears every pixel to zero.
    pub fn reset(&mut self, width: u32, height: u32, format: Format) {
        self.width = width;
        self.height = height;
        self.format = format;
        self.data = vec![0; width as usize * height as usize * format.channels()];
    }

    /// Paints `color` into every pixel that has not been rendered yet.
    ///
    /// "Not rendered" means alpha zero, which relies on the framebuffer
    /// starting out fully transparent. Formats without an alpha channel have
    /// no way to record coverage, so they are filled unconditionally.
    pub fn fill(&mut self, color: Color) {
        let channels = self.format.channels();
        let has_alpha = self.format.has_alpha();
        for pixel in self.data.chunks_exact_mut(channels) {
            if has_alpha && pixel[channels - 1] != 0 {
                continue;
            }
            pixel.copy_from_slice(&color.0[..channels]);
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Color {
        if self.data.is_empty() || x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32
        {
            return Color::ZERO;
        }
        let channels = self.format.channels();
        let offset = (x as usize + y as usize * self.width as usize) * channels;
        Color::from_bytes(&self.data[offset..offset + channels], self.format)
    }

    pub fn set(&mut self, x: i32, y: i32, color: Color) {
        if self.data.is_empty() || x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32
        {
            return;
        }
        let channels = self.format.channels();
        let offset = (x as usize + y as usize * self.width as usize) * channels;
        self.data[offset..offset + channels].copy_from_slice(&color.0[..channels]);
    }
}
