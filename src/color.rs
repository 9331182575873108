use std::ops::{Add, Mul};

use glam::{Vec3, Vec4};

use crate::image::Format;

/// An 8-bit RGBA color.
///
/// All arithmetic stays in byte space: scalar multiplies clamp the factor to
/// `[0, 1]`, additions saturate at 255. Float-vector operands are treated as
/// unit-interval channel values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// Fully transparent black, the initial value of every framebuffer pixel.
    pub const ZERO: Color = Color([0, 0, 0, 0]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const WHITE: Color = Color([255, 255, 255, 255]);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color([r, g, b, a])
    }

    /// Converts unit-interval channel values to bytes.
    pub fn from_vec4(v: Vec4) -> Color {
        Color([
            (v.x * 255.0) as u8,
            (v.y * 255.0) as u8,
            (v.z * 255.0) as u8,
            (v.w * 255.0) as u8,
        ])
    }

    /// Reads one pixel worth of bytes in the given format. Single-channel
    /// values expand to gray, formats without alpha read as opaque.
    pub fn from_bytes(bytes: &[u8], format: Format) -> Color {
        match format {
            Format::Grayscale => Color([bytes[0], bytes[0], bytes[0], 255]),
            Format::GrayscaleAlpha => Color([bytes[0], bytes[0], bytes[0], bytes[1]]),
            Format::Rgb => Color([bytes[0], bytes[1], bytes[2], 255]),
            Format::Rgba => Color([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    pub fn r(self) -> u8 {
        self.0[0]
    }

    pub fn g(self) -> u8 {
        self.0[1]
    }

    pub fn b(self) -> u8 {
        self.0[2]
    }

    pub fn a(self) -> u8 {
        self.0[3]
    }

    pub fn rf(self) -> f32 {
        self.0[0] as f32 / 255.0
    }

    pub fn gf(self) -> f32 {
        self.0[1] as f32 / 255.0
    }

    pub fn bf(self) -> f32 {
        self.0[2] as f32 / 255.0
    }

    pub fn af(self) -> f32 {
        self.0[3] as f32 / 255.0
    }

    pub fn opaque(self) -> Color {
        Color([self.0[0], self.0[1], self.0[2], 255])
    }

    pub fn transparent(self) -> Color {
        Color([self.0[0], self.0[1], self.0[2], 0])
    }

    pub fn with_alpha(self, a: u8) -> Color {
        Color([self.0[0], self.0[1], self.0[2], a])
    }

    /// Decodes a tangent-space normal-map texel to `[-1, 1]` components.
    pub fn to_normal(self) -> Vec3 {
        Vec3::new(
            self.rf() * 2.0 - 1.0,
            self.gf() * 2.0 - 1.0,
            self.bf() * 2.0 - 1.0,
        )
    }

    /// The over-operator: `self·α + dst·(1−α)` with `α = self.af()`.
    pub fn over(self, dst: Color) -> Color {
        let alpha = self.af();
        self * alpha + dst * (1.0 - alpha)
    }
}

impl Default for Color {
    fn default() -> Color {
        Color::BLACK
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, factor: f32) -> Color {
        let clamped = factor.clamp(0.0, 1.0);
        let mut out = [0u8; 4];
        for (dst, src) in out.iter_mut().zip(self.0) {
            *dst = (src as f32 * clamped) as u8;
        }
        Color(out)
    }
}

impl Mul<Vec3> for Color {
    type Output = Color;

    fn mul(self, factors: Vec3) -> Color {
        let mut out = self.0;
        for (dst, factor) in out.iter_mut().zip([factors.x, factors.y, factors.z]) {
            *dst = (*dst as f32 * factor) as u8;
        }
        Color(out)
    }
}

impl Mul<Vec4> for Color {
    type Output = Color;

    fn mul(self, factors: Vec4) -> Color {
        let mut out = [0u8; 4];
        for (i, dst) in out.iter_mut().enumerate() {
            *dst = (self.0[i] as f32 * factors[i]) as u8;
        }
        Color(out)
    }
}

impl Add<Color> for Color {
    type Output = Color;

    fn add(self, other: Color) -> Color {
        let mut out = [0u8; 4];
        for (i, dst) in out.iter_mut().enumerate() {
            *dst = self.0[i].saturating_add(other.0[i]);
        }
        Color(out)
    }
}

impl Add<Vec4> for Color {
    type Output = Color;

    fn add(self, colors: Vec4) -> Color {
        let mut out = [0u8; 4];
        for (i, dst) in out.iter_mut().enumerate() {
            *dst = (self.0[i] as f32 + colors[i] * 255.0) as u8;
        }
        Color(out)
    }
}

/// Gamma-corrects a linear color, leaving alpha untouched.
pub fn linear_to_srgb(linear: Vec4) -> Vec4 {
    fn channel(c: f32) -> f32 {
        if c <= 0.003_130_8 {
            c * 12.92
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        }
    }
    Vec4::new(
        channel(linear.x),
        channel(linear.y),
        channel(linear.z),
        linear.w,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_mul_clamps_factor() {
        let c = Color::new(100, 100, 100, 100);
        assert_eq!(c * 2.0, c);
        assert_eq!(c * -1.0, Color::new(0, 0, 0, 0));
        assert_eq!(c * 0.5, Color::new(50, 50, 50, 50));
    }

    #[test]
    fn add_color_saturates() {
        let c = Color::new(200, 200, 200, 200) + Color::new(100, 10, 100, 100);
        assert_eq!(c, Color::new(255, 210, 255, 255));
    }

    #[test]
    fn add_vec4_scales_by_255_and_saturates() {
        let c = Color::ZERO + Vec4::new(1.0, 0.5, 2.0, 0.0);
        assert_eq!(c, Color::new(255, 127, 255, 0));
    }

    #[test]
    fn vec3_mul_leaves_alpha() {
        let c = Color::new(100, 100, 100, 77) * Vec3::new(0.5, 1.0, 0.0);
        assert_eq!(c, Color::new(50, 100, 0, 77));
    }

    #[test]
    fn to_normal_maps_midpoint_to_zero() {
        let n = Color::new(127, 255, 0, 255).to_normal();
        assert!(n.x.abs() < 0.01);
        assert!((n.y - 1.0).abs() < 1e-6);
        assert!((n.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn over_opaque_src_replaces_dst() {
        let src = Color::new(10, 20, 30, 255);
        assert_eq!(src.over(Color::WHITE), src);
    }

    #[test]
    fn over_transparent_src_keeps_dst() {
        let dst = Color::new(10, 20, 30, 255);
        assert_eq!(Color::ZERO.over(dst), dst);
    }

    #[test]
    fn srgb_conversion_brightens_midtones() {
        let srgb = linear_to_srgb(Vec4::new(0.5, 0.0, 1.0, 0.25));
        assert!(srgb.x > 0.7 && srgb.x < 0.74);
        assert_eq!(srgb.y, 0.0);
        assert!((srgb.z - 1.0).abs() < 1e-5);
        assert_eq!(srgb.w, 0.25);
    }
}
