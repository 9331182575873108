use crate::image::{Format, Image};

/// The buffers one shader pass rasterized into.
#[derive(Clone, Debug)]
pub struct PassOutput {
    pub framebuffer: Image,
    /// Window depth per pixel, `f32::MIN` where nothing was drawn.
    pub zbuffer: Vec<f32>,
}

/// Resolves the pass buffers into `output`, walking pixels linearly.
///
/// For each pass in insertion order a pixel is adopted when the pass drew
/// something nearer than what has been accumulated so far; non-opaque RGBA
/// pixels blend with the over-operator instead of replacing outright.
pub fn composite(passes: &[PassOutput], output: &mut Image) {
    let width = output.width();
    let height = output.height();
    let blend_alpha = output.format() == Format::Rgba;

    let mut depth = vec![f32::MIN; width as usize * height as usize];
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let index = x as usize + y as usize * width as usize;
            for pass in passes {
                let pass_depth = pass.zbuffer[index];
                if pass_depth <= depth[index] {
                    continue;
                }
                let mut color = pass.framebuffer.get(x, y);
                if blend_alpha && color.a() != 255 {
                    color = color.over(output.get(x, y));
                }
                output.set(x, y, color);
                depth[index] = pass_depth;
            }
        }
    }
}
