use glam::Vec3;

use crate::image::Image;
use crate::math;
use crate::shader::{DrawState, RenderContext, Shader};

/// Rasterizes every triangle of the bound primitive into the pass buffers.
///
/// Per face: run the vertex stage three times, skip triangles with no vertex
/// inside the framebuffer, then scan the clamped bounding box testing each
/// pixel with barycentric coverage and the "greater is closer" depth test
/// before dispatching the fragment stage.
pub fn draw_primitive<S: Shader>(
    shader: &mut S,
    ctx: &RenderContext,
    st: &DrawState,
    framebuffer: &mut Image,
    zbuffer: &mut [f32],
) {
    for face in 0..st.primitive.num_faces() {
        let tri = [
            shader.vertex(ctx, st, face, 0).truncate(),
            shader.vertex(ctx, st, face, 1).truncate(),
            shader.vertex(ctx, st, face, 2).truncate(),
        ];
        if !math::triangle_visible(&tri, ctx.width, ctx.height) {
            continue;
        }

        let depths = Vec3::new(tri[0].z, tri[1].z, tri[2].z);
        let backfacing = math::backfacing(&tri);
        let (left, bottom, right, top) = math::triangle_bounds(&tri, ctx.width, ctx.height);

        for y in bottom..=top {
            for x in left..=right {
                let bar = math::barycentric(
                    tri[0],
                    tri[1],
                    tri[2],
                    Vec3::new(x as f32, y as f32, 1.0),
                );
                if !(bar.x >= 0.0 && bar.y >= 0.0 && bar.z >= 0.0) {
                    continue;
                }

                let frag_depth = bar.dot(depths);
                let index = x as usize + y as usize * ctx.width as usize;
                if frag_depth <= zbuffer[index] {
                    continue;
                }

                let Some(color) =
                    shader.fragment(ctx, st, framebuffer, bar, (x, y), backfacing)
                else {
                    continue;
                };

                zbuffer[index] = frag_depth;
                framebuffer.set(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::image::Format;
    use glam::Vec4;

    /// Writes fixed screen-space triangles; lets the tests drive the scan
    /// loop without a full scene.
    struct FixedShader {
        tri: [Vec3; 3],
        color: Color,
        discard: bool,
    }

    impl Shader for FixedShader {
        fn vertex(&mut self, _ctx: &RenderContext, _st: &DrawState, _face: u32, vert: u32) -> Vec4 {
            self.tri[vert as usize].extend(1.0)
        }

        fn fragment(
            &self,
            _ctx: &RenderContext,
            _st: &DrawState,
            _framebuffer: &Image,
            _bar: Vec3,
            _pixel: (i32, i32),
            _backfacing: bool,
        ) -> Option<Color> {
            if self.discard { None } else { Some(self.color) }
        }
    }

    fn test_env() -> (crate::scene::Scene, crate::transform::TransformCache) {
        let scene = crate::scene::Scene::default();
        let transforms = crate::transform::TransformCache::update(&scene);
        (scene, transforms)
    }

    fn context<'s>(
        scene: &'s crate::scene::Scene,
        transforms: &'s crate::transform::TransformCache,
    ) -> RenderContext<'s> {
        RenderContext {
            scene,
            transforms,
            model: glam::Mat4::IDENTITY,
            view: glam::Mat4::IDENTITY,
            projection: glam::Mat4::IDENTITY,
            width: 8,
            height: 8,
            camera_translation: Vec3::ZERO,
            light: crate::scene::Light::default(),
            max_shading_factor: 0.8,
        }
    }

    fn one_face_primitive() -> crate::scene::Primitive {
        crate::scene::Primitive {
            positions: vec![Vec3::ZERO; 3],
            indices: vec![0, 1, 2],
            ..crate::scene::Primitive::default()
        }
    }

    #[test]
    fn covered_pixels_get_color_and_depth() {
        let (scene, transforms) = test_env();
        let ctx = context(&scene, &transforms);
        let prim = one_face_primitive();
        let st = DrawState {
            primitive: &prim,
            morphs: &[],
            material: None,
            joint_matrices: None,
            bind_matrix: glam::Mat4::IDENTITY,
        };

        let mut shader = FixedShader {
            tri: [
                Vec3::new(0.0, 0.0, 0.5),
                Vec3::new(7.5, 0.0, 0.5),
                Vec3::new(0.0, 7.5, 0.5),
            ],
            color: Color::new(10, 20, 30, 255),
            discard: false,
        };
        let mut fb = Image::new(8, 8, Format::Rgba);
        let mut zb = vec![f32::MIN; 64];

        draw_primitive(&mut shader, &ctx, &st, &mut fb, &mut zb);

        assert_eq!(fb.get(0, 0), Color::new(10, 20, 30, 255));
        assert_eq!(fb.get(2, 2), Color::new(10, 20, 30, 255));
        assert_eq!(fb.get(7, 7), Color::ZERO);
        assert!((zb[0] - 0.5).abs() < 1e-6);
        assert_eq!(zb[63], f32::MIN);
    }

    #[test]
    fn nearer_fragment_wins_the_depth_test() {
        let (scene, transforms) = test_env();
        let ctx = context(&scene, &transforms);
        let prim = one_face_primitive();
        let st = DrawState {
            primitive: &prim,
            morphs: &[],
            material: None,
            joint_matrices: None,
            bind_matrix: glam::Mat4::IDENTITY,
        };

        let tri = [
            Vec3::new(-8.0, -8.0, 0.0),
            Vec3::new(24.0, -8.0, 0.0),
            Vec3::new(0.0, 24.0, 0.0),
        ];
        let with_depth = |z: f32| [tri[0].with_z(z), tri[1].with_z(z), tri[2].with_z(z)];

        let mut fb = Image::new(8, 8, Format::Rgba);
        let mut zb = vec![f32::MIN; 64];

        let mut near = FixedShader {
            tri: with_depth(0.9),
            color: Color::new(0, 255, 0, 255),
            discard: false,
        };
        draw_primitive(&mut near, &ctx, &st, &mut fb, &mut zb);

        let mut far = FixedShader {
            tri: with_depth(0.4),
            color: Color::new(0, 0, 255, 255),
            discard: false,
        };
        draw_primitive(&mut far, &ctx, &st, &mut fb, &mut zb);

        assert_eq!(fb.get(3, 3), Color::new(0, 255, 0, 255));
    }

    #[test]
    fn discarded_fragments_leave_no_trace() {
        let (scene, transforms) = test_env();
        let ctx = context(&scene, &transforms);
        let prim = one_face_primitive();
        let st = DrawState {
            primitive: &prim,
            morphs: &[],
            material: None,
            joint_matrices: None,
            bind_matrix: glam::Mat4::IDENTITY,
        };

        let mut shader = FixedShader {
            tri: [
                Vec3::new(0.0, 0.0, 0.5),
                Vec3::new(7.5, 0.0, 0.5),
                Vec3::new(0.0, 7.5, 0.5),
            ],
            color: Color::WHITE,
            discard: true,
        };
        let mut fb = Image::new(8, 8, Format::Rgba);
        let mut zb = vec![f32::MIN; 64];

        draw_primitive(&mut shader, &ctx, &st, &mut fb, &mut zb);

        assert!(fb.buffer().iter().all(|&b| b == 0));
        assert!(zb.iter().all(|&z| z == f32::MIN));
    }

    #[test]
    fn offscreen_triangles_are_skipped() {
        let (scene, transforms) = test_env();
        let ctx = context(&scene, &transforms);
        let prim = one_face_primitive();
        let st = DrawState {
            primitive: &prim,
            morphs: &[],
            material: None,
            joint_matrices: None,
            bind_matrix: glam::Mat4::IDENTITY,
        };

        let mut shader = FixedShader {
            tri: [
                Vec3::new(-10.0, -10.0, 0.5),
                Vec3::new(-20.0, -10.0, 0.5),
                Vec3::new(-10.0, -20.0, 0.5),
            ],
            color: Color::WHITE,
            discard: false,
        };
        let mut fb = Image::new(8, 8, Format::Rgba);
        let mut zb = vec![f32::MIN; 64];

        draw_primitive(&mut shader, &ctx, &st, &mut fb, &mut zb);
        assert!(fb.buffer().iter().all(|&b| b == 0));
    }
}
