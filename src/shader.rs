use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::color::Color;
use crate::image::Image;
use crate::math;
use crate::scene::{AlphaMode, Light, Material, Morph, Primitive, Scene, Texture, WrapMode};
use crate::transform::TransformCache;

/// Read-only per-frame state shared by every pass.
pub struct RenderContext<'s> {
    pub scene: &'s Scene,
    pub transforms: &'s TransformCache,
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// Pass framebuffer size (already multiplied by the SSAA kernel).
    pub width: u32,
    pub height: u32,
    pub camera_translation: Vec3,
    pub light: Light,
    pub max_shading_factor: f32,
}

/// Bindings for the primitive currently being drawn, resolved from its node.
pub struct DrawState<'s> {
    pub primitive: &'s Primitive,
    /// Morph channels of the owning mesh, paired by position with the
    /// primitive's targets.
    pub morphs: &'s [Morph],
    pub material: Option<&'s Material>,
    /// Joint matrices of the node's skin, when it has one.
    pub joint_matrices: Option<&'s [Mat4]>,
    /// World bind matrix of the node, the skinning fallback.
    pub bind_matrix: Mat4,
}

/// One of the two stock shader kinds. Each parallel pass owns a distinct
/// instance because the vertex stage stores the triangle's varyings on the
/// shader itself.
pub trait Shader {
    /// Runs the vertex stage for one corner of a triangle and returns its
    /// viewport position (`z` is window depth, `w` is 1).
    fn vertex(&mut self, ctx: &RenderContext, st: &DrawState, face: u32, vert: u32) -> Vec4;

    /// Shades one covered pixel. `bar` interpolates the varyings stored by
    /// the last three `vertex` calls; returning `None` discards the
    /// fragment.
    fn fragment(
        &self,
        ctx: &RenderContext,
        st: &DrawState,
        framebuffer: &Image,
        bar: Vec3,
        pixel: (i32, i32),
        backfacing: bool,
    ) -> Option<Color>;
}

/// Per-triangle interpolation attributes, one column per vertex.
#[derive(Clone, Copy, Debug, Default)]
struct Varyings {
    normal: [Vec3; 3],
    tangent: [Vec3; 3],
    uv: [Vec2; 3],
    color: [Vec4; 3],
    position: [Vec3; 3],
}

impl Varyings {
    fn normal_at(&self, bar: Vec3) -> Vec3 {
        self.normal[0] * bar.x + self.normal[1] * bar.y + self.normal[2] * bar.z
    }

    fn tangent_at(&self, bar: Vec3) -> Vec3 {
        self.tangent[0] * bar.x + self.tangent[1] * bar.y + self.tangent[2] * bar.z
    }

    fn uv_at(&self, bar: Vec3) -> Vec2 {
        self.uv[0] * bar.x + self.uv[1] * bar.y + self.uv[2] * bar.z
    }

    fn color_at(&self, bar: Vec3) -> Vec4 {
        self.color[0] * bar.x + self.color[1] * bar.y + self.color[2] * bar.z
    }

    fn position_at(&self, bar: Vec3) -> Vec3 {
        self.position[0] * bar.x + self.position[1] * bar.y + self.position[2] * bar.z
    }
}

/// Blended skinning matrix for one vertex: the weighted joint-matrix sum
/// when the primitive is skinned, the node's bind matrix otherwise.
pub fn skin_matrix(st: &DrawState, face: u32, vert: u32) -> Mat4 {
    match st.joint_matrices {
        Some(joints) if st.primitive.has_joints() => {
            let index = st.primitive.joint(face, vert);
            let weight = st.primitive.weight(face, vert);
            joints[index[0] as usize] * weight.x
                + joints[index[1] as usize] * weight.y
                + joints[index[2] as usize] * weight.z
                + joints[index[3] as usize] * weight.w
        }
        _ => st.bind_matrix,
    }
}

/// Accumulates weighted position displacements over the morph channels.
/// Targets beyond the channel list (or vice versa) are skipped, which is
/// what old glTF with mismatched counts expects.
fn morph_position(st: &DrawState, face: u32, vert: u32, position: &mut Vec3) {
    let count = st.primitive.targets.len().min(st.morphs.len());
    for i in 0..count {
        let target = &st.primitive.targets[i];
        if target.has_positions() {
            *position += target.positions[st.primitive.index(face, vert)] * st.morphs[i].weight;
        }
    }
}

fn morph_normal(st: &DrawState, face: u32, vert: u32, normal: &mut Vec3) {
    let count = st.primitive.targets.len().min(st.morphs.len());
    for i in 0..count {
        let target = &st.primitive.targets[i];
        if target.has_normals() {
            *normal += target.normals[st.primitive.index(face, vert)] * st.morphs[i].weight;
        }
    }
}

fn morph_tangent(st: &DrawState, face: u32, vert: u32, tangent: &mut Vec4) {
    let count = st.primitive.targets.len().min(st.morphs.len());
    for i in 0..count {
        let target = &st.primitive.targets[i];
        if target.has_tangents() {
            let displacement = target.tangents[st.primitive.index(face, vert)];
            *tangent += displacement.extend(0.0) * st.morphs[i].weight;
        }
    }
}

fn wrap_axis(t: f32, mode: WrapMode, size: u32) -> f32 {
    match mode {
        WrapMode::ClampToEdge => {
            let inset = 0.5 / size as f32;
            t.clamp(inset, 1.0 - inset)
        }
        WrapMode::Repeat => t.rem_euclid(1.0),
        WrapMode::MirroredRepeat => {
            let r = t.rem_euclid(2.0);
            if r > 1.0 { 2.0 - r } else { r }
        }
    }
}

/// Nearest-texel sample honoring the texture's per-axis wrap modes.
pub fn sample_texture(scene: &Scene, texture: &Texture, uv: Vec2) -> Color {
    let Some(image_id) = texture.image else {
        return Color::ZERO;
    };
    let image = scene.image(image_id);
    if image.is_empty() {
        return Color::ZERO;
    }
    let u = wrap_axis(uv.x, texture.wrap_s, image.width());
    let v = wrap_axis(uv.y, texture.wrap_t, image.height());
    let x = ((u * image.width() as f32) as i32).min(image.width() as i32 - 1);
    let y = ((v * image.height() as f32) as i32).min(image.height() as i32 - 1);
    image.get(x, y)
}

/// The lit shader: skinning + morphing in the vertex stage, textured
/// toon-Blinn shading with normal mapping and the glTF alpha modes in the
/// fragment stage.
#[derive(Debug, Default)]
pub struct DefaultShader {
    varyings: Varyings,
}

impl DefaultShader {
    pub fn new() -> DefaultShader {
        DefaultShader::default()
    }
}

impl Shader for DefaultShader {
    fn vertex(&mut self, ctx: &RenderContext, st: &DrawState, face: u32, vert: u32) -> Vec4 {
        let prim = st.primitive;
        let mut position = prim.vert(face, vert);
        morph_position(st, face, vert, &mut position);

        let skin4 = ctx.model * skin_matrix(st, face, vert);
        let skin3 = Mat3::from_mat4(skin4);

        let screen = math::project(
            position,
            ctx.view * skin4,
            ctx.projection,
            ctx.width as f32,
            ctx.height as f32,
        );

        let v = vert as usize;
        if prim.has_normals() {
            let mut normal = prim.normal(face, vert);
            morph_normal(st, face, vert, &mut normal);
            self.varyings.normal[v] = math::vec_mul_mat3(normal, skin3);
        }
        if prim.has_tangents() {
            let mut tangent = prim.tangent(face, vert);
            morph_tangent(st, face, vert, &mut tangent);
            self.varyings.tangent[v] = math::vec_mul_mat3(tangent.truncate(), skin3);
        }
        if prim.has_colors() {
            self.varyings.color[v] = prim.color(face, vert);
        }
        if prim.has_uvs() {
            self.varyings.uv[v] = prim.uv(face, vert);
        }
        self.varyings.position[v] = math::vec_mul_mat3(position, skin3);

        screen.extend(1.0)
    }

    fn fragment(
        &self,
        ctx: &RenderContext,
        st: &DrawState,
        framebuffer: &Image,
        bar: Vec3,
        pixel: (i32, i32),
        backfacing: bool,
    ) -> Option<Color> {
        let vy = &self.varyings;
        let uv = vy.uv_at(bar);
        let in_normal = vy.normal_at(bar);
        let in_tangent = vy.tangent_at(bar);
        let in_position = vy.position_at(bar);
        let in_color = vy.color_at(bar);

        let mut color = Color::ZERO;

        let Some(material) = st.material else {
            // No material to shade with: keep the fragment anyway so it
            // still claims the depth slot, carrying the vertex color when
            // the primitive has one.
            if st.primitive.has_colors() {
                return Some(Color::from_vec4(in_color));
            }
            return Some(color);
        };

        if !material.double_sided && backfacing {
            return None;
        }

        if let Some(texture_id) = material.emissive_texture {
            let texture = ctx.scene.texture(texture_id);
            if texture.image.is_some() {
                let sample = sample_texture(ctx.scene, texture, uv);
                color = color + (sample.transparent() * material.emissive_factor);
            }
        }

        if let Some(texture_id) = material.base_color_texture {
            let texture = ctx.scene.texture(texture_id);
            let texture_has_alpha = texture
                .image
                .map(|id| ctx.scene.image(id).format().has_alpha())
                .unwrap_or(false);
            let mut diffuse = sample_texture(ctx.scene, texture, uv);

            if material.alpha_mode != AlphaMode::Opaque && texture_has_alpha && diffuse.a() == 0 {
                return None;
            }
            if material.alpha_mode == AlphaMode::Mask
                && texture_has_alpha
                && diffuse.af() < material.alpha_cutoff
            {
                return None;
            }
            match material.alpha_mode {
                AlphaMode::Opaque => diffuse = diffuse.opaque(),
                AlphaMode::Blend => {
                    // Pass-local over-operator; correctness rests on the
                    // back-to-front render-queue sort.
                    let previous = framebuffer.get(pixel.0, pixel.1);
                    let blend = diffuse.af();
                    diffuse = diffuse * blend + previous * (1.0 - blend);
                    diffuse = diffuse.opaque();
                }
                AlphaMode::Mask => {}
            }
            color = color + diffuse * material.base_color_srgb;
        } else {
            color = color + material.base_color_srgb;
        }

        if !material.unlit {
            let mut n = in_normal.normalize_or_zero();
            let l = (ctx.light.position - in_position).normalize_or_zero();
            let v = (in_position - ctx.camera_translation).normalize_or_zero();
            let h = (l - v).normalize_or_zero();

            if st.primitive.has_tangents() {
                if let Some(texture_id) = material.normal_texture {
                    let texture = ctx.scene.texture(texture_id);
                    if texture.image.is_some() {
                        let t0 = in_tangent.normalize_or_zero();
                        let t1 = t0 - t0.dot(n) * n;
                        let b = n.cross(t1);
                        let tbn = Mat3::from_cols(t1, b, n);
                        let sample = sample_texture(ctx.scene, texture, uv);
                        n = (tbn * sample.to_normal()).normalize_or_zero();
                    }
                }
            }

            let specular = h.dot(n).max(0.0).powf(16.0).min(ctx.max_shading_factor);
            let shading = n.dot(l).max(ctx.max_shading_factor).min(1.0);
            let specular_color = ctx.light.color
                * (specular
                    * material.specular_factor
                    * (material.metallic_factor - material.roughness_factor));
            if shading > 0.0 {
                let alpha = color.a();
                color = (color * shading + specular_color).with_alpha(alpha);
            }
        }

        if st.primitive.has_colors() {
            color = color * in_color;
        }

        Some(color)
    }
}

/// Inverted-hull outline: the vertex stage pushes each vertex out along its
/// normal, the fragment stage keeps only back faces so that the expanded
/// hull survives as a silhouette ring around the base render.
#[derive(Debug, Default)]
pub struct OutlineShader {
    varyings: Varyings,
}

impl OutlineShader {
    pub fn new() -> OutlineShader {
        OutlineShader::default()
    }

    const DEFAULT_COLOR: Color = Color::new(0, 0, 0, 178);
}

/// Hull displacement in model units, before the VRM width factor.
const OUTLINE_SCALE: f32 = 0.01;

fn outline_width(material: Option<&Material>) -> f32 {
    let Some(vrm0) = material.and_then(|m| m.vrm0.as_ref()) else {
        return 0.0;
    };
    match vrm0.outline_width_mode {
        Some(0) => 0.0,
        Some(2) => vrm0.outline_width.min(0.1),
        _ => vrm0.outline_width,
    }
}

impl Shader for OutlineShader {
    fn vertex(&mut self, ctx: &RenderContext, st: &DrawState, face: u32, vert: u32) -> Vec4 {
        let prim = st.primitive;
        let mut position = prim.vert(face, vert);
        morph_position(st, face, vert, &mut position);

        let skin4 = ctx.model * skin_matrix(st, face, vert);

        let v = vert as usize;
        if prim.has_normals() {
            let mut normal = prim.normal(face, vert);
            morph_normal(st, face, vert, &mut normal);
            self.varyings.normal[v] = math::vec_mul_mat3(normal, Mat3::from_mat4(skin4));
            position += normal.normalize_or_zero() * (OUTLINE_SCALE * outline_width(st.material));
        }
        if prim.has_uvs() {
            self.varyings.uv[v] = prim.uv(face, vert);
        }

        let screen = math::project(
            position,
            ctx.view * skin4,
            ctx.projection,
            ctx.width as f32,
            ctx.height as f32,
        );
        screen.extend(1.0)
    }

    fn fragment(
        &self,
        ctx: &RenderContext,
        st: &DrawState,
        _framebuffer: &Image,
        bar: Vec3,
        _pixel: (i32, i32),
        backfacing: bool,
    ) -> Option<Color> {
        if !backfacing {
            return None;
        }

        let vrm0 = st.material.and_then(|m| m.vrm0.as_ref());
        let outline_color = vrm0
            .and_then(|v| v.outline_color)
            .unwrap_or(Self::DEFAULT_COLOR);
        let lighting_mix = vrm0.and_then(|v| v.outline_lighting_mix).unwrap_or(1.0);
        let width_factor = match vrm0.and_then(|v| v.outline_width_texture) {
            Some(image_id) => {
                let image = ctx.scene.image(image_id);
                let uv = self.varyings.uv_at(bar);
                image
                    .get(
                        (uv.x * image.width() as f32) as i32,
                        (uv.y * image.height() as f32) as i32,
                    )
                    .rf()
            }
            None => 1.0,
        };

        Some(outline_color * (width_factor * lighting_mix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MorphTarget, Vrm0Material};

    fn triangle_primitive() -> Primitive {
        let mut prim = Primitive {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2],
            ..Primitive::default()
        };
        prim.update_bounds();
        prim
    }

    fn draw_state<'s>(prim: &'s Primitive, morphs: &'s [Morph]) -> DrawState<'s> {
        DrawState {
            primitive: prim,
            morphs,
            material: None,
            joint_matrices: None,
            bind_matrix: Mat4::IDENTITY,
        }
    }

    fn test_context<'s>(
        scene: &'s Scene,
        transforms: &'s TransformCache,
    ) -> RenderContext<'s> {
        RenderContext {
            scene,
            transforms,
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            width: 4,
            height: 4,
            camera_translation: Vec3::ZERO,
            light: Light::default(),
            max_shading_factor: 0.8,
        }
    }

    #[test]
    fn material_less_fragments_keep_the_depth_slot() {
        let scene = Scene::default();
        let transforms = TransformCache::update(&scene);
        let ctx = test_context(&scene, &transforms);
        let framebuffer = Image::new(4, 4, crate::image::Format::Rgba);
        let bar = Vec3::splat(1.0 / 3.0);

        // With vertex colors the fragment carries the interpolated color.
        let mut prim = triangle_primitive();
        prim.colors = vec![Vec4::new(1.0, 0.5, 0.25, 1.0); 3];
        let st = draw_state(&prim, &[]);
        let mut shader = DefaultShader::new();
        for vert in 0..3 {
            shader.vertex(&ctx, &st, 0, vert);
        }
        let got = shader.fragment(&ctx, &st, &framebuffer, bar, (0, 0), false);
        assert_eq!(got, Some(Color::new(255, 127, 63, 255)));

        // Without them it is kept as transparent black, never discarded.
        let plain = triangle_primitive();
        let st = draw_state(&plain, &[]);
        let mut shader = DefaultShader::new();
        for vert in 0..3 {
            shader.vertex(&ctx, &st, 0, vert);
        }
        let got = shader.fragment(&ctx, &st, &framebuffer, bar, (0, 0), false);
        assert_eq!(got, Some(Color::ZERO));
    }

    #[test]
    fn skinning_falls_back_to_bind_matrix() {
        let prim = triangle_primitive();
        let mut st = draw_state(&prim, &[]);
        st.bind_matrix = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(skin_matrix(&st, 0, 0), st.bind_matrix);
    }

    #[test]
    fn skinning_blends_joint_matrices_by_weight() {
        let mut prim = triangle_primitive();
        prim.joints = vec![[0, 1, 0, 0]; 3];
        prim.weights = vec![Vec4::new(0.25, 0.75, 0.0, 0.0); 3];
        let joints = [
            Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0)),
            Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0)),
        ];
        let mut st = draw_state(&prim, &[]);
        st.joint_matrices = Some(&joints);

        let blended = skin_matrix(&st, 0, 0);
        let moved = blended.transform_point3(Vec3::ZERO);
        assert!((moved - Vec3::new(1.0, 3.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn morph_accumulates_weighted_displacements() {
        let mut prim = triangle_primitive();
        prim.targets = vec![
            MorphTarget {
                positions: vec![Vec3::X; 3],
                ..MorphTarget::default()
            },
            MorphTarget {
                positions: vec![Vec3::Y; 3],
                ..MorphTarget::default()
            },
        ];
        let morphs = vec![
            Morph {
                name: "a".into(),
                weight: 0.5,
            },
            Morph {
                name: "b".into(),
                weight: 2.0,
            },
        ];
        let st = draw_state(&prim, &morphs);

        let mut position = prim.vert(0, 0);
        morph_position(&st, 0, 0, &mut position);
        assert!((position - Vec3::new(0.5, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn morph_skips_targets_without_a_channel() {
        let mut prim = triangle_primitive();
        prim.targets = vec![MorphTarget {
            positions: vec![Vec3::X; 3],
            ..MorphTarget::default()
        }];
        // Morph list shorter than the target list: nothing applies.
        let st = draw_state(&prim, &[]);
        let mut position = prim.vert(0, 0);
        morph_position(&st, 0, 0, &mut position);
        assert_eq!(position, prim.vert(0, 0));
    }

    #[test]
    fn outline_width_modes() {
        let with_mode = |mode: Option<u8>, width: f32| Material {
            vrm0: Some(Vrm0Material {
                outline_width: width,
                outline_width_mode: mode,
                ..Vrm0Material::default()
            }),
            ..Material::default()
        };

        assert_eq!(outline_width(None), 0.0);
        assert_eq!(outline_width(Some(&with_mode(Some(0), 0.5))), 0.0);
        assert_eq!(outline_width(Some(&with_mode(Some(2), 0.5))), 0.1);
        assert_eq!(outline_width(Some(&with_mode(Some(1), 0.5))), 0.5);
        assert_eq!(outline_width(Some(&with_mode(None, 0.5))), 0.5);
    }

    #[test]
    fn wrap_modes() {
        assert_eq!(wrap_axis(1.25, WrapMode::Repeat, 4), 0.25);
        assert_eq!(wrap_axis(-0.25, WrapMode::Repeat, 4), 0.75);
        assert_eq!(wrap_axis(1.25, WrapMode::MirroredRepeat, 4), 0.75);
        assert_eq!(wrap_axis(2.25, WrapMode::MirroredRepeat, 4), 0.25);
        assert_eq!(wrap_axis(-1.0, WrapMode::ClampToEdge, 4), 0.125);
        assert_eq!(wrap_axis(9.0, WrapMode::ClampToEdge, 4), 0.875);
    }
}
