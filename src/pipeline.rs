use rayon::prelude::*;
use smallvec::SmallVec;

use crate::composite::{PassOutput, composite};
use crate::error::{SumiError, SumiResult};
use crate::image::{Format, Image};
use crate::math;
use crate::options::RenderOptions;
use crate::post;
use crate::progress::{NullProgress, ProgressSink};
use crate::queue::{RenderQueues, build_queues};
use crate::rasterizer::draw_primitive;
use crate::scene::Scene;
use crate::shader::{DefaultShader, DrawState, OutlineShader, RenderContext, Shader};
use crate::transform::TransformCache;

#[derive(Clone, Copy, Debug)]
enum PassKind {
    Default,
    Outline,
}

/// Renders the scene into a fresh image.
///
/// A pure function of `(scene, options)`:
/// 1. derive the camera/model/projection context,
/// 2. update node and joint matrices,
/// 3. build the render queues,
/// 4. rasterize one pass per shader kind, in parallel,
/// 5. composite the pass buffers with depth-and-alpha resolution,
/// 6. fill the background (or vignette), then optionally downscale SSAA.
pub fn render(scene: &Scene, options: &RenderOptions) -> SumiResult<Image> {
    render_with_progress(scene, options, &mut NullProgress)
}

/// [`render`] with progress milestones: 0.1 queues built, 0.2 passes
/// started, 0.7 passes done, 0.8 composite done, 1.0 complete.
#[tracing::instrument(skip_all, fields(width = options.width, height = options.height))]
pub fn render_with_progress(
    scene: &Scene,
    options: &RenderOptions,
    progress: &mut dyn ProgressSink,
) -> SumiResult<Image> {
    validate_options(options)?;
    validate_scene(scene)?;

    let kernel = if options.ssaa {
        options.ssaa_kernel_size as u32
    } else {
        1
    };
    let width = options.width * kernel;
    let height = options.height * kernel;

    let transforms = TransformCache::update(scene);
    let ctx = RenderContext {
        scene,
        transforms: &transforms,
        model: math::model_matrix(&options.model),
        view: math::view_matrix(&options.camera),
        projection: math::projection_matrix(&options.camera, width, height),
        width,
        height,
        camera_translation: options.camera.translation,
        light: options.light.unwrap_or_else(|| scene.active_light()),
        max_shading_factor: options.max_shading_factor,
    };

    let queues = build_queues(scene);
    progress.progress(0.1);

    let mut kinds: SmallVec<[PassKind; 2]> = SmallVec::new();
    kinds.push(PassKind::Default);
    if options.outline {
        kinds.push(PassKind::Outline);
    }

    progress.progress(0.2);
    let passes: Vec<PassOutput> = kinds
        .as_slice()
        .par_iter()
        .map(|&kind| run_pass(kind, &ctx, &queues, options.format))
        .collect();
    progress.progress(0.7);

    let mut framebuffer = Image::new(width, height, options.format);
    composite(&passes, &mut framebuffer);
    progress.progress(0.8);

    if options.vignette {
        post::vignette(&mut framebuffer, options.background);
    } else {
        framebuffer.fill(options.background);
    }

    if options.ssaa {
        framebuffer = post::ssaa_downscale(&framebuffer, options.ssaa_kernel_size);
    }
    progress.progress(1.0);

    Ok(framebuffer)
}

fn run_pass(
    kind: PassKind,
    ctx: &RenderContext,
    queues: &RenderQueues,
    format: Format,
) -> PassOutput {
    match kind {
        PassKind::Default => run_pass_with(&mut DefaultShader::new(), ctx, queues, format),
        PassKind::Outline => run_pass_with(&mut OutlineShader::new(), ctx, queues, format),
    }
}

fn run_pass_with<S: Shader>(
    shader: &mut S,
    ctx: &RenderContext,
    queues: &RenderQueues,
    format: Format,
) -> PassOutput {
    let mut framebuffer = Image::new(ctx.width, ctx.height, format);
    let mut zbuffer = vec![f32::MIN; ctx.width as usize * ctx.height as usize];

    for ops in queues.values() {
        for op in ops {
            let node = ctx.scene.node(op.node);
            let mesh = ctx.scene.mesh(op.mesh);
            let primitive = &mesh.primitives[op.primitive];
            let st = DrawState {
                primitive,
                morphs: &mesh.morphs,
                material: primitive.material.map(|id| ctx.scene.material(id)),
                joint_matrices: node.skin.map(|id| ctx.transforms.joint_matrices(id)),
                bind_matrix: ctx.transforms.bind_matrix(op.node),
            };
            draw_primitive(shader, ctx, &st, &mut framebuffer, &mut zbuffer);
        }
    }

    PassOutput {
        framebuffer,
        zbuffer,
    }
}

fn validate_options(options: &RenderOptions) -> SumiResult<()> {
    if options.width == 0 || options.height == 0 {
        return Err(SumiError::options(format!(
            "output dimensions must be positive, got {}x{}",
            options.width, options.height
        )));
    }
    if !matches!(options.format, Format::Rgb | Format::Rgba) {
        return Err(SumiError::options("output format must be RGB or RGBA"));
    }
    if options.ssaa && !(1..=4).contains(&options.ssaa_kernel_size) {
        return Err(SumiError::options(format!(
            "ssaa kernel size must be within 1..=4, got {}",
            options.ssaa_kernel_size
        )));
    }
    if options.camera.zfar <= options.camera.znear {
        return Err(SumiError::options(format!(
            "zfar ({}) must exceed znear ({})",
            options.camera.zfar, options.camera.znear
        )));
    }
    Ok(())
}

fn validate_scene(scene: &Scene) -> SumiResult<()> {
    for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
        for (prim_index, primitive) in mesh.primitives.iter().enumerate() {
            if primitive.positions.is_empty() {
                return Err(SumiError::scene(format!(
                    "mesh {mesh_index} primitive {prim_index} has no positions"
                )));
            }
            if primitive.indices.is_empty() {
                return Err(SumiError::scene(format!(
                    "mesh {mesh_index} primitive {prim_index} has an empty index buffer"
                )));
            }
            let vertex_count = primitive.positions.len();
            if primitive.indices.iter().any(|&i| i as usize >= vertex_count) {
                return Err(SumiError::scene(format!(
                    "mesh {mesh_index} primitive {prim_index} indexes past its vertex count"
                )));
            }
        }
    }

    for node in &scene.nodes {
        let (Some(mesh_id), Some(skin_id)) = (node.mesh, node.skin) else {
            continue;
        };
        let joint_count = scene.skin(skin_id).joints.len();
        for primitive in &scene.mesh(mesh_id).primitives {
            if primitive
                .joints
                .iter()
                .flatten()
                .any(|&j| j as usize >= joint_count)
            {
                return Err(SumiError::scene(format!(
                    "node '{}' references joints past its skin's {} joints",
                    node.name, joint_count
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Mesh, MeshId, Node, NodeId, Primitive, Skin, SkinId};
    use glam::Vec3;

    #[test]
    fn rejects_zero_dimensions() {
        let options = RenderOptions {
            width: 0,
            ..RenderOptions::default()
        };
        assert!(matches!(
            render(&Scene::default(), &options),
            Err(SumiError::Options(_))
        ));
    }

    #[test]
    fn rejects_bad_kernel_and_depth_range() {
        let mut options = RenderOptions {
            ssaa: true,
            ssaa_kernel_size: 0,
            ..RenderOptions::default()
        };
        assert!(matches!(
            render(&Scene::default(), &options),
            Err(SumiError::Options(_))
        ));

        options.ssaa_kernel_size = 5;
        assert!(render(&Scene::default(), &options).is_err());

        options.ssaa_kernel_size = 2;
        options.camera.zfar = options.camera.znear;
        assert!(matches!(
            render(&Scene::default(), &options),
            Err(SumiError::Options(_))
        ));
    }

    #[test]
    fn rejects_primitives_without_positions_or_indices() {
        let mut scene = Scene::default();
        scene.meshes.push(Mesh {
            primitives: vec![Primitive::default()],
            ..Mesh::default()
        });
        assert!(matches!(
            render(&scene, &RenderOptions::default()),
            Err(SumiError::Scene(_))
        ));

        scene.meshes[0].primitives[0].positions = vec![Vec3::ZERO];
        assert!(matches!(
            render(&scene, &RenderOptions::default()),
            Err(SumiError::Scene(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_joints() {
        let mut scene = Scene::default();
        let mut primitive = Primitive {
            positions: vec![Vec3::ZERO; 3],
            indices: vec![0, 1, 2],
            joints: vec![[7, 0, 0, 0]; 3],
            weights: vec![glam::Vec4::X; 3],
            ..Primitive::default()
        };
        primitive.update_bounds();
        scene.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Mesh::default()
        });
        scene.skins.push(Skin {
            joints: vec![NodeId(0)],
            inverse_bind_matrices: vec![glam::Mat4::IDENTITY],
            ..Skin::default()
        });
        scene.nodes.push(Node {
            mesh: Some(MeshId(0)),
            skin: Some(SkinId(0)),
            ..Node::default()
        });
        scene.roots.push(NodeId(0));

        assert!(matches!(
            render(&scene, &RenderOptions::default()),
            Err(SumiError::Scene(_))
        ));
    }

    #[test]
    fn empty_scene_renders_background() {
        let options = RenderOptions {
            width: 4,
            height: 4,
            background: crate::Color::new(10, 20, 30, 255),
            ..RenderOptions::default()
        };
        let image = render(&Scene::default(), &options).unwrap();
        assert_eq!(image.format(), Format::Rgba);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(image.get(x, y), crate::Color::new(10, 20, 30, 255));
            }
        }
    }
}
