use std::path::Path;

use anyhow::Context as _;
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::color::{Color, linear_to_srgb};
use crate::error::{SumiError, SumiResult};
use crate::image::{Format, Image};
use crate::progress::ProgressSink;
use crate::scene::{
    AlphaMode, ImageId, Light, Material, MaterialId, Mesh, MeshId, Morph, MorphTarget, Node,
    NodeId, Primitive, Scene, Skin, SkinId, Texture, TextureId, Vrm0Material, WrapMode,
};
use crate::tangent::generate_tangents;
use crate::transform::MAX_NODE_DEPTH;

/// Loads a `.gltf`/`.glb`/`.vrm` file into a fully resolved [`Scene`]:
/// cross-references become arena ids, texture images are decoded (in
/// parallel), missing tangents are synthesized, and VRM 0.x material
/// properties are wired up.
///
/// Progress milestones: 0.1 parsed, 0.5 textures, 0.6 materials, 0.7
/// meshes, 0.8 nodes, 0.9 skins + VRM, 1.0 done.
#[tracing::instrument(skip(progress), fields(path = %path.display()))]
pub fn load_gltf(path: &Path, progress: &mut dyn ProgressSink) -> SumiResult<Scene> {
    progress.progress(0.0);

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let gltf::Gltf { document, blob } =
        gltf::Gltf::open(path).with_context(|| format!("parse glTF '{}'", path.display()))?;
    let buffers = gltf::import_buffers(&document, Some(base), blob)
        .with_context(|| format!("load buffers for '{}'", path.display()))?;
    progress.progress(0.1);

    let mut scene = Scene::default();

    // Each decoded image is an independent output slot.
    let images: Vec<gltf::Image> = document.images().collect();
    scene.images = images
        .into_par_iter()
        .map(|image| decode_image(image, base, &buffers))
        .collect::<Vec<SumiResult<Image>>>()
        .into_iter()
        .collect::<SumiResult<Vec<Image>>>()?;

    for texture in document.textures() {
        let sampler = texture.sampler();
        scene.textures.push(Texture {
            name: texture
                .source()
                .name()
                .or(texture.name())
                .unwrap_or_default()
                .to_string(),
            image: Some(ImageId(texture.source().index())),
            wrap_s: wrap_mode(sampler.wrap_s()),
            wrap_t: wrap_mode(sampler.wrap_t()),
        });
    }
    progress.progress(0.5);

    for material in document.materials() {
        scene.materials.push(load_material(&material));
    }
    progress.progress(0.6);

    scene.bbmin = Vec3::splat(f32::MAX);
    scene.bbmax = Vec3::splat(f32::MIN);
    for mesh in document.meshes() {
        let loaded = load_mesh(&mesh, &buffers);
        scene.bbmin = scene.bbmin.min(loaded.bbmin);
        scene.bbmax = scene.bbmax.max(loaded.bbmax);
        scene.meshes.push(loaded);
    }
    scene.center = (scene.bbmin + scene.bbmax) / 2.0;
    progress.progress(0.7);

    for node in document.nodes() {
        scene.nodes.push(Node {
            name: node.name().unwrap_or_default().to_string(),
            parent: None,
            children: node.children().map(|c| NodeId(c.index())).collect(),
            mesh: node.mesh().map(|m| MeshId(m.index())),
            skin: node.skin().map(|s| SkinId(s.index())),
            matrix: node_matrix(&node),
        });
    }
    for i in 0..scene.nodes.len() {
        for c in 0..scene.nodes[i].children.len() {
            let child = scene.nodes[i].children[c];
            scene.nodes[child.0].parent = Some(NodeId(i));
        }
    }

    let gltf_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| SumiError::scene("no scene found in glTF, nothing to render"))?;
    scene.roots = gltf_scene.nodes().map(|n| NodeId(n.index())).collect();
    validate_hierarchy(&scene)?;
    progress.progress(0.8);

    for skin in document.skins() {
        let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
        let joints: Vec<NodeId> = skin.joints().map(|j| NodeId(j.index())).collect();
        let inverse_bind_matrices = reader
            .read_inverse_bind_matrices()
            .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
            .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);
        scene.skins.push(Skin {
            name: skin.name().unwrap_or_default().to_string(),
            joints,
            inverse_bind_matrices,
        });
    }

    wire_vrm0(&document, &mut scene);

    if scene.lights.is_empty() {
        scene.lights.push(Light::default());
    }
    progress.progress(0.9);

    tracing::debug!(
        nodes = scene.nodes.len(),
        meshes = scene.meshes.len(),
        materials = scene.materials.len(),
        images = scene.images.len(),
        skins = scene.skins.len(),
        "scene loaded"
    );
    progress.progress(1.0);

    Ok(scene)
}

fn decode_image(
    image: gltf::Image,
    base: &Path,
    buffers: &[gltf::buffer::Data],
) -> SumiResult<Image> {
    let data = gltf::image::Data::from_source(image.source(), Some(base), buffers)
        .with_context(|| format!("decode texture image {}", image.index()))?;
    let format = match data.format {
        gltf::image::Format::R8 => Format::Grayscale,
        gltf::image::Format::R8G8 => Format::GrayscaleAlpha,
        gltf::image::Format::R8G8B8 => Format::Rgb,
        gltf::image::Format::R8G8B8A8 => Format::Rgba,
        other => {
            return Err(SumiError::asset(format!(
                "texture image {} has unsupported pixel format {:?}",
                image.index(),
                other
            )));
        }
    };
    Image::from_raw(data.width, data.height, format, data.pixels)
}

fn wrap_mode(mode: gltf::texture::WrappingMode) -> WrapMode {
    match mode {
        gltf::texture::WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        gltf::texture::WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
        gltf::texture::WrappingMode::Repeat => WrapMode::Repeat,
    }
}

fn load_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let base_color_factor = Vec4::from(pbr.base_color_factor());

    Material {
        name: material.name().unwrap_or_default().to_string(),
        base_color_factor,
        base_color_srgb: linear_to_srgb(base_color_factor),
        emissive_factor: Vec3::from(material.emissive_factor()),
        base_color_texture: pbr
            .base_color_texture()
            .map(|info| TextureId(info.texture().index())),
        normal_texture: material
            .normal_texture()
            .map(|info| TextureId(info.texture().index())),
        emissive_texture: material
            .emissive_texture()
            .map(|info| TextureId(info.texture().index())),
        alpha_mode: match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        },
        alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
        specular_factor: material
            .specular()
            .map(|s| s.specular_factor())
            .unwrap_or(1.0),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        double_sided: material.double_sided(),
        unlit: material.unlit(),
        vrm0: None,
    }
}

fn load_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Mesh {
    let mut primitives = Vec::with_capacity(mesh.primitives().len());
    let mut max_targets = 0;
    let mut primitive_names = Vec::new();

    for primitive in mesh.primitives() {
        let Some(loaded) = load_primitive(&primitive, buffers) else {
            continue;
        };
        max_targets = max_targets.max(loaded.targets.len());
        if primitive_names.is_empty() {
            primitive_names = target_names(primitive.extras());
        }
        primitives.push(loaded);
    }

    // Morph channel names live in mesh extras; old exporters put them on the
    // primitives instead, and some omit them entirely.
    let mesh_names = target_names(mesh.extras());
    let weights = mesh.weights().unwrap_or(&[]);
    let morphs = if !mesh_names.is_empty() {
        mesh_names
            .iter()
            .enumerate()
            .map(|(i, name)| Morph {
                name: name.clone(),
                weight: if weights.len() == mesh_names.len() {
                    weights[i]
                } else {
                    0.0
                },
            })
            .collect()
    } else {
        let count = primitive_names.len().max(max_targets);
        (0..count)
            .map(|i| Morph {
                name: primitive_names.get(i).cloned().unwrap_or_default(),
                weight: 0.0,
            })
            .collect()
    };

    let mut bbmin = Vec3::splat(f32::MAX);
    let mut bbmax = Vec3::splat(f32::MIN);
    for primitive in &primitives {
        bbmin = bbmin.min(primitive.bbmin);
        bbmax = bbmax.max(primitive.bbmax);
    }

    Mesh {
        name: mesh.name().unwrap_or_default().to_string(),
        primitives,
        morphs,
        bbmin,
        bbmax,
        center: (bbmin + bbmax) / 2.0,
    }
}

fn load_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Option<Primitive> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .map(|iter| iter.map(Vec3::from).collect())
        .unwrap_or_default();
    if positions.is_empty() {
        tracing::warn!("skipping primitive without positions");
        return None;
    }

    let indices: Vec<u32> = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_default();
    if indices.is_empty() {
        tracing::warn!("skipping primitive without indices");
        return None;
    }

    let normals: Vec<Vec3> = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from).collect())
        .unwrap_or_default();
    let uvs: Vec<Vec2> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().map(Vec2::from).collect())
        .unwrap_or_default();
    let mut tangents: Vec<Vec4> = reader
        .read_tangents()
        .map(|iter| iter.map(Vec4::from).collect())
        .unwrap_or_default();
    if tangents.is_empty() && !normals.is_empty() && !uvs.is_empty() {
        tangents = generate_tangents(&positions, &normals, &uvs, &indices);
    }

    let joints: Vec<[u16; 4]> = reader
        .read_joints(0)
        .map(|j| j.into_u16().collect())
        .unwrap_or_default();
    let weights: Vec<Vec4> = reader
        .read_weights(0)
        .map(|w| w.into_f32().map(Vec4::from).collect())
        .unwrap_or_default();
    let colors: Vec<Vec4> = reader
        .read_colors(0)
        .map(|c| c.into_rgba_f32().map(Vec4::from).collect())
        .unwrap_or_default();

    let targets = reader
        .read_morph_targets()
        .map(|(positions, normals, tangents)| MorphTarget {
            positions: positions
                .map(|iter| iter.map(Vec3::from).collect())
                .unwrap_or_default(),
            normals: normals
                .map(|iter| iter.map(Vec3::from).collect())
                .unwrap_or_default(),
            tangents: tangents
                .map(|iter| iter.map(Vec3::from).collect())
                .unwrap_or_default(),
        })
        .collect();

    let mut loaded = Primitive {
        material: primitive.material().index().map(MaterialId),
        positions,
        normals,
        tangents,
        uvs,
        joints,
        weights,
        colors,
        indices,
        targets,
        ..Primitive::default()
    };
    loaded.update_bounds();
    Some(loaded)
}

fn node_matrix(node: &gltf::Node) -> Mat4 {
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => Mat4::from_cols_array_2d(&matrix),
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => Mat4::from_scale_rotation_translation(
            Vec3::from(scale),
            Quat::from_array(rotation),
            Vec3::from(translation),
        ),
    }
}

/// Parses `{"targetNames": [...]}` out of a mesh or primitive extras blob.
fn target_names(extras: &gltf::json::Extras) -> Vec<String> {
    let Some(raw) = extras else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw.get()) else {
        return Vec::new();
    };
    value
        .get("targetNames")
        .and_then(|names| names.as_array())
        .map(|names| {
            names
                .iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Rejects node graphs the renderer cannot walk: nodes reachable through two
/// parents, cycles, or chains deeper than [`MAX_NODE_DEPTH`].
fn validate_hierarchy(scene: &Scene) -> SumiResult<()> {
    fn walk(scene: &Scene, id: NodeId, visited: &mut [bool], depth: usize) -> SumiResult<()> {
        if depth > MAX_NODE_DEPTH {
            return Err(SumiError::scene(format!(
                "node hierarchy exceeds the maximum depth of {MAX_NODE_DEPTH}"
            )));
        }
        if visited[id.0] {
            return Err(SumiError::scene("invalid node hierarchy found in glTF"));
        }
        visited[id.0] = true;
        for &child in &scene.node(id).children {
            if child.0 >= scene.nodes.len() {
                return Err(SumiError::scene("node child index out of range"));
            }
            walk(scene, child, visited, depth + 1)?;
        }
        Ok(())
    }

    let mut visited = vec![false; scene.nodes.len()];
    for &root in &scene.roots {
        if root.0 >= scene.nodes.len() {
            return Err(SumiError::scene("scene root index out of range"));
        }
        walk(scene, root, &mut visited, 0)?;
    }
    Ok(())
}

/// Copies the VRM 0.x `materialProperties` the renderer consumes (outline
/// parameters and render-queue keys) onto the materials.
fn wire_vrm0(document: &gltf::Document, scene: &mut Scene) {
    let Some(vrm) = document.extension_value("VRM") else {
        return;
    };
    let Some(properties) = vrm.get("materialProperties").and_then(|v| v.as_array()) else {
        return;
    };
    if properties.len() != scene.materials.len() {
        tracing::warn!(
            vrm = properties.len(),
            gltf = scene.materials.len(),
            "VRM material count does not match glTF, skipping VRM materials"
        );
        return;
    }

    for (index, entry) in properties.iter().enumerate() {
        let mut vrm0 = Vrm0Material {
            render_queue: entry
                .get("renderQueue")
                .and_then(|v| v.as_i64())
                .map(|v| v as i32),
            ..Vrm0Material::default()
        };

        if let Some(floats) = entry.get("floatProperties").and_then(|v| v.as_object()) {
            if let Some(width) = floats.get("_OutlineWidth").and_then(|v| v.as_f64()) {
                vrm0.outline_width = width as f32;
            }
            if let Some(mode) = floats.get("_OutlineWidthMode").and_then(|v| v.as_f64()) {
                vrm0.outline_width_mode = Some(mode as u8);
            }
            if let Some(mix) = floats.get("_OutlineLightingMix").and_then(|v| v.as_f64()) {
                vrm0.outline_lighting_mix = Some(mix as f32);
            }
        }

        if let Some(textures) = entry.get("textureProperties").and_then(|v| v.as_object()) {
            if let Some(slot) = textures.get("_OutlineWidthTexture").and_then(|v| v.as_u64()) {
                vrm0.outline_width_texture = scene
                    .textures
                    .get(slot as usize)
                    .and_then(|texture| texture.image);
            }
        }

        if let Some(vectors) = entry.get("vectorProperties").and_then(|v| v.as_object()) {
            if let Some(rgba) = vectors.get("_OutlineColor").and_then(|v| v.as_array()) {
                if rgba.len() == 4 {
                    let channel =
                        |i: usize| (rgba[i].as_f64().unwrap_or(0.0) * 255.0).clamp(0.0, 255.0) as u8;
                    vrm0.outline_color =
                        Some(Color::new(channel(0), channel(1), channel(2), channel(3)));
                }
            }
        }

        scene.materials[index].vrm0 = Some(vrm0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_names_parse_from_extras() {
        let raw = serde_json::value::RawValue::from_string(
            r#"{"targetNames": ["Neutral", "A", "I"]}"#.to_string(),
        )
        .unwrap();
        let extras: gltf::json::Extras = Some(raw);
        assert_eq!(target_names(&extras), vec!["Neutral", "A", "I"]);
        assert!(target_names(&None).is_empty());
    }

    #[test]
    fn hierarchy_validation_rejects_shared_children() {
        let mut scene = Scene::default();
        scene.nodes.push(Node {
            children: vec![NodeId(2)],
            ..Node::default()
        });
        scene.nodes.push(Node {
            children: vec![NodeId(2)],
            ..Node::default()
        });
        scene.nodes.push(Node::default());
        scene.roots = vec![NodeId(0), NodeId(1)];
        assert!(validate_hierarchy(&scene).is_err());
    }

    #[test]
    fn hierarchy_validation_rejects_deep_chains() {
        let mut scene = Scene::default();
        for i in 0..70 {
            scene.nodes.push(Node {
                children: if i < 69 {
                    vec![NodeId(i + 1)]
                } else {
                    Vec::new()
                },
                ..Node::default()
            });
        }
        scene.roots = vec![NodeId(0)];
        assert!(validate_hierarchy(&scene).is_err());
    }

    #[test]
    fn hierarchy_validation_accepts_a_tree() {
        let mut scene = Scene::default();
        scene.nodes.push(Node {
            children: vec![NodeId(1), NodeId(2)],
            ..Node::default()
        });
        scene.nodes.push(Node::default());
        scene.nodes.push(Node::default());
        scene.roots = vec![NodeId(0)];
        assert!(validate_hierarchy(&scene).is_ok());
    }
}
