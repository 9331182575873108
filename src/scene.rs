use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::color::Color;
use crate::image::Image;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SkinId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LightId(pub usize);

/// Texture coordinate wrapping, one mode per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

#[derive(Clone, Debug, Default)]
pub struct Texture {
    pub name: String,
    pub image: Option<ImageId>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Blend,
    Mask,
}

/// VRM 0.x MToon material properties consumed by the outline pass and the
/// render-queue sort.
#[derive(Clone, Debug, Default)]
pub struct Vrm0Material {
    pub render_queue: Option<i32>,
    pub outline_width: f32,
    pub outline_width_mode: Option<u8>,
    pub outline_lighting_mix: Option<f32>,
    pub outline_color: Option<Color>,
    pub outline_width_texture: Option<ImageId>,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    /// Linear-space base color.
    pub base_color_factor: Vec4,
    /// Gamma-corrected variant, the one the fragment stage multiplies with.
    pub base_color_srgb: Vec4,
    pub emissive_factor: Vec3,
    pub base_color_texture: Option<TextureId>,
    pub normal_texture: Option<TextureId>,
    pub emissive_texture: Option<TextureId>,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub specular_factor: f32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub double_sided: bool,
    pub unlit: bool,
    pub vrm0: Option<Vrm0Material>,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            name: String::new(),
            base_color_factor: Vec4::ONE,
            base_color_srgb: Vec4::ONE,
            emissive_factor: Vec3::ZERO,
            base_color_texture: None,
            normal_texture: None,
            emissive_texture: None,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.0,
            specular_factor: 1.0,
            metallic_factor: 1.0,
            roughness_factor: 0.0,
            double_sided: false,
            unlit: false,
            vrm0: None,
        }
    }
}

/// One morph target: per-vertex displacements, each array either empty or
/// sized to the primitive's vertex count.
#[derive(Clone, Debug, Default)]
pub struct MorphTarget {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
}

impl MorphTarget {
    pub fn has_positions(&self) -> bool {
        !self.positions.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_tangents(&self) -> bool {
        !self.tangents.is_empty()
    }
}

/// A named morph channel with its current weight. Channels are paired by
/// position with each primitive's morph targets.
#[derive(Clone, Debug, Default)]
pub struct Morph {
    pub name: String,
    pub weight: f32,
}

/// Indexed triangle list with parallel per-vertex attribute arrays.
#[derive(Clone, Debug, Default)]
pub struct Primitive {
    pub material: Option<MaterialId>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<Vec4>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub targets: Vec<MorphTarget>,
    pub bbmin: Vec3,
    pub bbmax: Vec3,
    pub center: Vec3,
}

impl Primitive {
    pub fn num_faces(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    /// Index-buffer lookup for vertex `vert` of face `face`.
    pub fn index(&self, face: u32, vert: u32) -> usize {
        self.indices[(face * 3 + vert) as usize] as usize
    }

    pub fn vert(&self, face: u32, vert: u32) -> Vec3 {
        self.positions[self.index(face, vert)]
    }

    pub fn normal(&self, face: u32, vert: u32) -> Vec3 {
        self.normals[self.index(face, vert)]
    }

    pub fn tangent(&self, face: u32, vert: u32) -> Vec4 {
        self.tangents[self.index(face, vert)]
    }

    pub fn uv(&self, face: u32, vert: u32) -> Vec2 {
        self.uvs[self.index(face, vert)]
    }

    pub fn color(&self, face: u32, vert: u32) -> Vec4 {
        self.colors[self.index(face, vert)]
    }

    pub fn joint(&self, face: u32, vert: u32) -> [u16; 4] {
        self.joints[self.index(face, vert)]
    }

    pub fn weight(&self, face: u32, vert: u32) -> Vec4 {
        self.weights[self.index(face, vert)]
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_tangents(&self) -> bool {
        !self.tangents.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    pub fn has_joints(&self) -> bool {
        !self.joints.is_empty() && !self.weights.is_empty()
    }

    /// Recomputes the cached bounding box and center from the positions.
    pub fn update_bounds(&mut self) {
        if self.positions.is_empty() {
            self.bbmin = Vec3::ZERO;
            self.bbmax = Vec3::ZERO;
            self.center = Vec3::ZERO;
            return;
        }
        let mut bbmin = Vec3::splat(f32::MAX);
        let mut bbmax = Vec3::splat(f32::MIN);
        for &p in &self.positions {
            bbmin = bbmin.min(p);
            bbmax = bbmax.max(p);
        }
        self.bbmin = bbmin;
        self.bbmax = bbmax;
        self.center = (bbmin + bbmax) / 2.0;
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
    pub morphs: Vec<Morph>,
    pub bbmin: Vec3,
    pub bbmax: Vec3,
    pub center: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub name: String,
    pub joints: Vec<NodeId>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub mesh: Option<MeshId>,
    pub skin: Option<SkinId>,
    /// Local transform relative to the parent.
    pub matrix: Mat4,
}

impl Default for Node {
    fn default() -> Node {
        Node {
            name: String::new(),
            parent: None,
            children: Vec::new(),
            mesh: None,
            skin: None,
            matrix: Mat4::IDENTITY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Color,
}

impl Default for Light {
    fn default() -> Light {
        Light {
            position: Vec3::new(0.0, 1.5, 1.0),
            color: Color::WHITE,
        }
    }
}

/// The fully resolved scene graph. Arenas own all storage; every
/// cross-reference is an index id, and the loader guarantees the node
/// hierarchy is acyclic with depth at most 64.
///
/// A `Scene` is read-only during rendering; the matrices derived from it live
/// in [`crate::TransformCache`].
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub roots: Vec<NodeId>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub skins: Vec<Skin>,
    pub lights: Vec<Light>,
    pub light: Option<LightId>,
    pub bbmin: Vec3,
    pub bbmax: Vec3,
    pub center: Vec3,
}

impl Scene {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn mesh(&self, id: MeshId) -> &Mesh {
        &self.meshes[id.0]
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    pub fn texture(&self, id: TextureId) -> &Texture {
        &self.textures[id.0]
    }

    pub fn image(&self, id: ImageId) -> &Image {
        &self.images[id.0]
    }

    pub fn skin(&self, id: SkinId) -> &Skin {
        &self.skins[id.0]
    }

    /// The light used for shading: the designated one, the first in the
    /// pool, or the built-in default.
    pub fn active_light(&self) -> Light {
        self.light
            .and_then(|id| self.lights.get(id.0))
            .or_else(|| self.lights.first())
            .copied()
            .unwrap_or_default()
    }
}
