#![forbid(unsafe_code)]

mod color;
mod composite;
mod encode;
mod error;
mod image;
mod loader;
mod math;
mod options;
mod pipeline;
mod post;
mod progress;
mod queue;
mod rasterizer;
mod scene;
mod shader;
mod tangent;
mod transform;

pub use color::{Color, linear_to_srgb};
pub use composite::{PassOutput, composite};
pub use encode::save_png;
pub use error::{SumiError, SumiResult};
pub use image::{Format, Image};
pub use loader::load_gltf;
pub use math::{model_matrix, project, projection_matrix, view_matrix};
pub use options::{
    Camera, CameraConfig, LightConfig, Model, ModelConfig, Projection, RenderConfig, RenderOptions,
    load_config,
};
pub use pipeline::{render, render_with_progress};
pub use post::{ssaa_downscale, vignette};
pub use progress::{NullProgress, ProgressSink};
pub use queue::{RenderOp, RenderQueues, build_queues};
pub use rasterizer::draw_primitive;
pub use scene::{
    AlphaMode, ImageId, Light, LightId, Material, MaterialId, Mesh, MeshId, Morph, MorphTarget,
    Node, NodeId, Primitive, Scene, Skin, SkinId, Texture, TextureId, Vrm0Material, WrapMode,
};
pub use shader::{DefaultShader, DrawState, OutlineShader, RenderContext, Shader, sample_texture};
pub use tangent::generate_tangents;
pub use transform::{MAX_NODE_DEPTH, TransformCache};
