use std::path::Path;

use anyhow::Context as _;
use glam::{Quat, Vec3};
use serde::Deserialize;

use crate::color::Color;
use crate::error::{SumiError, SumiResult};
use crate::image::Format;
use crate::scene::Light;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees (perspective mode only).
    pub fov: f32,
    pub znear: f32,
    pub zfar: f32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub mode: Projection,
}

impl Default for Camera {
    fn default() -> Camera {
        Camera {
            fov: 30.0,
            znear: 0.1,
            zfar: 100.0,
            translation: Vec3::new(0.0, 1.0, -2.0),
            rotation: Quat::from_xyzw(0.0, 1.0, 0.0, 0.0),
            scale: Vec3::ONE,
            mode: Projection::Perspective,
        }
    }
}

/// Scene-level model transform applied on top of the node hierarchy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Model {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Model {
    fn default() -> Model {
        Model {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    /// Color painted into pixels no fragment reached.
    pub background: Color,
    pub ssaa: bool,
    pub ssaa_kernel_size: u8,
    pub outline: bool,
    pub vignette: bool,
    /// Toon lighting floor: diffuse shading never drops below this, so
    /// shadowed regions stay readable instead of going black.
    pub max_shading_factor: f32,
    pub camera: Camera,
    pub model: Model,
    /// Overrides the scene's active light when set.
    pub light: Option<Light>,
}

impl Default for RenderOptions {
    fn default() -> RenderOptions {
        RenderOptions {
            width: 1024,
            height: 1024,
            format: Format::Rgba,
            background: Color::WHITE,
            ssaa: false,
            ssaa_kernel_size: 2,
            outline: false,
            vignette: false,
            max_shading_factor: 0.8,
            camera: Camera::default(),
            model: Model::default(),
            light: None,
        }
    }
}

/// JSON render settings. Every field is optional; present fields override
/// the current [`RenderOptions`] values.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Channel count: 3 for RGB, 4 for RGBA.
    pub format: Option<u8>,
    pub background: Option<[u8; 4]>,
    pub ssaa: Option<bool>,
    pub ssaa_kernel_size: Option<u8>,
    pub outline: Option<bool>,
    pub vignette: Option<bool>,
    pub max_shading_factor: Option<f32>,
    pub camera: Option<CameraConfig>,
    pub model: Option<ModelConfig>,
    pub light: Option<LightConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: Option<f32>,
    pub znear: Option<f32>,
    pub zfar: Option<f32>,
    pub translation: Option<[f32; 3]>,
    /// Quaternion as `[x, y, z, w]`.
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub mode: Option<Projection>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub position: Option<[f32; 3]>,
    pub color: Option<[u8; 4]>,
}

impl RenderConfig {
    pub fn apply(&self, options: &mut RenderOptions) -> SumiResult<()> {
        if let Some(v) = self.width {
            options.width = v;
        }
        if let Some(v) = self.height {
            options.height = v;
        }
        if let Some(v) = self.format {
            options.format = Format::from_channels(v as usize)
                .filter(|f| matches!(f, Format::Rgb | Format::Rgba))
                .ok_or_else(|| {
                    SumiError::options(format!("format must be 3 (RGB) or 4 (RGBA), got {v}"))
                })?;
        }
        if let Some(v) = self.background {
            options.background = Color(v);
        }
        if let Some(v) = self.ssaa {
            options.ssaa = v;
        }
        if let Some(v) = self.ssaa_kernel_size {
            options.ssaa_kernel_size = v;
        }
        if let Some(v) = self.outline {
            options.outline = v;
        }
        if let Some(v) = self.vignette {
            options.vignette = v;
        }
        if let Some(v) = self.max_shading_factor {
            options.max_shading_factor = v;
        }

        if let Some(camera) = &self.camera {
            if let Some(v) = camera.fov {
                options.camera.fov = v;
            }
            if let Some(v) = camera.znear {
                options.camera.znear = v;
            }
            if let Some(v) = camera.zfar {
                options.camera.zfar = v;
            }
            if let Some(v) = camera.translation {
                options.camera.translation = Vec3::from(v);
            }
            if let Some(v) = camera.rotation {
                options.camera.rotation = Quat::from_array(v);
            }
            if let Some(v) = camera.scale {
                options.camera.scale = Vec3::from(v);
            }
            if let Some(v) = camera.mode {
                options.camera.mode = v;
            }
        }

        if let Some(model) = &self.model {
            if let Some(v) = model.translation {
                options.model.translation = Vec3::from(v);
            }
            if let Some(v) = model.rotation {
                options.model.rotation = Quat::from_array(v);
            }
            if let Some(v) = model.scale {
                options.model.scale = Vec3::from(v);
            }
        }

        if let Some(light) = &self.light {
            let mut value = options.light.unwrap_or_default();
            if let Some(v) = light.position {
                value.position = Vec3::from(v);
            }
            if let Some(v) = light.color {
                value.color = Color(v);
            }
            options.light = Some(value);
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> SumiResult<RenderConfig> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open config '{}'", path.display()))?;
    let config = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parse config '{}'", path.display()))?;
    Ok(config)
}
