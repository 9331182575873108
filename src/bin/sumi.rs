use std::path::PathBuf;

use clap::Parser;
use glam::Quat;

use sumi::{NullProgress, ProgressSink, RenderOptions};

#[derive(Parser, Debug)]
#[command(name = "sumi", version, about = "Software rasterizer for glTF/VRM models")]
struct Cli {
    /// Input glTF/GLB/VRM file.
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output PNG file.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Render settings JSON (overrides the defaults and the flags below).
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Output image width in pixels.
    #[arg(long, default_value_t = 512)]
    width: u32,

    /// Output image height in pixels.
    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Enable anti-aliasing (SSAA). Roughly doubles memory consumption.
    #[arg(short = 'a', long)]
    ssaa: bool,

    /// Enable the inverted-hull outline pass. Roughly doubles render time.
    #[arg(short = 'l', long)]
    outline: bool,

    /// Fill the background with a vignette instead of a flat color.
    #[arg(long)]
    vignette: bool,

    /// Print progress to stderr.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Suppress all output.
    #[arg(short = 's', long, conflicts_with = "verbose")]
    silent: bool,
}

struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn progress(&mut self, fraction: f32) {
        eprintln!("[{:>3.0}%]", fraction * 100.0);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut options = RenderOptions {
        width: cli.width,
        height: cli.height,
        ssaa: cli.ssaa,
        outline: cli.outline,
        vignette: cli.vignette,
        ..RenderOptions::default()
    };

    // Present the model front-on; VRM avatars face the opposite way from
    // most plain glTF exports.
    let is_vrm = cli
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("vrm"));
    options.model.rotation = if is_vrm {
        Quat::from_xyzw(0.0, 0.966, 0.0, -0.259)
    } else {
        Quat::from_xyzw(0.0, 0.259, 0.0, 0.966)
    };

    if let Some(config_path) = &cli.config {
        let config = sumi::load_config(config_path)?;
        config.apply(&mut options)?;
    }

    let mut progress: Box<dyn ProgressSink> = if cli.verbose {
        Box::new(StderrProgress)
    } else {
        Box::new(NullProgress)
    };

    let scene = sumi::load_gltf(&cli.input, progress.as_mut())?;
    let framebuffer = sumi::render_with_progress(&scene, &options, progress.as_mut())?;
    sumi::save_png(&cli.output, &framebuffer)?;

    if !cli.silent {
        eprintln!("wrote {}", cli.output.display());
    }
    Ok(())
}
