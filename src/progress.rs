/// Receives coarse completion fractions from the loader and the renderer.
///
/// Milestones are documented on [`crate::load_gltf`] and
/// [`crate::render_with_progress`]; values only ever increase within one
/// call.
pub trait ProgressSink {
    fn progress(&mut self, fraction: f32);
}

/// Discards all notifications.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&mut self, _fraction: f32) {}
}
