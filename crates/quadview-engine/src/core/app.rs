use anyhow::Result;

use crate::backend::RenderBackend;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by the runtime.
///
/// Lifecycle: `init` once the backend exists, `on_frame` for every redraw,
/// `shutdown` exactly once before the backend is torn down. `shutdown` also
/// runs when `init` failed, so it must tolerate partial state. It does not
/// run when the backend itself could not be created, since `init` never ran.
pub trait App {
    /// Creates GPU resources.
    fn init(&mut self, backend: &mut dyn RenderBackend) -> Result<()>;

    /// Runs one iteration of the frame loop.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl>;

    /// Releases everything `init` created.
    fn shutdown(&mut self, backend: &mut dyn RenderBackend) {
        let _ = backend;
    }
}
