use crate::backend::RenderBackend;
use crate::event::EventSource;

/// Per-frame context passed to `core::App::on_frame`.
///
/// `'a` is the duration of the callback invocation. Events queued since the
/// previous frame are available through `events`.
pub struct FrameCtx<'a> {
    pub events: &'a mut dyn EventSource,
    pub backend: &'a mut dyn RenderBackend,
}

impl<'a> FrameCtx<'a> {
    pub fn new(events: &'a mut dyn EventSource, backend: &'a mut dyn RenderBackend) -> Self {
        Self { events, backend }
    }
}
