use std::collections::VecDeque;

use anyhow::{Context, Result};
use glam::Mat4;

use crate::shader::{ShaderBlob, ShaderFormat};

use super::encoder::{Encoder, ViewPass};
use super::resources::{IndexMeta, ResourceTable, VertexMeta};
use super::{
    BackendKind, Caps, IndexBufferHandle, ProgramHandle, RenderBackend, RenderState, ResetFlags,
    Resolution, ShaderHandle, ShutdownReport, VertexBufferHandle, VertexLayout, ViewClear, ViewId,
    ViewRect,
};

/// Frames and resets kept by a `NoopBackend` unless `with_history` says otherwise.
const DEFAULT_HISTORY: usize = 64;

/// What one `frame()` call rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub number: u64,
    pub resolution: Resolution,
    pub views: Vec<ViewPass>,
}

/// Backend that renders nothing and records everything.
///
/// Applies the same validation and view rules as the GPU backend, so the
/// frame loop behaves identically on top of it. `frame` never blocks.
///
/// Only the most recent frames and resets are kept, so long headless runs
/// stay in bounded memory.
pub struct NoopBackend {
    caps: Caps,
    resolution: Resolution,
    encoder: Encoder,
    resources: ResourceTable<ShaderFormat, (ShaderHandle, ShaderHandle), (), ()>,

    frames: VecDeque<FrameRecord>,
    resets: VecDeque<Resolution>,
    history: usize,
    frame_count: u64,
    rejected_draws: usize,
    create_budget: Option<usize>,
    shut_down: bool,
}

impl NoopBackend {
    pub fn new(resolution: Resolution) -> Self {
        Self::with_caps(
            resolution,
            Caps {
                homogeneous_depth: false,
                backend: BackendKind::Auto,
                adapter: "noop".to_string(),
            },
        )
    }

    pub fn with_caps(resolution: Resolution, caps: Caps) -> Self {
        Self {
            caps,
            resolution,
            encoder: Encoder::default(),
            resources: ResourceTable::default(),
            frames: VecDeque::new(),
            resets: VecDeque::new(),
            history: DEFAULT_HISTORY,
            frame_count: 0,
            rejected_draws: 0,
            create_budget: None,
            shut_down: false,
        }
    }

    /// Keeps at most `history` frames and resets.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        trim(&mut self.frames, history);
        trim(&mut self.resets, history);
        self
    }

    /// The most recent frames, oldest first.
    pub fn frames(&self) -> &VecDeque<FrameRecord> {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.frames.back()
    }

    /// Total `frame` calls, including those no longer in the history.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// The most recent `reset` calls, in order.
    pub fn resets(&self) -> &VecDeque<Resolution> {
        &self.resets
    }

    /// Submissions dropped by validation.
    pub fn rejected_draws(&self) -> usize {
        self.rejected_draws
    }

    /// Resources currently alive.
    pub fn live(&self) -> ShutdownReport {
        self.resources.report()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Lets the next `count` resource creations succeed and fails every one after.
    pub fn fail_creates_after(&mut self, count: usize) {
        self.create_budget = Some(count);
    }

    fn charge_create(&mut self, what: &str) -> Result<()> {
        match self.create_budget.as_mut() {
            Some(0) => anyhow::bail!("{what} creation refused"),
            Some(left) => *left -= 1,
            None => {}
        }
        Ok(())
    }
}

impl RenderBackend for NoopBackend {
    fn caps(&self) -> &Caps {
        &self.caps
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn reset(&mut self, width: u32, height: u32, flags: ResetFlags) {
        self.resolution = Resolution::new(width, height, flags);
        self.resets.push_back(self.resolution);
        trim(&mut self.resets, self.history);
    }

    fn create_shader(&mut self, blob: &ShaderBlob) -> Result<ShaderHandle> {
        self.charge_create("shader")?;
        Ok(self.resources.shaders.insert(blob.format()))
    }

    fn create_program(
        &mut self,
        vs: ShaderHandle,
        fs: ShaderHandle,
        destroy_shaders: bool,
    ) -> Result<ProgramHandle> {
        self.charge_create("program")?;
        self.resources
            .shaders
            .get(vs)
            .context("vertex shader handle is not alive")?;
        self.resources
            .shaders
            .get(fs)
            .context("fragment shader handle is not alive")?;

        let program = self.resources.programs.insert((vs, fs));

        if destroy_shaders {
            self.resources.shaders.remove(vs);
            self.resources.shaders.remove(fs);
        }

        Ok(program)
    }

    fn create_vertex_buffer(
        &mut self,
        data: &[u8],
        layout: &VertexLayout,
    ) -> Result<VertexBufferHandle> {
        self.charge_create("vertex buffer")?;
        let meta = VertexMeta::new(data.len(), layout)?;
        Ok(self.resources.vertex_buffers.insert((meta, ())))
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<IndexBufferHandle> {
        self.charge_create("index buffer")?;
        let meta = IndexMeta::new(indices)?;
        Ok(self.resources.index_buffers.insert((meta, ())))
    }

    fn destroy_shader(&mut self, handle: ShaderHandle) {
        if self.resources.shaders.remove(handle).is_none() {
            log::warn!("destroy of stale shader {handle:?} ignored");
        }
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        if self.resources.programs.remove(handle).is_none() {
            log::warn!("destroy of stale program {handle:?} ignored");
        }
    }

    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        if self.resources.vertex_buffers.remove(handle).is_none() {
            log::warn!("destroy of stale vertex buffer {handle:?} ignored");
        }
    }

    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        if self.resources.index_buffers.remove(handle).is_none() {
            log::warn!("destroy of stale index buffer {handle:?} ignored");
        }
    }

    fn set_view_clear(&mut self, view: ViewId, clear: ViewClear) {
        self.encoder.set_view_clear(view, clear);
    }

    fn set_view_rect(&mut self, view: ViewId, rect: ViewRect) {
        self.encoder.set_view_rect(view, rect);
    }

    fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4) {
        self.encoder.set_view_transform(view, view_mtx, proj);
    }

    fn set_transform(&mut self, transform: Mat4) {
        self.encoder.set_transform(transform);
    }

    fn set_vertex_buffer(&mut self, stream: u8, handle: VertexBufferHandle) {
        self.encoder.set_vertex_buffer(stream, handle);
    }

    fn set_index_buffer(&mut self, handle: IndexBufferHandle) {
        self.encoder.set_index_buffer(handle);
    }

    fn set_state(&mut self, state: RenderState) {
        self.encoder.set_state(state);
    }

    fn touch(&mut self, view: ViewId) {
        self.encoder.touch(view);
    }

    fn submit(&mut self, view: ViewId, program: ProgramHandle) {
        let Some(draw) = self.encoder.take_draw(view, program) else {
            self.rejected_draws += 1;
            return;
        };

        match self.resources.validate(&draw) {
            Ok(()) => self.encoder.push_draw(draw),
            Err(reason) => {
                log::warn!("draw on view {view} dropped: {reason}");
                self.rejected_draws += 1;
            }
        }
    }

    fn frame(&mut self) -> Result<u64> {
        let number = self.frame_count;
        self.frame_count += 1;
        let views = self.encoder.finish_frame();

        self.frames.push_back(FrameRecord {
            number,
            resolution: self.resolution,
            views,
        });
        trim(&mut self.frames, self.history);

        Ok(number)
    }

    fn shutdown(&mut self) -> ShutdownReport {
        if self.shut_down {
            return ShutdownReport::default();
        }
        self.shut_down = true;

        let report = self.resources.report();
        self.resources.shaders.drain();
        self.resources.programs.drain();
        self.resources.vertex_buffers.drain();
        self.resources.index_buffers.drain();
        report
    }
}

fn trim<T>(records: &mut VecDeque<T>, keep: usize) {
    while records.len() > keep {
        records.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Attrib, AttribType, ClearFlags};

    fn layout() -> VertexLayout {
        VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false)
            .add(Attrib::Color0, 4, AttribType::Uint8, true)
            .end()
            .unwrap()
    }

    fn backend() -> NoopBackend {
        NoopBackend::new(Resolution::new(640, 480, ResetFlags::VSYNC))
    }

    fn program(b: &mut NoopBackend) -> ProgramHandle {
        let blob = ShaderBlob::wgsl("s.wgsl", "@vertex fn main() {}").unwrap();
        let vs = b.create_shader(&blob).unwrap();
        let fs = b.create_shader(&blob).unwrap();
        b.create_program(vs, fs, true).unwrap()
    }

    #[test]
    fn program_link_consumes_shaders() {
        let mut b = backend();
        program(&mut b);
        assert_eq!(b.live().shaders, 0);
        assert_eq!(b.live().programs, 1);
    }

    #[test]
    fn program_link_keeps_shaders_when_asked() {
        let mut b = backend();
        let blob = ShaderBlob::wgsl("s.wgsl", "x").unwrap();
        let vs = b.create_shader(&blob).unwrap();
        let fs = b.create_shader(&blob).unwrap();
        b.create_program(vs, fs, false).unwrap();
        assert_eq!(b.live().shaders, 2);
    }

    #[test]
    fn program_from_destroyed_shader_fails() {
        let mut b = backend();
        let blob = ShaderBlob::wgsl("s.wgsl", "x").unwrap();
        let vs = b.create_shader(&blob).unwrap();
        let fs = b.create_shader(&blob).unwrap();
        b.destroy_shader(vs);
        assert!(b.create_program(vs, fs, true).is_err());
    }

    #[test]
    fn submitted_draw_is_recorded_under_its_view() {
        let mut b = backend();
        let p = program(&mut b);
        let vb = b.create_vertex_buffer(&[0u8; 64], &layout()).unwrap();
        let ib = b.create_index_buffer(&[0, 1, 3, 1, 2, 3]).unwrap();

        b.set_view_clear(0, ViewClear::new(ClearFlags::COLOR, 0x4433_55ff, 1.0, 0));
        b.set_vertex_buffer(0, vb);
        b.set_index_buffer(ib);
        b.submit(0, p);
        assert_eq!(b.frame().unwrap(), 0);

        let frame = b.last_frame().unwrap();
        assert_eq!(frame.views.len(), 1);
        assert_eq!(frame.views[0].draws.len(), 1);
        assert_eq!(frame.views[0].draws[0].vertex_buffer, Some(vb));
        assert_eq!(frame.views[0].state.clear.rgba, 0x4433_55ff);
    }

    #[test]
    fn draw_without_vertex_buffer_is_rejected() {
        let mut b = backend();
        let p = program(&mut b);
        b.submit(0, p);
        b.frame().unwrap();
        assert_eq!(b.rejected_draws(), 1);
        assert!(b.last_frame().unwrap().views.is_empty());
    }

    #[test]
    fn create_budget_refuses_later_creates() {
        let mut b = backend();
        b.fail_creates_after(1);
        assert!(b.create_index_buffer(&[0, 1, 2]).is_ok());
        assert!(b.create_index_buffer(&[0, 1, 2]).is_err());
        assert_eq!(b.live().index_buffers, 1);
    }

    #[test]
    fn frame_numbers_increase() {
        let mut b = backend();
        assert_eq!(b.frame().unwrap(), 0);
        assert_eq!(b.frame().unwrap(), 1);
        assert_eq!(b.frames().len(), 2);
    }

    #[test]
    fn history_keeps_only_recent_frames() {
        let mut b = backend().with_history(3);
        for _ in 0..10 {
            b.frame().unwrap();
            b.reset(800, 600, ResetFlags::VSYNC);
        }

        assert_eq!(b.frame_count(), 10);
        assert_eq!(b.frames().len(), 3);
        assert_eq!(b.resets().len(), 3);

        let numbers: Vec<u64> = b.frames().iter().map(|f| f.number).collect();
        assert_eq!(numbers, [7, 8, 9]);
        assert_eq!(b.frame().unwrap(), 10);
    }

    #[test]
    fn default_history_is_bounded() {
        let mut b = backend();
        for _ in 0..DEFAULT_HISTORY + 5 {
            b.frame().unwrap();
        }
        assert_eq!(b.frames().len(), DEFAULT_HISTORY);
        assert_eq!(b.last_frame().map(|f| f.number), Some(DEFAULT_HISTORY as u64 + 4));
    }

    #[test]
    fn reset_applies_to_next_frame() {
        let mut b = backend();
        b.frame().unwrap();
        b.reset(800, 600, ResetFlags::empty());
        b.frame().unwrap();

        assert_eq!(b.frames()[0].resolution.width, 640);
        assert_eq!(b.frames()[1].resolution, Resolution::new(800, 600, ResetFlags::empty()));
        assert_eq!(b.resets().len(), 1);
    }

    #[test]
    fn shutdown_reports_leaks_once() {
        let mut b = backend();
        b.create_index_buffer(&[0, 1, 2]).unwrap();
        assert_eq!(b.shutdown().index_buffers, 1);
        assert!(b.shutdown().is_clean());
        assert!(b.is_shut_down());
        assert!(b.live().is_clean());
    }
}
