//! Backend-independent recording of view state and draw submissions.
//!
//! Call order inside a frame follows the immediate-mode contract:
//! `set_transform` / `set_vertex_buffer` / `set_index_buffer` / `set_state`
//! fill the pending draw, `submit` turns it into a `DrawCall` and resets it,
//! `finish_frame` hands the frame's views over to the backend.

use std::collections::BTreeMap;

use glam::Mat4;

use super::types::{RenderState, ViewClear, ViewId, ViewRect, MAX_VERTEX_STREAMS, MAX_VIEWS};
use super::{IndexBufferHandle, ProgramHandle, VertexBufferHandle};

/// Persistent per-view configuration. Survives across frames.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewState {
    pub clear: ViewClear,
    pub rect: ViewRect,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            clear: ViewClear::default(),
            rect: ViewRect::default(),
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

/// One submitted draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCall {
    pub view: ViewId,
    pub program: ProgramHandle,
    pub vertex_buffer: Option<VertexBufferHandle>,
    pub index_buffer: Option<IndexBufferHandle>,
    pub state: RenderState,
    pub transform: Mat4,
}

/// A view to render this frame, with its draws in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewPass {
    pub id: ViewId,
    pub state: ViewState,
    pub draws: Vec<DrawCall>,
}

#[derive(Debug, Copy, Clone)]
struct PendingDraw {
    transform: Mat4,
    vertex_buffer: Option<VertexBufferHandle>,
    index_buffer: Option<IndexBufferHandle>,
    state: RenderState,
}

impl Default for PendingDraw {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            vertex_buffer: None,
            index_buffer: None,
            state: RenderState::DEFAULT,
        }
    }
}

/// Records view state, touches and draws for the current frame.
#[derive(Debug)]
pub(crate) struct Encoder {
    views: Vec<ViewState>,
    pending: PendingDraw,
    /// Views active this frame, keyed by id so passes come out in id order.
    active: BTreeMap<ViewId, Vec<DrawCall>>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            views: vec![ViewState::default(); MAX_VIEWS],
            pending: PendingDraw::default(),
            active: BTreeMap::new(),
        }
    }
}

impl Encoder {
    fn view_mut(&mut self, view: ViewId) -> Option<&mut ViewState> {
        let slot = self.views.get_mut(usize::from(view));
        if slot.is_none() {
            log::warn!("view {view} ignored; only {MAX_VIEWS} views exist");
        }
        slot
    }

    pub(crate) fn set_view_clear(&mut self, view: ViewId, clear: ViewClear) {
        if let Some(v) = self.view_mut(view) {
            v.clear = clear;
        }
    }

    pub(crate) fn set_view_rect(&mut self, view: ViewId, rect: ViewRect) {
        if let Some(v) = self.view_mut(view) {
            v.rect = rect;
        }
    }

    pub(crate) fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4) {
        if let Some(v) = self.view_mut(view) {
            v.view = view_mtx;
            v.proj = proj;
        }
    }

    pub(crate) fn set_transform(&mut self, transform: Mat4) {
        self.pending.transform = transform;
    }

    pub(crate) fn set_vertex_buffer(&mut self, stream: u8, handle: VertexBufferHandle) {
        if stream >= MAX_VERTEX_STREAMS {
            log::warn!("vertex stream {stream} ignored; {MAX_VERTEX_STREAMS} stream(s) supported");
            return;
        }
        self.pending.vertex_buffer = Some(handle);
    }

    pub(crate) fn set_index_buffer(&mut self, handle: IndexBufferHandle) {
        self.pending.index_buffer = Some(handle);
    }

    pub(crate) fn set_state(&mut self, state: RenderState) {
        self.pending.state = state;
    }

    /// Marks `view` as active so it is cleared even without draws.
    pub(crate) fn touch(&mut self, view: ViewId) {
        if self.view_mut(view).is_some() {
            self.active.entry(view).or_default();
        }
    }

    /// Consumes the pending draw state. `None` if `view` is out of range.
    ///
    /// The pending state is reset either way.
    pub(crate) fn take_draw(&mut self, view: ViewId, program: ProgramHandle) -> Option<DrawCall> {
        let pending = std::mem::take(&mut self.pending);
        self.view_mut(view)?;

        Some(DrawCall {
            view,
            program,
            vertex_buffer: pending.vertex_buffer,
            index_buffer: pending.index_buffer,
            state: pending.state,
            transform: pending.transform,
        })
    }

    /// Queues a draw that the backend accepted.
    pub(crate) fn push_draw(&mut self, draw: DrawCall) {
        self.active.entry(draw.view).or_default().push(draw);
    }

    /// Returns this frame's active views in ascending id order and starts a new frame.
    pub(crate) fn finish_frame(&mut self) -> Vec<ViewPass> {
        let active = std::mem::take(&mut self.active);
        self.pending = PendingDraw::default();

        active
            .into_iter()
            .map(|(id, draws)| ViewPass {
                id,
                state: self.views[usize::from(id)],
                draws,
            })
            .collect()
    }
}
