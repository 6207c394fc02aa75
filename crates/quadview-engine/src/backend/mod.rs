//! Rendering backend contract.
//!
//! The frame loop talks to the GPU through `RenderBackend`, an
//! immediate-mode interface built around numbered views:
//! - resources are created once and addressed through typed handles
//! - per-draw state is set, then consumed by `submit`
//! - `frame` renders every view that was touched or submitted to, in
//!   ascending view id order, and presents
//!
//! `WgpuBackend` renders with wgpu; `NoopBackend` only records, for tests
//! and headless runs.

mod encoder;
mod handle;
mod layout;
mod noop;
mod resources;
mod types;
mod wgpu_backend;

use anyhow::Result;
use glam::Mat4;

use crate::shader::ShaderBlob;

pub use encoder::{DrawCall, ViewPass, ViewState};
pub use handle::{Handle, IndexBufferHandle, ProgramHandle, RawId, ShaderHandle, VertexBufferHandle};
pub use layout::{Attrib, AttribType, VertexAttrib, VertexLayout, VertexLayoutBuilder};
pub use noop::{FrameRecord, NoopBackend};
pub use types::{
    BackendKind, BlendMode, Caps, ClearFlags, CullMode, DepthTest, RenderState, ResetFlags,
    Resolution, ShutdownReport, ViewClear, ViewId, ViewRect, WriteMask, MAX_VERTEX_STREAMS,
    MAX_VIEWS,
};
pub use wgpu_backend::WgpuBackend;

/// Immediate-mode rendering backend.
///
/// Object safe: the frame loop holds it as `&mut dyn RenderBackend`.
pub trait RenderBackend {
    fn caps(&self) -> &Caps;

    /// Current backbuffer size and reset flags.
    fn resolution(&self) -> Resolution;

    /// Resizes the backbuffer and/or changes reset flags. Takes effect at the next `frame`.
    fn reset(&mut self, width: u32, height: u32, flags: ResetFlags);

    fn create_shader(&mut self, blob: &ShaderBlob) -> Result<ShaderHandle>;

    /// Links a vertex and fragment shader.
    ///
    /// With `destroy_shaders` the shader handles are released once linked.
    fn create_program(
        &mut self,
        vs: ShaderHandle,
        fs: ShaderHandle,
        destroy_shaders: bool,
    ) -> Result<ProgramHandle>;

    fn create_vertex_buffer(&mut self, data: &[u8], layout: &VertexLayout)
        -> Result<VertexBufferHandle>;

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<IndexBufferHandle>;

    fn destroy_shader(&mut self, handle: ShaderHandle);
    fn destroy_program(&mut self, handle: ProgramHandle);
    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle);
    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle);

    fn set_view_clear(&mut self, view: ViewId, clear: ViewClear);
    fn set_view_rect(&mut self, view: ViewId, rect: ViewRect);
    fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4);

    /// Model transform of the next draw.
    fn set_transform(&mut self, transform: Mat4);
    fn set_vertex_buffer(&mut self, stream: u8, handle: VertexBufferHandle);
    fn set_index_buffer(&mut self, handle: IndexBufferHandle);
    fn set_state(&mut self, state: RenderState);

    /// Forces `view` to clear this frame even if nothing is submitted to it.
    fn touch(&mut self, view: ViewId);

    /// Queues a draw with the pending state and resets that state.
    fn submit(&mut self, view: ViewId, program: ProgramHandle);

    /// Renders and presents the frame. Returns the number of the frame just submitted.
    ///
    /// May block to pace presentation (vsync).
    fn frame(&mut self) -> Result<u64>;

    /// Releases every remaining resource and reports how many were still alive.
    ///
    /// Idempotent; later calls report nothing.
    fn shutdown(&mut self) -> ShutdownReport;
}
