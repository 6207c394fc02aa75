//! wgpu implementation of `RenderBackend`.
//!
//! Each active view becomes one render pass over the backbuffer, in view id
//! order. Draw uniforms for the whole frame are uploaded up front into a
//! single dynamic-offset buffer.

mod pipeline;
mod uniforms;

use anyhow::{Context, Result};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::device::{Gpu, GpuFrame, Init, SurfaceErrorAction, DEPTH_FORMAT};
use crate::shader::{ShaderBlob, ShaderFormat};

use super::encoder::{Encoder, ViewPass};
use super::resources::{IndexMeta, ResourceTable, VertexMeta};
use super::{
    Caps, ClearFlags, IndexBufferHandle, ProgramHandle, RenderBackend, RenderState, ResetFlags,
    Resolution, ShaderHandle, ShutdownReport, VertexBufferHandle, VertexLayout, ViewClear, ViewId,
    ViewRect,
};

use pipeline::{PipelineCache, PipelineTargets, ProgramEntry};
use uniforms::{DrawUniforms, UniformRing};

type Resources = ResourceTable<wgpu::ShaderModule, ProgramEntry, wgpu::Buffer, wgpu::Buffer>;

/// GPU rendering backend bound to one window.
pub struct WgpuBackend<'w> {
    gpu: Gpu<'w>,
    resources: Resources,
    encoder: Encoder,
    pipelines: PipelineCache,
    uniforms: UniformRing,
    frame_number: u64,
    shut_down: bool,
}

impl<'w> WgpuBackend<'w> {
    /// Brings up the GPU for `window`. Blocks until the device is ready.
    pub fn new(window: &'w Window, init: Init) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(window, init))?;
        let uniforms = UniformRing::new(gpu.device());

        log::info!(
            "wgpu backend ready: {:?} on {}",
            gpu.caps().backend,
            gpu.caps().adapter
        );

        Ok(Self {
            gpu,
            resources: Resources::default(),
            encoder: Encoder::default(),
            pipelines: PipelineCache::default(),
            uniforms,
            frame_number: 0,
            shut_down: false,
        })
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    /// Drops draws whose resources died after submission.
    fn live_passes(&self, mut passes: Vec<ViewPass>) -> Vec<ViewPass> {
        for pass in &mut passes {
            pass.draws.retain(|draw| match self.resources.validate(draw) {
                Ok(()) => true,
                Err(reason) => {
                    log::warn!("draw on view {} dropped at frame: {reason}", pass.id);
                    false
                }
            });
        }
        passes
    }

    /// Builds missing pipelines. Draws whose pipeline cannot be built are
    /// skipped when the passes are encoded.
    fn prepare_pipelines(&mut self, passes: &[ViewPass]) {
        let targets = PipelineTargets {
            uniforms: self.uniforms.layout(),
            color_format: self.gpu.surface_format(),
            depth_format: DEPTH_FORMAT,
        };

        for pass in passes {
            for draw in &pass.draws {
                let Some(entry) = self.resources.programs.get(draw.program) else { continue };
                let Some((vmeta, _)) = draw
                    .vertex_buffer
                    .and_then(|vb| self.resources.vertex_buffers.get(vb))
                else {
                    continue;
                };

                if let Err(e) = self.pipelines.ensure(
                    self.gpu.device(),
                    &targets,
                    draw.program,
                    entry,
                    &vmeta.layout,
                    draw.state,
                ) {
                    log::warn!("draws of {:?} on view {} dropped: {e:#}", draw.program, pass.id);
                }
            }
        }
    }

    fn encode_passes(&self, frame: &mut GpuFrame, passes: &[ViewPass]) {
        let resolution = self.gpu.resolution();
        let format = self.gpu.surface_format();
        let mut slot = 0usize;

        for pass in passes {
            let clear = pass.state.clear;
            let rect = view_rect(pass.state.rect, resolution);

            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quadview view pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load(&clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.gpu.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load(&clear),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let Some(rect) = rect else {
                slot += pass.draws.len();
                continue;
            };

            rpass.set_viewport(
                f32::from(rect.x),
                f32::from(rect.y),
                f32::from(rect.width),
                f32::from(rect.height),
                0.0,
                1.0,
            );
            rpass.set_scissor_rect(
                u32::from(rect.x),
                u32::from(rect.y),
                u32::from(rect.width),
                u32::from(rect.height),
            );

            let Some(bind_group) = self.uniforms.bind_group() else { continue };

            for draw in &pass.draws {
                let offset = self.uniforms.offset(slot);
                slot += 1;

                let Some(vb) = draw.vertex_buffer else { continue };
                let Some((vmeta, vbuf)) = self.resources.vertex_buffers.get(vb) else { continue };
                let Some(pipeline) =
                    self.pipelines
                        .get(draw.program, &vmeta.layout, draw.state, format)
                else {
                    continue;
                };

                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, bind_group, &[offset]);
                rpass.set_vertex_buffer(0, vbuf.slice(..));

                match draw
                    .index_buffer
                    .and_then(|ib| self.resources.index_buffers.get(ib))
                {
                    Some((imeta, ibuf)) => {
                        rpass.set_index_buffer(ibuf.slice(..), wgpu::IndexFormat::Uint16);
                        rpass.draw_indexed(0..imeta.count, 0, 0..1);
                    }
                    None => rpass.draw(0..vmeta.vertex_count, 0..1),
                }
            }
        }
    }
}

/// Effective pixel rect of a view; an empty rect covers the whole backbuffer.
fn view_rect(rect: ViewRect, resolution: Resolution) -> Option<ViewRect> {
    let rect = if rect.width == 0 || rect.height == 0 {
        ViewRect::full(resolution.width, resolution.height)
    } else {
        rect
    };
    rect.clamp_to(resolution.width, resolution.height)
}

/// Compiles one shader stage. Validation failures come back as errors.
fn shader_module(device: &wgpu::Device, blob: &ShaderBlob) -> Result<wgpu::ShaderModule> {
    let source = match blob.format() {
        ShaderFormat::SpirV => wgpu::util::make_spirv(blob.bytes()),
        ShaderFormat::Wgsl => {
            let text = blob
                .as_wgsl()
                .with_context(|| format!("shader '{}' is not UTF-8 WGSL", blob.name()))?;
            wgpu::ShaderSource::Wgsl(text.into())
        }
    };

    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(blob.name()),
        source,
    });

    if let Some(err) = pollster::block_on(scope.pop()) {
        anyhow::bail!("shader '{}' failed to compile: {err}", blob.name());
    }
    Ok(module)
}

fn color_load(clear: &ViewClear) -> wgpu::LoadOp<wgpu::Color> {
    if clear.flags.contains(ClearFlags::COLOR) {
        let [r, g, b, a] = clear.color();
        wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })
    } else {
        wgpu::LoadOp::Load
    }
}

fn depth_load(clear: &ViewClear) -> wgpu::LoadOp<f32> {
    if clear.flags.contains(ClearFlags::DEPTH) {
        wgpu::LoadOp::Clear(clear.depth.clamp(0.0, 1.0))
    } else {
        wgpu::LoadOp::Load
    }
}

impl RenderBackend for WgpuBackend<'_> {
    fn caps(&self) -> &Caps {
        self.gpu.caps()
    }

    fn resolution(&self) -> Resolution {
        self.gpu.resolution()
    }

    fn reset(&mut self, width: u32, height: u32, flags: ResetFlags) {
        self.gpu.reset(width, height, flags);
    }

    fn create_shader(&mut self, blob: &ShaderBlob) -> Result<ShaderHandle> {
        let module = shader_module(self.gpu.device(), blob)?;

        log::debug!("shader '{}' created ({:?}, {} bytes)", blob.name(), blob.format(), blob.len());
        Ok(self.resources.shaders.insert(module))
    }

    fn create_program(
        &mut self,
        vs: ShaderHandle,
        fs: ShaderHandle,
        destroy_shaders: bool,
    ) -> Result<ProgramHandle> {
        let vs_module = self
            .resources
            .shaders
            .get(vs)
            .context("vertex shader handle is not alive")?
            .clone();
        let fs_module = self
            .resources
            .shaders
            .get(fs)
            .context("fragment shader handle is not alive")?
            .clone();

        let program = self.resources.programs.insert(ProgramEntry {
            vs: vs_module,
            fs: fs_module,
        });

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
        let meta = VertexMeta::new(data.len(), layout)?;
        let buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quadview vertex buffer"),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX,
            });

        Ok(self.resources.vertex_buffers.insert((meta, buffer)))
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<IndexBufferHandle> {
        let meta = IndexMeta::new(indices)?;

        // Buffer sizes must be a multiple of 4 bytes.
        let mut padded = indices.to_vec();
        if padded.len() % 2 == 1 {
            padded.push(0);
        }

        let buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quadview index buffer"),
                contents: bytemuck::cast_slice(&padded),
                usage: wgpu::BufferUsages::INDEX,
            });

        Ok(self.resources.index_buffers.insert((meta, buffer)))
    }

    fn destroy_shader(&mut self, handle: ShaderHandle) {
        if self.resources.shaders.remove(handle).is_none() {
            log::warn!("destroy of stale shader {handle:?} ignored");
        }
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        if self.resources.programs.remove(handle).is_none() {
            log::warn!("destroy of stale program {handle:?} ignored");
            return;
        }
        self.pipelines.evict_program(handle);
    }

    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        match self.resources.vertex_buffers.remove(handle) {
            Some((_, buffer)) => buffer.destroy(),
            None => log::warn!("destroy of stale vertex buffer {handle:?} ignored"),
        }
    }

    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        match self.resources.index_buffers.remove(handle) {
            Some((_, buffer)) => buffer.destroy(),
            None => log::warn!("destroy of stale index buffer {handle:?} ignored"),
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
        let Some(draw) = self.encoder.take_draw(view, program) else { return };

        match self.resources.validate(&draw) {
            Ok(()) => self.encoder.push_draw(draw),
            Err(reason) => log::warn!("draw on view {view} dropped: {reason}"),
        }
    }

    fn frame(&mut self) -> Result<u64> {
        let number = self.frame_number;
        self.frame_number += 1;

        let passes = self.encoder.finish_frame();
        if passes.is_empty() || self.gpu.resolution().is_empty() {
            return Ok(number);
        }
        let passes = self.live_passes(passes);

        let blocks: Vec<DrawUniforms> = passes
            .iter()
            .flat_map(|p| {
                p.draws
                    .iter()
                    .map(|d| DrawUniforms::new(p.state.view, p.state.proj, d.transform))
            })
            .collect();
        self.uniforms.upload(self.gpu.device(), self.gpu.queue(), &blocks);
        self.prepare_pipelines(&passes);

        let mut frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let msg = err.to_string();
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => {
                        Err(anyhow::anyhow!("surface acquire failed: {msg}"))
                    }
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("frame {number} skipped: {msg}");
                        Ok(number)
                    }
                };
            }
        };

        self.encode_passes(&mut frame, &passes);
        self.gpu.submit(frame);

        Ok(number)
    }

    fn shutdown(&mut self) -> ShutdownReport {
        if self.shut_down {
            return ShutdownReport::default();
        }
        self.shut_down = true;

        let report = self.resources.report();
        self.pipelines.clear();
        self.resources.shaders.drain();
        self.resources.programs.drain();
        for (_, (_, buffer)) in self.resources.vertex_buffers.drain() {
            buffer.destroy();
        }
        for (_, (_, buffer)) in self.resources.index_buffers.drain() {
            buffer.destroy();
        }

        log::debug!("wgpu backend shut down after {} frames", self.frame_number);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> wgpu::Device {
        wgpu::Device::noop(&wgpu::DeviceDescriptor::default()).0
    }

    #[test]
    fn malformed_spirv_is_a_compile_error() {
        let mut bytes = 0x0723_0203u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 20]);
        let blob = ShaderBlob::from_bytes("v_simple.bin", bytes).unwrap();
        assert_eq!(blob.format(), ShaderFormat::SpirV);

        let err = shader_module(&device(), &blob).unwrap_err();
        assert!(format!("{err:#}").contains("v_simple.bin"));
    }

    #[test]
    fn invalid_wgsl_is_a_compile_error() {
        let blob = ShaderBlob::wgsl("f_simple.bin", "@fragment fn fs_main( {").unwrap();
        let err = shader_module(&device(), &blob).unwrap_err();
        assert!(format!("{err:#}").contains("f_simple.bin"));
    }

    #[test]
    fn valid_wgsl_compiles() {
        let blob = ShaderBlob::wgsl(
            "simple.wgsl",
            "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }",
        )
        .unwrap();
        assert!(shader_module(&device(), &blob).is_ok());
    }

    #[test]
    fn empty_view_rect_covers_backbuffer() {
        let res = Resolution::new(640, 480, ResetFlags::VSYNC);
        assert_eq!(
            view_rect(ViewRect::default(), res),
            Some(ViewRect::new(0, 0, 640, 480))
        );
    }

    #[test]
    fn view_rect_is_clamped() {
        let res = Resolution::new(640, 480, ResetFlags::VSYNC);
        assert_eq!(
            view_rect(ViewRect::new(600, 400, 100, 100), res),
            Some(ViewRect::new(600, 400, 40, 80))
        );
        assert_eq!(view_rect(ViewRect::new(700, 0, 10, 10), res), None);
    }

    #[test]
    fn clear_flags_select_load_ops() {
        let clear = ViewClear::new(ClearFlags::COLOR | ClearFlags::DEPTH, 0x4433_55ff, 1.0, 0);
        assert!(matches!(color_load(&clear), wgpu::LoadOp::Clear(c) if (c.a - 1.0).abs() < 1e-9));
        assert!(matches!(depth_load(&clear), wgpu::LoadOp::Clear(d) if d == 1.0));

        let keep = ViewClear::new(ClearFlags::empty(), 0, 1.0, 0);
        assert!(matches!(color_load(&keep), wgpu::LoadOp::Load));
        assert!(matches!(depth_load(&keep), wgpu::LoadOp::Load));
    }
}
