use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};

use crate::backend::{BlendMode, CullMode, DepthTest, ProgramHandle, RenderState, VertexLayout, WriteMask};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    layout: VertexLayout,
    state: RenderState,
    format: wgpu::TextureFormat,
}

/// Stage modules of a linked program.
#[derive(Debug, Clone)]
pub(super) struct ProgramEntry {
    pub vs: wgpu::ShaderModule,
    pub fs: wgpu::ShaderModule,
}

/// Everything a pipeline is built from besides the program.
pub(super) struct PipelineTargets<'a> {
    pub uniforms: &'a wgpu::BindGroupLayout,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
}

/// Render pipelines keyed by program, vertex layout, render state and target format.
#[derive(Default)]
pub(super) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    /// Combinations that failed validation; not retried.
    failed: HashSet<PipelineKey>,
}

impl PipelineCache {
    /// Builds the pipeline for this combination unless it already exists.
    ///
    /// Only the first failure for a combination is returned; later calls
    /// succeed without a pipeline, so `get` keeps returning `None`.
    pub(super) fn ensure(
        &mut self,
        device: &wgpu::Device,
        targets: &PipelineTargets<'_>,
        program: ProgramHandle,
        entry: &ProgramEntry,
        layout: &VertexLayout,
        state: RenderState,
    ) -> Result<()> {
        let key = PipelineKey {
            program,
            layout: layout.clone(),
            state,
            format: targets.color_format,
        };
        if self.pipelines.contains_key(&key) || self.failed.contains(&key) {
            return Ok(());
        }

        log::debug!("building pipeline for {program:?} ({state:?})");
        match build_pipeline(device, targets, entry, layout, state) {
            Ok(pipeline) => {
                self.pipelines.insert(key, pipeline);
                Ok(())
            }
            Err(e) => {
                self.failed.insert(key);
                Err(e)
            }
        }
    }

    pub(super) fn get(
        &self,
        program: ProgramHandle,
        layout: &VertexLayout,
        state: RenderState,
        format: wgpu::TextureFormat,
    ) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&PipelineKey {
            program,
            layout: layout.clone(),
            state,
            format,
        })
    }

    /// Drops every pipeline built from `program`.
    pub(super) fn evict_program(&mut self, program: ProgramHandle) {
        self.pipelines.retain(|key, _| key.program != program);
        self.failed.retain(|key| key.program != program);
    }

    pub(super) fn clear(&mut self) {
        self.pipelines.clear();
        self.failed.clear();
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    targets: &PipelineTargets<'_>,
    entry: &ProgramEntry,
    layout: &VertexLayout,
    state: RenderState,
) -> Result<wgpu::RenderPipeline> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("quadview pipeline layout"),
        bind_group_layouts: &[targets.uniforms],
        immediate_size: 0,
    });

    let attributes = layout.to_wgpu_attributes();
    let buffers = [wgpu::VertexBufferLayout {
        array_stride: layout.stride(),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];

    let (front_face, cull_mode) = cull(state.cull);

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("quadview pipeline"),
        layout: Some(&pipeline_layout),

        // Each module is expected to hold a single entry point per stage.
        vertex: wgpu::VertexState {
            module: &entry.vs,
            entry_point: None,
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &entry.fs,
            entry_point: None,
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: targets.color_format,
                blend: blend(state.blend),
                write_mask: color_writes(state.write),
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: targets.depth_format,
            depth_write_enabled: state.write.contains(WriteMask::Z),
            depth_compare: depth_compare(state.depth_test),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(scope.pop()) {
        bail!("pipeline build failed: {err}");
    }
    Ok(pipeline)
}

fn cull(mode: CullMode) -> (wgpu::FrontFace, Option<wgpu::Face>) {
    match mode {
        CullMode::None => (wgpu::FrontFace::Ccw, None),
        CullMode::Cw => (wgpu::FrontFace::Ccw, Some(wgpu::Face::Back)),
        CullMode::Ccw => (wgpu::FrontFace::Cw, Some(wgpu::Face::Back)),
    }
}

fn depth_compare(test: Option<DepthTest>) -> wgpu::CompareFunction {
    match test {
        None | Some(DepthTest::Always) => wgpu::CompareFunction::Always,
        Some(DepthTest::Less) => wgpu::CompareFunction::Less,
        Some(DepthTest::LessEqual) => wgpu::CompareFunction::LessEqual,
        Some(DepthTest::Equal) => wgpu::CompareFunction::Equal,
        Some(DepthTest::GreaterEqual) => wgpu::CompareFunction::GreaterEqual,
        Some(DepthTest::Greater) => wgpu::CompareFunction::Greater,
        Some(DepthTest::NotEqual) => wgpu::CompareFunction::NotEqual,
    }
}

fn color_writes(mask: WriteMask) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    if mask.contains(WriteMask::R) {
        writes |= wgpu::ColorWrites::RED;
    }
    if mask.contains(WriteMask::G) {
        writes |= wgpu::ColorWrites::GREEN;
    }
    if mask.contains(WriteMask::B) {
        writes |= wgpu::ColorWrites::BLUE;
    }
    if mask.contains(WriteMask::A) {
        writes |= wgpu::ColorWrites::ALPHA;
    }
    writes
}

fn blend(mode: BlendMode) -> Option<wgpu::BlendState> {
    match mode {
        BlendMode::Off => None,
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        BlendMode::PremultipliedAlpha => Some(premul_alpha_blend()),
    }
}

fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::handle::Pool;
    use crate::backend::{Attrib, AttribType};

    use super::super::uniforms::UniformRing;

    const TWO_VERTEX_STAGES: &str = "
        @vertex fn vs_a(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
            return vec4<f32>(p, 1.0);
        }
        @vertex fn vs_b(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
            return vec4<f32>(p, 1.0);
        }
        @fragment fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0);
        }
    ";

    #[test]
    fn ambiguous_entry_point_fails_once_and_is_not_cached() {
        let (device, _queue) = wgpu::Device::noop(&wgpu::DeviceDescriptor::default());
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("two vertex stages"),
            source: wgpu::ShaderSource::Wgsl(TWO_VERTEX_STAGES.into()),
        });
        let entry = ProgramEntry {
            vs: module.clone(),
            fs: module,
        };

        let uniforms = UniformRing::new(&device);
        let targets = PipelineTargets {
            uniforms: uniforms.layout(),
            color_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: wgpu::TextureFormat::Depth32Float,
        };
        let layout = VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false)
            .end()
            .unwrap();
        let mut pool: Pool<ProgramHandle, ()> = Pool::default();
        let program = pool.insert(());

        let mut cache = PipelineCache::default();
        let state = RenderState::DEFAULT;
        assert!(cache.ensure(&device, &targets, program, &entry, &layout, state).is_err());
        assert!(cache.ensure(&device, &targets, program, &entry, &layout, state).is_ok());
        assert!(cache.get(program, &layout, state, targets.color_format).is_none());

        cache.evict_program(program);
        assert!(cache.ensure(&device, &targets, program, &entry, &layout, state).is_err());
    }

    #[test]
    fn default_state_culls_clockwise() {
        let (front, face) = cull(RenderState::DEFAULT.cull);
        assert_eq!(front, wgpu::FrontFace::Ccw);
        assert_eq!(face, Some(wgpu::Face::Back));
        assert_eq!(cull(CullMode::Ccw).0, wgpu::FrontFace::Cw);
        assert_eq!(cull(CullMode::None).1, None);
    }

    #[test]
    fn missing_depth_test_always_passes() {
        assert_eq!(depth_compare(None), wgpu::CompareFunction::Always);
        assert_eq!(
            depth_compare(RenderState::DEFAULT.depth_test),
            wgpu::CompareFunction::Less
        );
    }

    #[test]
    fn write_mask_maps_channels() {
        assert_eq!(color_writes(WriteMask::all()), wgpu::ColorWrites::ALL);
        assert_eq!(color_writes(WriteMask::Z), wgpu::ColorWrites::empty());
        assert_eq!(
            color_writes(WriteMask::R | WriteMask::A),
            wgpu::ColorWrites::RED | wgpu::ColorWrites::ALPHA
        );
    }

    #[test]
    fn blend_off_has_no_state() {
        assert_eq!(blend(BlendMode::Off), None);
        assert_eq!(
            blend(BlendMode::PremultipliedAlpha).map(|b| b.color.src_factor),
            Some(wgpu::BlendFactor::One)
        );
    }
}
