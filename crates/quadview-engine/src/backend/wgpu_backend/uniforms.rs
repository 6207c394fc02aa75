use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-draw uniform block, `@group(0) @binding(0)` in every program.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct DrawUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

impl DrawUniforms {
    pub(super) fn new(view: Mat4, proj: Mat4, model: Mat4) -> Self {
        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
        }
    }
}

const UNIFORM_SIZE: u64 = std::mem::size_of::<DrawUniforms>() as u64;

/// Rounds `size` up to a multiple of `align` (a power of two).
pub(super) fn aligned_stride(size: u64, align: u64) -> u64 {
    let align = align.max(1);
    size.div_ceil(align) * align
}

/// One uniform slot per draw, addressed through a dynamic offset.
pub(super) struct UniformRing {
    layout: wgpu::BindGroupLayout,
    stride: u64,
    capacity: usize,
    buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
    staging: Vec<u8>,
}

impl UniformRing {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadview draw uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_SIZE),
                },
                count: None,
            }],
        });

        let align = u64::from(device.limits().min_uniform_buffer_offset_alignment);

        Self {
            layout,
            stride: aligned_stride(UNIFORM_SIZE, align),
            capacity: 0,
            buffer: None,
            bind_group: None,
            staging: Vec::new(),
        }
    }

    pub(super) fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    /// Uploads one block per draw, in order.
    pub(super) fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        blocks: &[DrawUniforms],
    ) {
        if blocks.is_empty() {
            return;
        }

        self.ensure_capacity(device, blocks.len());

        let stride = self.stride as usize;
        self.staging.clear();
        self.staging.resize(stride * blocks.len(), 0);
        for (slot, block) in self.staging.chunks_exact_mut(stride).zip(blocks) {
            slot[..UNIFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(block));
        }

        if let Some(buffer) = self.buffer.as_ref() {
            queue.write_buffer(buffer, 0, &self.staging);
        }
    }

    pub(super) fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    /// Dynamic offset of the `index`th draw's block.
    pub(super) fn offset(&self, index: usize) -> u32 {
        (self.stride * index as u64) as u32
    }

    fn ensure_capacity(&mut self, device: &wgpu::Device, required: usize) {
        if required <= self.capacity && self.buffer.is_some() {
            return;
        }

        let new_cap = required.next_power_of_two().max(16);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quadview draw uniforms"),
            size: self.stride * new_cap as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadview draw uniforms bind group"),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(UNIFORM_SIZE),
                }),
            }],
        });

        log::debug!("uniform ring grown to {new_cap} draws");
        self.buffer = Some(buffer);
        self.bind_group = Some(bind_group);
        self.capacity = new_cap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_two_matrices() {
        assert_eq!(UNIFORM_SIZE, 128);
    }

    #[test]
    fn stride_rounds_up_to_alignment() {
        assert_eq!(aligned_stride(128, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(300, 256), 512);
        assert_eq!(aligned_stride(128, 0), 128);
    }

    #[test]
    fn view_proj_is_proj_times_view() {
        let view = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, 5.0));
        let proj = Mat4::from_scale(glam::Vec3::splat(2.0));
        let u = DrawUniforms::new(view, proj, Mat4::IDENTITY);
        assert_eq!(Mat4::from_cols_array_2d(&u.view_proj), proj * view);
        assert_eq!(Mat4::from_cols_array_2d(&u.model), Mat4::IDENTITY);
    }
}
