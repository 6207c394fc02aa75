//! Resource bookkeeping shared by every backend.
//!
//! Each backend stores its API objects next to the metadata below; draw
//! validation only looks at the metadata.

use anyhow::{ensure, Result};

use super::encoder::DrawCall;
use super::handle::Pool;
use super::layout::VertexLayout;
use super::types::ShutdownReport;
use super::{IndexBufferHandle, ProgramHandle, ShaderHandle, VertexBufferHandle};

/// Vertex buffer metadata.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VertexMeta {
    pub layout: VertexLayout,
    pub vertex_count: u32,
}

impl VertexMeta {
    pub(crate) fn new(byte_len: usize, layout: &VertexLayout) -> Result<Self> {
        ensure!(byte_len > 0, "vertex buffer is empty");

        let stride = layout.stride() as usize;
        ensure!(
            byte_len % stride == 0,
            "vertex data length {byte_len} is not a multiple of the layout stride {stride}"
        );

        Ok(Self {
            layout: layout.clone(),
            vertex_count: (byte_len / stride) as u32,
        })
    }
}

/// Index buffer metadata.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct IndexMeta {
    pub count: u32,
    pub max_index: u16,
}

impl IndexMeta {
    pub(crate) fn new(indices: &[u16]) -> Result<Self> {
        let max_index = indices.iter().copied().max();
        let Some(max_index) = max_index else {
            anyhow::bail!("index buffer is empty");
        };

        Ok(Self {
            count: indices.len() as u32,
            max_index,
        })
    }
}

/// The four resource pools of a backend.
///
/// `S`, `P`, `V`, `I` are the backend's own payloads (API objects, or `()`
/// for backends that only record).
pub(crate) struct ResourceTable<S, P, V, I> {
    pub shaders: Pool<ShaderHandle, S>,
    pub programs: Pool<ProgramHandle, P>,
    pub vertex_buffers: Pool<VertexBufferHandle, (VertexMeta, V)>,
    pub index_buffers: Pool<IndexBufferHandle, (IndexMeta, I)>,
}

impl<S, P, V, I> Default for ResourceTable<S, P, V, I> {
    fn default() -> Self {
        Self {
            shaders: Pool::default(),
            programs: Pool::default(),
            vertex_buffers: Pool::default(),
            index_buffers: Pool::default(),
        }
    }
}

impl<S, P, V, I> ResourceTable<S, P, V, I> {
    pub(crate) fn report(&self) -> ShutdownReport {
        ShutdownReport {
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            vertex_buffers: self.vertex_buffers.len(),
            index_buffers: self.index_buffers.len(),
        }
    }

    /// Checks that a draw only references live resources and in-range vertices.
    pub(crate) fn validate(&self, draw: &DrawCall) -> Result<(), String> {
        if !self.programs.contains(draw.program) {
            return Err(format!("program {:?} is not alive", draw.program));
        }

        let Some(vb) = draw.vertex_buffer else {
            return Err("no vertex buffer bound".to_string());
        };
        let Some((vmeta, _)) = self.vertex_buffers.get(vb) else {
            return Err(format!("vertex buffer {vb:?} is not alive"));
        };

        if let Some(ib) = draw.index_buffer {
            let Some((imeta, _)) = self.index_buffers.get(ib) else {
                return Err(format!("index buffer {ib:?} is not alive"));
            };
            if u32::from(imeta.max_index) >= vmeta.vertex_count {
                return Err(format!(
                    "index {} out of range for {} vertices",
                    imeta.max_index, vmeta.vertex_count
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::layout::{Attrib, AttribType};
    use crate::backend::RenderState;

    type Table = ResourceTable<(), (), (), ()>;

    fn layout() -> VertexLayout {
        VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false)
            .add(Attrib::Color0, 4, AttribType::Uint8, true)
            .end()
            .unwrap()
    }

    fn draw(program: ProgramHandle) -> DrawCall {
        DrawCall {
            view: 0,
            program,
            vertex_buffer: None,
            index_buffer: None,
            state: RenderState::DEFAULT,
            transform: glam::Mat4::IDENTITY,
        }
    }

    #[test]
    fn vertex_meta_counts_vertices() {
        let meta = VertexMeta::new(64, &layout()).unwrap();
        assert_eq!(meta.vertex_count, 4);
    }

    #[test]
    fn vertex_meta_rejects_partial_vertex() {
        assert!(VertexMeta::new(63, &layout()).is_err());
        assert!(VertexMeta::new(0, &layout()).is_err());
    }

    #[test]
    fn index_meta_tracks_max() {
        let meta = IndexMeta::new(&[0, 1, 3, 1, 2, 3]).unwrap();
        assert_eq!(meta.count, 6);
        assert_eq!(meta.max_index, 3);
        assert!(IndexMeta::new(&[]).is_err());
    }

    #[test]
    fn draw_with_live_resources_is_valid() {
        let mut t = Table::default();
        let program = t.programs.insert(());
        let vb = t
            .vertex_buffers
            .insert((VertexMeta::new(64, &layout()).unwrap(), ()));
        let ib = t
            .index_buffers
            .insert((IndexMeta::new(&[0, 1, 3, 1, 2, 3]).unwrap(), ()));

        let mut d = draw(program);
        d.vertex_buffer = Some(vb);
        d.index_buffer = Some(ib);
        assert_eq!(t.validate(&d), Ok(()));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut t = Table::default();
        let program = t.programs.insert(());
        let vb = t
            .vertex_buffers
            .insert((VertexMeta::new(48, &layout()).unwrap(), ()));
        let ib = t.index_buffers.insert((IndexMeta::new(&[0, 1, 3]).unwrap(), ()));

        let mut d = draw(program);
        d.vertex_buffer = Some(vb);
        d.index_buffer = Some(ib);
        assert!(t.validate(&d).unwrap_err().contains("out of range"));
    }

    #[test]
    fn destroyed_program_is_rejected() {
        let mut t = Table::default();
        let program = t.programs.insert(());
        t.programs.remove(program);
        assert!(t.validate(&draw(program)).is_err());
    }

    #[test]
    fn report_counts_live_resources() {
        let mut t = Table::default();
        t.shaders.insert(());
        t.programs.insert(());
        assert_eq!(t.report().total(), 2);
    }
}
