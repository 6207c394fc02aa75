//! The static quad and its GPU resources.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use bytemuck::{Pod, Zeroable};

use quadview_engine::backend::{
    Attrib, AttribType, IndexBufferHandle, ProgramHandle, RenderBackend, ShaderHandle,
    VertexBufferHandle, VertexLayout,
};
use quadview_engine::shader::ShaderBlob;

/// Vertex shader file looked up in the shader directory.
pub const VERTEX_SHADER_FILE: &str = "v_simple.bin";
/// Fragment shader file looked up in the shader directory.
pub const FRAGMENT_SHADER_FILE: &str = "f_simple.bin";

const BUNDLED_WGSL: &str = include_str!("../shaders/simple.wgsl");

/// Position + packed color vertex.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PosColorVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Packed `0xAABBGGRR`, read as normalized RGBA bytes.
    pub abgr: u32,
}

impl PosColorVertex {
    pub const fn new(x: f32, y: f32, z: f32, abgr: u32) -> Self {
        Self { x, y, z, abgr }
    }

    pub fn layout() -> Result<VertexLayout> {
        VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false)
            .add(Attrib::Color0, 4, AttribType::Uint8, true)
            .end()
    }
}

pub const QUAD_VERTICES: [PosColorVertex; 4] = [
    PosColorVertex::new(0.5, 0.5, 0.0, 0xff00_00ff),
    PosColorVertex::new(0.5, -0.5, 0.0, 0xff00_00ff),
    PosColorVertex::new(-0.5, -0.5, 0.0, 0xff00_ff00),
    PosColorVertex::new(-0.5, 0.5, 0.0, 0xff00_ff00),
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 3, 1, 2, 3];

/// Vertex + fragment shader blobs of the quad program.
#[derive(Debug, Clone)]
pub struct ShaderPair {
    pub vertex: ShaderBlob,
    pub fragment: ShaderBlob,
}

impl ShaderPair {
    /// Loads `v_simple.bin` / `f_simple.bin` from `dir`.
    ///
    /// When neither file exists the bundled WGSL program is used instead. A
    /// single missing file, or a file that fails to load, is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let vs_path = dir.join(VERTEX_SHADER_FILE);
        let fs_path = dir.join(FRAGMENT_SHADER_FILE);

        if !vs_path.exists() && !fs_path.exists() {
            log::warn!(
                "{} and {} not found in {}; using the bundled WGSL program",
                VERTEX_SHADER_FILE,
                FRAGMENT_SHADER_FILE,
                dir.display()
            );
            return Self::bundled();
        }

        Ok(Self {
            vertex: ShaderBlob::load(&vs_path)?,
            fragment: ShaderBlob::load(&fs_path)?,
        })
    }

    /// The WGSL program compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Ok(Self {
            vertex: ShaderBlob::wgsl("simple.wgsl (vertex)", BUNDLED_WGSL)?,
            fragment: ShaderBlob::wgsl("simple.wgsl (fragment)", BUNDLED_WGSL)?,
        })
    }
}

/// Handles of the quad's GPU resources.
#[derive(Debug)]
pub struct QuadScene {
    pub vertex_buffer: VertexBufferHandle,
    pub index_buffer: IndexBufferHandle,
    pub program: ProgramHandle,
}

/// Resources created so far by an unfinished `QuadScene::create`.
#[derive(Default)]
struct Partial {
    vertex_buffer: Option<VertexBufferHandle>,
    index_buffer: Option<IndexBufferHandle>,
    vs: Option<ShaderHandle>,
    fs: Option<ShaderHandle>,
}

impl Partial {
    fn release(self, backend: &mut dyn RenderBackend) {
        if let Some(h) = self.fs {
            backend.destroy_shader(h);
        }
        if let Some(h) = self.vs {
            backend.destroy_shader(h);
        }
        if let Some(h) = self.index_buffer {
            backend.destroy_index_buffer(h);
        }
        if let Some(h) = self.vertex_buffer {
            backend.destroy_vertex_buffer(h);
        }
    }
}

impl QuadScene {
    /// Uploads the quad and links its program.
    ///
    /// On failure everything created up to that point is destroyed again.
    pub fn create(backend: &mut dyn RenderBackend, shaders: &ShaderPair) -> Result<Self> {
        validate_indices(&QUAD_INDICES, QUAD_VERTICES.len())?;

        let mut partial = Partial::default();
        match Self::build(backend, shaders, &mut partial) {
            Ok(scene) => {
                log::debug!("quad scene created: {scene:?}");
                Ok(scene)
            }
            Err(e) => {
                partial.release(backend);
                Err(e)
            }
        }
    }

    fn build(
        backend: &mut dyn RenderBackend,
        shaders: &ShaderPair,
        partial: &mut Partial,
    ) -> Result<Self> {
        let layout = PosColorVertex::layout()?;

        let vertex_buffer = backend
            .create_vertex_buffer(bytemuck::cast_slice(&QUAD_VERTICES), &layout)
            .context("failed to create quad vertex buffer")?;
        partial.vertex_buffer = Some(vertex_buffer);

        let index_buffer = backend
            .create_index_buffer(&QUAD_INDICES)
            .context("failed to create quad index buffer")?;
        partial.index_buffer = Some(index_buffer);

        let vs = backend
            .create_shader(&shaders.vertex)
            .with_context(|| format!("failed to create shader '{}'", shaders.vertex.name()))?;
        partial.vs = Some(vs);

        let fs = backend
            .create_shader(&shaders.fragment)
            .with_context(|| format!("failed to create shader '{}'", shaders.fragment.name()))?;
        partial.fs = Some(fs);

        let program = backend
            .create_program(vs, fs, true)
            .context("failed to link quad program")?;

        // Linking consumed both shaders.
        partial.vs = None;
        partial.fs = None;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            program,
        })
    }

    /// Destroys the program and both buffers.
    pub fn release(self, backend: &mut dyn RenderBackend) {
        backend.destroy_program(self.program);
        backend.destroy_index_buffer(self.index_buffer);
        backend.destroy_vertex_buffer(self.vertex_buffer);
    }
}

fn validate_indices(indices: &[u16], vertex_count: usize) -> Result<()> {
    for (i, &index) in indices.iter().enumerate() {
        ensure!(
            usize::from(index) < vertex_count,
            "index {i} refers to vertex {index}, but only {vertex_count} vertices exist"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadview_engine::backend::{NoopBackend, ResetFlags, Resolution};

    fn backend() -> NoopBackend {
        NoopBackend::new(Resolution::new(640, 480, ResetFlags::VSYNC))
    }

    #[test]
    fn quad_indices_address_four_vertices() {
        assert!(QUAD_INDICES.iter().all(|&i| i <= 3));
        assert!(validate_indices(&QUAD_INDICES, QUAD_VERTICES.len()).is_ok());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = validate_indices(&[0, 1, 4], 4).unwrap_err();
        assert!(err.to_string().contains("vertex 4"));
    }

    #[test]
    fn vertex_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<PosColorVertex>(), 16);
        assert_eq!(PosColorVertex::layout().unwrap().stride(), 16);
        assert_eq!(bytemuck::cast_slice::<_, u8>(&QUAD_VERTICES).len(), 64);
    }

    #[test]
    fn create_then_release_leaves_nothing_alive() {
        let mut b = backend();
        let shaders = ShaderPair::bundled().unwrap();

        let scene = QuadScene::create(&mut b, &shaders).unwrap();
        let live = b.live();
        assert_eq!((live.shaders, live.programs), (0, 1));
        assert_eq!((live.vertex_buffers, live.index_buffers), (1, 1));

        scene.release(&mut b);
        assert!(b.live().is_clean());
    }

    #[test]
    fn failed_shader_creation_releases_buffers() {
        let mut b = backend();
        b.fail_creates_after(3);

        let shaders = ShaderPair::bundled().unwrap();
        assert!(QuadScene::create(&mut b, &shaders).is_err());
        assert!(b.live().is_clean());
    }

    #[test]
    fn failed_link_releases_shaders_and_buffers() {
        let mut b = backend();
        b.fail_creates_after(4);

        let shaders = ShaderPair::bundled().unwrap();
        let err = QuadScene::create(&mut b, &shaders).unwrap_err();
        assert!(format!("{err:#}").contains("link"));
        assert!(b.live().is_clean());
    }

    #[test]
    fn missing_shader_files_fall_back_to_wgsl() {
        let dir = std::env::temp_dir().join("quadview-no-shaders-here");
        let pair = ShaderPair::load(&dir).unwrap();
        assert!(pair.vertex.as_wgsl().is_some_and(|s| s.contains("@vertex")));
    }

    #[test]
    fn lone_shader_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("quadview-lone-vs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(VERTEX_SHADER_FILE), b"@vertex fn vs_main() {}").unwrap();

        let err = ShaderPair::load(&dir).unwrap_err();
        assert!(format!("{err:#}").contains(FRAGMENT_SHADER_FILE));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
