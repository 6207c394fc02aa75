use std::str::FromStr;

/// Render view slot. Views are rendered in ascending id order.
pub type ViewId = u16;

/// Number of view slots.
pub const MAX_VIEWS: usize = 256;

/// Number of vertex streams a draw can bind.
pub const MAX_VERTEX_STREAMS: u8 = 1;

bitflags::bitflags! {
    /// What a view clears before its draws.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u16 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Backbuffer reset options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResetFlags: u32 {
        /// Wait for vertical blank when presenting.
        const VSYNC = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Channels written by a draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WriteMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const Z = 1 << 4;
        const RGB = Self::R.bits() | Self::G.bits() | Self::B.bits();
    }
}

/// Backbuffer size and reset flags.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub reset: ResetFlags,
}

impl Resolution {
    pub const fn new(width: u32, height: u32, reset: ResetFlags) -> Self {
        Self { width, height, reset }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1280, 720, ResetFlags::VSYNC)
    }
}

/// Viewport rectangle of a view, in backbuffer pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ViewRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl ViewRect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole backbuffer of the given size.
    pub fn full(width: u32, height: u32) -> Self {
        let clamp = |v: u32| v.min(u32::from(u16::MAX)) as u16;
        Self::new(0, 0, clamp(width), clamp(height))
    }

    /// Intersects with a `width x height` target. `None` if nothing remains.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<ViewRect> {
        let x0 = u32::from(self.x).min(width);
        let y0 = u32::from(self.y).min(height);
        let x1 = (u32::from(self.x) + u32::from(self.width)).min(width);
        let y1 = (u32::from(self.y) + u32::from(self.height)).min(height);

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(ViewRect::new(
                x0 as u16,
                y0 as u16,
                (x1 - x0) as u16,
                (y1 - y0) as u16,
            ))
        }
    }
}

/// Clear configuration of a view.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewClear {
    pub flags: ClearFlags,
    /// Packed `0xRRGGBBAA`.
    pub rgba: u32,
    pub depth: f32,
    pub stencil: u8,
}

impl ViewClear {
    pub const fn new(flags: ClearFlags, rgba: u32, depth: f32, stencil: u8) -> Self {
        Self {
            flags,
            rgba,
            depth,
            stencil,
        }
    }

    /// Clear color as normalized `[r, g, b, a]`.
    pub fn color(&self) -> [f64; 4] {
        let [r, g, b, a] = self.rgba.to_be_bytes();
        [r, g, b, a].map(|c| f64::from(c) / 255.0)
    }
}

impl Default for ViewClear {
    fn default() -> Self {
        Self::new(ClearFlags::empty(), 0x0000_00ff, 1.0, 0)
    }
}

/// Depth comparison used by the depth test.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DepthTest {
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
    Always,
}

/// Which triangle winding is discarded.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CullMode {
    None,
    /// Cull clockwise triangles (counter-clockwise is front facing).
    Cw,
    /// Cull counter-clockwise triangles (clockwise is front facing).
    Ccw,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendMode {
    Off,
    Alpha,
    PremultipliedAlpha,
}

/// Fixed-function state of a draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RenderState {
    pub write: WriteMask,
    pub depth_test: Option<DepthTest>,
    pub cull: CullMode,
    pub blend: BlendMode,
}

impl RenderState {
    /// Write color, alpha and depth; depth test `Less`; cull clockwise; no blending.
    pub const DEFAULT: RenderState = RenderState {
        write: WriteMask::all(),
        depth_test: Some(DepthTest::Less),
        cull: CullMode::Cw,
        blend: BlendMode::Off,
    };
}

impl Default for RenderState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Rendering API selection.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BackendKind {
    /// Let the GPU layer pick the platform's preferred API.
    #[default]
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl BackendKind {
    pub fn to_wgpu(self) -> wgpu::Backends {
        match self {
            BackendKind::Auto => wgpu::Backends::all(),
            BackendKind::Vulkan => wgpu::Backends::VULKAN,
            BackendKind::Metal => wgpu::Backends::METAL,
            BackendKind::Dx12 => wgpu::Backends::DX12,
            BackendKind::Gl => wgpu::Backends::GL,
        }
    }

    pub fn from_wgpu(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Vulkan => BackendKind::Vulkan,
            wgpu::Backend::Metal => BackendKind::Metal,
            wgpu::Backend::Dx12 => BackendKind::Dx12,
            wgpu::Backend::Gl => BackendKind::Gl,
            _ => BackendKind::Auto,
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(BackendKind::Auto),
            "vulkan" | "vk" => Ok(BackendKind::Vulkan),
            "metal" | "mtl" => Ok(BackendKind::Metal),
            "dx12" | "d3d12" => Ok(BackendKind::Dx12),
            "gl" | "opengl" | "gles" => Ok(BackendKind::Gl),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Backend capabilities the frame loop needs to build its matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Caps {
    /// Clip-space depth is `[-1, 1]` instead of `[0, 1]`.
    pub homogeneous_depth: bool,
    /// API actually in use.
    pub backend: BackendKind,
    /// Human-readable adapter name.
    pub adapter: String,
}

/// Resources still alive when a backend shut down.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ShutdownReport {
    pub shaders: usize,
    pub programs: usize,
    pub vertex_buffers: usize,
    pub index_buffers: usize,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.shaders + self.programs + self.vertex_buffers + self.index_buffers
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_color_unpacks_rgba() {
        let clear = ViewClear::new(ClearFlags::COLOR, 0x4433_55ff, 1.0, 0);
        let [r, g, b, a] = clear.color();
        assert_eq!(r, 68.0 / 255.0);
        assert_eq!(g, 51.0 / 255.0);
        assert_eq!(b, 85.0 / 255.0);
        assert_eq!(a, 1.0);
    }

    #[test]
    fn full_rect_covers_target() {
        assert_eq!(ViewRect::full(640, 480), ViewRect::new(0, 0, 640, 480));
        assert_eq!(ViewRect::full(100_000, 1).width, u16::MAX);
    }

    #[test]
    fn clamp_to_trims_overhang() {
        let r = ViewRect::new(600, 400, 100, 100);
        assert_eq!(r.clamp_to(640, 480), Some(ViewRect::new(600, 400, 40, 80)));
    }

    #[test]
    fn clamp_to_outside_is_none() {
        assert_eq!(ViewRect::new(700, 0, 10, 10).clamp_to(640, 480), None);
        assert_eq!(ViewRect::new(0, 0, 0, 10).clamp_to(640, 480), None);
    }

    #[test]
    fn default_state_matches_documented_fixed_function() {
        let s = RenderState::default();
        assert!(s.write.contains(WriteMask::RGB | WriteMask::A | WriteMask::Z));
        assert_eq!(s.depth_test, Some(DepthTest::Less));
        assert_eq!(s.cull, CullMode::Cw);
        assert_eq!(s.blend, BlendMode::Off);
    }

    #[test]
    fn backend_kind_parses_aliases() {
        assert_eq!("Vulkan".parse::<BackendKind>(), Ok(BackendKind::Vulkan));
        assert_eq!("d3d12".parse::<BackendKind>(), Ok(BackendKind::Dx12));
        assert_eq!("".parse::<BackendKind>(), Ok(BackendKind::Auto));
        assert!("glide".parse::<BackendKind>().is_err());
    }

    #[test]
    fn shutdown_report_totals() {
        let report = ShutdownReport {
            shaders: 0,
            programs: 1,
            vertex_buffers: 1,
            index_buffers: 0,
        };
        assert_eq!(report.total(), 2);
        assert!(!report.is_clean());
        assert!(ShutdownReport::default().is_clean());
    }
}
