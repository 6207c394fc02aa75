use crate::backend::{BackendKind, ResetFlags, Resolution};

/// Backend initialization parameters.
///
/// Passed once when the GPU layer comes up. Backbuffer size and reset flags
/// can change later through `RenderBackend::reset`.
#[derive(Debug, Clone)]
pub struct Init {
    /// Graphics API to use.
    pub backend: BackendKind,

    /// Initial backbuffer size and reset flags.
    ///
    /// A zero size is replaced by the window's inner size.
    pub resolution: Resolution,

    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub power_preference: wgpu::PowerPreference,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface (a hint).
    pub desired_maximum_frame_latency: u32,
}

impl Default for Init {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            resolution: Resolution::new(0, 0, ResetFlags::VSYNC),
            prefer_srgb: false,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
