use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::backend::{BackendKind, Caps, ResetFlags, Resolution};

use super::surface::{self, SurfaceErrorAction};
use super::Init;

/// Depth format of the backbuffer's depth attachment.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// One acquired backbuffer image plus the encoder recording into it.
///
/// Short-lived: holding the surface texture blocks acquisition of the next one.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

/// Owns the wgpu device objects, the configured surface and its depth target.
pub struct Gpu<'w> {
    /// Surface bound to the window; the window must outlive the `Gpu`.
    surface: wgpu::Surface<'w>,

    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Requested backbuffer size; may be zero while minimized.
    resolution: Resolution,

    depth_view: wgpu::TextureView,
    caps: Caps,
}

impl<'w> Gpu<'w> {
    /// Creates the device and configures a surface for `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: &'w Window, init: Init) -> Result<Self> {
        let Init {
            backend,
            resolution,
            prefer_srgb,
            alpha_mode,
            power_preference,
            required_limits,
            desired_maximum_frame_latency,
        } = init;

        let resolution = if resolution.is_empty() {
            let size = window.inner_size();
            Resolution::new(size.width, size.height, resolution.reset)
        } else {
            resolution
        };
        anyhow::ensure!(!resolution.is_empty(), "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: backend.to_wgpu(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .with_context(|| format!("failed to find a {backend:?} GPU adapter"))?;

        let info = adapter.get_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("quadview device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps.formats, prefer_srgb)
            .context("no supported surface formats")?;
        log::info!("surface format: {format:?}");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: resolution.width,
            height: resolution.height,
            present_mode: surface::present_mode(resolution.reset),
            alpha_mode: surface::choose_alpha_mode(&surface_caps.alpha_modes, alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency,
        };

        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, resolution.width, resolution.height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            resolution,
            depth_view,
            caps: Caps {
                homogeneous_depth: false,
                backend: BackendKind::from_wgpu(info.backend),
                adapter: info.name,
            },
        })
    }

    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Size the surface is actually configured with.
    pub fn surface_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Applies a new backbuffer size and reset flags.
    ///
    /// wgpu cannot configure a 0x0 surface; in that case only the requested
    /// resolution is recorded and configuration waits for a non-zero size.
    pub fn reset(&mut self, width: u32, height: u32, flags: ResetFlags) {
        let requested = Resolution::new(width, height, flags);
        if requested == self.resolution {
            return;
        }
        self.resolution = requested;

        if requested.is_empty() {
            return;
        }

        let resized = self.config.width != width || self.config.height != height;
        self.config.width = width;
        self.config.height = height;
        self.config.present_mode = surface::present_mode(flags);
        self.surface.configure(&self.device, &self.config);

        if resized {
            self.depth_view = create_depth_view(&self.device, width, height);
        }

        log::debug!("backbuffer reset to {width}x{height} ({flags:?})");
    }

    /// Acquires the next surface texture and creates an encoder.
    pub fn begin_frame(&self) -> std::result::Result<GpuFrame, SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quadview frame encoder"),
            });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Submits the frame's commands and presents its surface texture.
    pub fn submit(&self, frame: GpuFrame) {
        let GpuFrame {
            surface_texture,
            view,
            encoder,
        } = frame;

        self.queue.submit(std::iter::once(encoder.finish()));
        drop(view);
        surface_texture.present();
    }

    /// Recovers from an acquire error where possible.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        let action = surface::classify_surface_error(&err);
        if action == SurfaceErrorAction::Reconfigured && !self.resolution.is_empty() {
            self.surface.configure(&self.device, &self.config);
        }
        log::debug!("surface error {err:?} -> {action:?}");
        action
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("quadview depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
