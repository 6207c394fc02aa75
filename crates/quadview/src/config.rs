use std::path::PathBuf;

use anyhow::{Context, Result};

use quadview_engine::backend::{BackendKind, ResetFlags, Resolution};
use quadview_engine::device::Init;
use quadview_engine::window::{PhysicalSize, RuntimeConfig};

/// Selects the rendering API (`auto`, `vulkan`, `metal`, `dx12`, `gl`).
pub const ENV_BACKEND: &str = "QUADVIEW_BACKEND";
/// Directory holding `v_simple.bin` / `f_simple.bin`.
pub const ENV_SHADER_DIR: &str = "QUADVIEW_SHADER_DIR";
/// Runs this many frames against the no-op backend instead of opening a window.
pub const ENV_HEADLESS_FRAMES: &str = "QUADVIEW_HEADLESS_FRAMES";

/// Demo configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,

    /// View 0 clear color, packed `0xRRGGBBAA`.
    pub clear_rgba: u32,
    pub vsync: bool,

    pub shader_dir: PathBuf,
    pub backend: BackendKind,

    pub headless_frames: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "quadview".to_string(),
            width: 640,
            height: 480,
            clear_rgba: 0x4433_55ff,
            vsync: true,
            shader_dir: PathBuf::from("."),
            backend: BackendKind::Auto,
            headless_frames: None,
        }
    }
}

impl AppConfig {
    /// Defaults with the process environment applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (an environment-like key/value source).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_BACKEND) {
            self.backend = value
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid {ENV_BACKEND}"))?;
        }

        if let Some(value) = lookup(ENV_SHADER_DIR).filter(|v| !v.is_empty()) {
            self.shader_dir = PathBuf::from(value);
        }

        if let Some(value) = lookup(ENV_HEADLESS_FRAMES) {
            let frames = value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid {ENV_HEADLESS_FRAMES} '{value}'"))?;
            self.headless_frames = Some(frames);
        }

        Ok(self)
    }

    pub fn reset_flags(&self) -> ResetFlags {
        if self.vsync {
            ResetFlags::VSYNC
        } else {
            ResetFlags::empty()
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height, self.reset_flags())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            title: self.title.clone(),
            initial_size: PhysicalSize::new(self.width, self.height),
        }
    }

    /// Backend init parameters; the backbuffer follows the window's actual size.
    pub fn init(&self) -> Init {
        Init {
            backend: self.backend,
            resolution: Resolution::new(0, 0, self.reset_flags()),
            ..Init::default()
        }
    }
}
