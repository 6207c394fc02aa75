//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue for the selected API
//! - configuring the surface (swapchain) and its depth attachment
//! - acquiring and presenting backbuffer images

mod gpu;
mod init;
mod surface;

pub use gpu::{Gpu, GpuFrame, DEPTH_FORMAT};
pub use init::Init;
pub use surface::SurfaceErrorAction;
