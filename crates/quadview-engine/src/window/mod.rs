//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and wires them to the GPU backend
//! and the application.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
pub use winit::dpi::PhysicalSize;
