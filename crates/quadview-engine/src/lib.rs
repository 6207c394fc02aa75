//! quadview engine crate.
//!
//! This crate owns the window, event and GPU backend pieces used by the
//! `quadview` binary. Drawing goes through the `backend::RenderBackend`
//! contract so the frame loop can run against the wgpu backend or the
//! recording no-op backend.

pub mod backend;
pub mod core;
pub mod device;
pub mod event;
pub mod math;
pub mod platform;
pub mod shader;
pub mod window;

pub mod error;
pub mod logging;
