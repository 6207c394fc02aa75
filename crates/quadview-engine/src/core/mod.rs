//! Core engine-facing contracts.
//!
//! This module defines the interface between the runtime (platform loop) and
//! the application: lifecycle callbacks plus the per-frame context.

mod app;
mod ctx;
mod teardown;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
pub use teardown::Teardown;
