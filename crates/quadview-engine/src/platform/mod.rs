//! Native window-system handles.
//!
//! The GPU surface is created from these handles, so retrieving them is the
//! first thing that can fail after the window exists.

mod native;

pub use native::{NativeHandle, NativeHandleError, NativeHandleProvider};
