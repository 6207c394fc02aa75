//! Shader blob loading.

mod blob;

pub use blob::{ShaderBlob, ShaderFormat};
