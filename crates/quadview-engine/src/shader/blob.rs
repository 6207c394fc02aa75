use std::path::Path;

use anyhow::{Context, Result};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Encoding of a compiled shader stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderFormat {
    /// SPIR-V binary module (little endian words).
    SpirV,
    /// WGSL source text.
    Wgsl,
}

impl ShaderFormat {
    /// Detects the format from the blob contents.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 4 {
            let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if magic == SPIRV_MAGIC {
                return Some(ShaderFormat::SpirV);
            }
        }

        if std::str::from_utf8(bytes).is_ok() {
            return Some(ShaderFormat::Wgsl);
        }

        None
    }
}

/// A shader stage loaded into memory, owned and sized exactly to its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderBlob {
    name: String,
    format: ShaderFormat,
    bytes: Vec<u8>,
}

impl ShaderBlob {
    /// Reads a whole shader file.
    ///
    /// The buffer is sized from the file itself, so blobs of any length load
    /// completely and nothing past the end of the file is ever handed on.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read shader {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_bytes(name, bytes).with_context(|| format!("invalid shader {}", path.display()))
    }

    /// Wraps an in-memory shader stage.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        anyhow::ensure!(!bytes.is_empty(), "shader blob is empty");

        let format = ShaderFormat::detect(&bytes)
            .context("shader blob is neither SPIR-V nor UTF-8 WGSL")?;

        if format == ShaderFormat::SpirV {
            anyhow::ensure!(
                bytes.len() % 4 == 0,
                "SPIR-V blob length {} is not a multiple of 4",
                bytes.len()
            );
        }

        Ok(Self {
            name: name.into(),
            format,
            bytes,
        })
    }

    /// Wraps WGSL source text.
    pub fn wgsl(name: impl Into<String>, source: &str) -> Result<Self> {
        Self::from_bytes(name, source.as_bytes().to_vec())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> ShaderFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// WGSL source, if this blob is text.
    pub fn as_wgsl(&self) -> Option<&str> {
        match self.format {
            ShaderFormat::Wgsl => std::str::from_utf8(&self.bytes).ok(),
            ShaderFormat::SpirV => None,
        }
    }
}
