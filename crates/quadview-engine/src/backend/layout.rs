use anyhow::{bail, Result};

/// Vertex attribute semantic. Each one binds to a fixed shader location.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Attrib {
    Position,
    Color0,
    TexCoord0,
    Normal,
}

impl Attrib {
    /// `@location(n)` of this attribute in every shader.
    pub fn location(self) -> u32 {
        match self {
            Attrib::Position => 0,
            Attrib::Color0 => 1,
            Attrib::TexCoord0 => 2,
            Attrib::Normal => 3,
        }
    }
}

/// Component type of an attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttribType {
    Uint8,
    Int16,
    Half,
    Float,
}

/// One attribute inside a vertex.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttrib {
    pub attrib: Attrib,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

/// Interleaved vertex layout of a vertex buffer.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VertexLayout {
    attribs: Vec<VertexAttrib>,
    stride: u64,
}

impl VertexLayout {
    /// Starts a layout; attributes are packed in the order they are added.
    pub fn begin() -> VertexLayoutBuilder {
        VertexLayoutBuilder::default()
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn attribs(&self) -> &[VertexAttrib] {
        &self.attribs
    }

    pub fn has(&self, attrib: Attrib) -> bool {
        self.attribs.iter().any(|a| a.attrib == attrib)
    }

    pub fn to_wgpu_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.attribs
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.format,
                offset: a.offset,
                shader_location: a.attrib.location(),
            })
            .collect()
    }
}

/// Builder returned by [`VertexLayout::begin`].
///
/// Errors are collected and reported by [`VertexLayoutBuilder::end`] so the
/// chain reads like a declaration.
#[derive(Debug, Default)]
pub struct VertexLayoutBuilder {
    attribs: Vec<VertexAttrib>,
    stride: u64,
    errors: Vec<String>,
}

impl VertexLayoutBuilder {
    pub fn add(mut self, attrib: Attrib, count: u8, ty: AttribType, normalized: bool) -> Self {
        if self.attribs.iter().any(|a| a.attrib == attrib) {
            self.errors.push(format!("{attrib:?} added twice"));
            return self;
        }

        match vertex_format(count, ty, normalized) {
            Some(format) => {
                self.attribs.push(VertexAttrib {
                    attrib,
                    format,
                    offset: self.stride,
                });
                self.stride += format.size();
            }
            None => self.errors.push(format!(
                "{attrib:?}: {count} x {ty:?} (normalized: {normalized}) is not a supported vertex format"
            )),
        }

        self
    }

    pub fn end(self) -> Result<VertexLayout> {
        if !self.errors.is_empty() {
            bail!("invalid vertex layout: {}", self.errors.join("; "));
        }
        if self.attribs.is_empty() {
            bail!("vertex layout has no attributes");
        }

        Ok(VertexLayout {
            attribs: self.attribs,
            stride: self.stride,
        })
    }
}

fn vertex_format(count: u8, ty: AttribType, normalized: bool) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;

    let format = match (ty, count, normalized) {
        (AttribType::Float, 1, _) => F::Float32,
        (AttribType::Float, 2, _) => F::Float32x2,
        (AttribType::Float, 3, _) => F::Float32x3,
        (AttribType::Float, 4, _) => F::Float32x4,

        (AttribType::Half, 2, _) => F::Float16x2,
        (AttribType::Half, 4, _) => F::Float16x4,

        (AttribType::Uint8, 2, true) => F::Unorm8x2,
        (AttribType::Uint8, 2, false) => F::Uint8x2,
        (AttribType::Uint8, 4, true) => F::Unorm8x4,
        (AttribType::Uint8, 4, false) => F::Uint8x4,

        (AttribType::Int16, 2, true) => F::Snorm16x2,
        (AttribType::Int16, 2, false) => F::Sint16x2,
        (AttribType::Int16, 4, true) => F::Snorm16x4,
        (AttribType::Int16, 4, false) => F::Sint16x4,

        _ => return None,
    };

    Some(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_color() -> VertexLayout {
        VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false)
            .add(Attrib::Color0, 4, AttribType::Uint8, true)
            .end()
            .unwrap()
    }

    #[test]
    fn position_color_is_sixteen_bytes() {
        let layout = pos_color();
        assert_eq!(layout.stride(), 16);
        assert_eq!(layout.attribs()[0].offset, 0);
        assert_eq!(layout.attribs()[1].offset, 12);
        assert_eq!(layout.attribs()[1].format, wgpu::VertexFormat::Unorm8x4);
    }

    #[test]
    fn wgpu_attributes_use_fixed_locations() {
        let attrs = pos_color().to_wgpu_attributes();
        assert_eq!(attrs[0].shader_location, 0);
        assert_eq!(attrs[1].shader_location, 1);
    }

    #[test]
    fn three_bytes_is_rejected() {
        let err = VertexLayout::begin()
            .add(Attrib::Color0, 3, AttribType::Uint8, true)
            .end()
            .unwrap_err();
        assert!(err.to_string().contains("Color0"));
    }

    #[test]
    fn duplicate_attribute_is_rejected() {
        let res = VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false)
            .add(Attrib::Position, 2, AttribType::Float, false)
            .end();
        assert!(res.is_err());
    }

    #[test]
    fn empty_layout_is_rejected() {
        assert!(VertexLayout::begin().end().is_err());
    }

    #[test]
    fn equal_layouts_compare_equal() {
        assert_eq!(pos_color(), pos_color());
        assert!(pos_color().has(Attrib::Color0));
        assert!(!pos_color().has(Attrib::Normal));
    }
}
