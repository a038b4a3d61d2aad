// src/rendering_lib/vertex.rs

use bytemuck::{Pod, Zeroable};

use super::backend::{VertexAttribute, VertexFormat, VertexLayout};

/// Mesh vertex: grid position plus a grey shade broadcast to RGB.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct ShadedVertex {
    pub position: [f32; 2],
    pub color: [u8; 4],
}

impl ShadedVertex {
    pub fn new(x: u32, y: u32, shade: u8) -> Self {
        Self { position: [x as f32, y as f32], color: [shade, shade, shade, 255] }
    }

    pub fn shade(&self) -> u8 {
        self.color[0]
    }

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<ShadedVertex>() as u64,
            attributes: &[
                VertexAttribute { offset: 0, location: 0, format: VertexFormat::Float32x2 },
                VertexAttribute { offset: 8, location: 1, format: VertexFormat::Unorm8x4 },
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct TexturedVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl TexturedVertex {
    pub fn new(position: [f32; 2], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<TexturedVertex>() as u64,
            attributes: &[
                VertexAttribute { offset: 0, location: 0, format: VertexFormat::Float32x2 },
                VertexAttribute { offset: 8, location: 1, format: VertexFormat::Float32x2 },
            ],
        }
    }
}

/// Slice-stack vertex: position in clip or model space, with a 2D or 3D
/// texture coordinate (the third component is ignored by 2D programs).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct SliceVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 3],
}

impl SliceVertex {
    pub fn new(position: [f32; 3], tex_coord: [f32; 3]) -> Self {
        Self { position, tex_coord }
    }

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<SliceVertex>() as u64,
            attributes: &[
                VertexAttribute { offset: 0, location: 0, format: VertexFormat::Float32x3 },
                VertexAttribute { offset: 12, location: 1, format: VertexFormat::Float32x3 },
            ],
        }
    }
}
